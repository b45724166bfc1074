//! Error types for Sahayak
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Sahayak operations
///
/// This enum encompasses all possible errors that can occur while serving
/// chat requests: configuration loading, upstream provider calls,
/// authentication, and saved-chat storage.
#[derive(Error, Debug)]
pub enum SahayakError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream provider errors (API calls, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Upstream rate limit still exceeded after the retry budget
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        /// Additional message explaining the failure
        message: String,
        /// Seconds the caller should wait before retrying
        retry_after: u64,
    },

    /// Authentication errors (bad credentials, invalid or expired tokens)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Request validation errors (missing fields, bad uploads)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Saved-chat and user-store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Sahayak operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
