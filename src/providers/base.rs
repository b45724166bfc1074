//! Base provider trait and common types for Sahayak
//!
//! This module defines the Provider trait that all upstream generative
//! providers must implement, along with the response and token-usage types
//! shared between them.

use crate::error::Result;
use crate::session::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage information from a completion
///
/// Tracks the number of tokens used in prompts and completions,
/// as reported by the upstream provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use sahayak::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        let total_tokens = prompt_tokens + completion_tokens;
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// Response from a generation call
///
/// Contains the model's reply text and, when the provider reports it,
/// token usage metadata.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The model's reply text
    pub text: String,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl GenerateResponse {
    /// Create a new GenerateResponse without usage data
    ///
    /// # Examples
    ///
    /// ```
    /// use sahayak::providers::GenerateResponse;
    ///
    /// let response = GenerateResponse::new("Namaste!");
    /// assert_eq!(response.text, "Namaste!");
    /// assert!(response.usage.is_none());
    /// ```
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Create a new GenerateResponse with token usage
    pub fn with_usage(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage: Some(usage),
        }
    }
}

/// Trait for upstream generative providers
///
/// Implementations turn an ordered turn sequence (history plus the new user
/// turn, already assembled by the caller) into a reply. The provider is a
/// transport: it does not read or mutate session state, and cancellation of
/// the surrounding request is handled by the caller after this call returns.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use sahayak::providers::{GenerateResponse, Provider};
/// use sahayak::session::Turn;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn generate(&self, contents: &[Turn]) -> sahayak::error::Result<GenerateResponse> {
///         let last = contents.last().map(|t| t.text()).unwrap_or_default();
///         Ok(GenerateResponse::new(last))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generates a reply for the given turn sequence
    ///
    /// # Arguments
    ///
    /// * `contents` - Ordered turns to send upstream, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails, the response is malformed, or
    /// the upstream rate limit is still exceeded after the retry budget
    async fn generate(&self, contents: &[Turn]) -> Result<GenerateResponse>;

    /// Name of the model this provider generates with
    fn model(&self) -> String {
        "unknown".to_string()
    }
}
