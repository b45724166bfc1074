//! Sahayak - multilingual AI chat assistant backend
//!
//! This library provides the backend for the Sahayak chat assistant: an HTTP
//! API that proxies conversations to an upstream generative provider while
//! keeping per-session history and in-flight request state in memory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: per-session turn history and cooperative request cancellation
//! - `providers`: upstream provider abstraction and the Gemini implementation
//! - `server`: axum router, shared state, and request handlers
//! - `auth`: user registration, login, and signed access tokens
//! - `storage`: saved-chat snapshots on disk
//! - `language`: reply-language mapping and primer injection
//! - `suggestions`: follow-up question extraction from model replies
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use sahayak::session::{SessionStore, Turn};
//!
//! let store = SessionStore::new();
//! store.append_turns("session-1", vec![Turn::model_text("Namaste!")]);
//! assert_eq!(store.history("session-1").len(), 1);
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod providers;
pub mod server;
pub mod session;
pub mod storage;
pub mod suggestions;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SahayakError};
pub use server::AppState;
pub use session::{Part, Role, SessionStore, Turn, MAX_HISTORY_TURNS};
