//! Provider module for Sahayak
//!
//! This module contains the upstream generative-provider abstraction and
//! the Gemini implementation.

pub mod base;
pub mod gemini;

pub use base::{GenerateResponse, Provider, TokenUsage};
pub use gemini::GeminiProvider;

use crate::config::ProviderConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration
///
/// # Returns
///
/// Returns a shared provider instance
///
/// # Errors
///
/// Returns error if the provider type is invalid or initialization fails
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    match config.provider_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config.gemini.clone())?)),
        other => Err(
            crate::error::SahayakError::Provider(format!("Unknown provider type: {}", other))
                .into(),
        ),
    }
}
