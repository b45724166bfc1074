//! Gemini provider implementation for Sahayak
//!
//! This module implements the Provider trait against the Gemini
//! `generateContent` REST endpoint, including retry with exponential
//! backoff when the upstream reports a rate limit.

use crate::config::GeminiConfig;
use crate::error::{Result, SahayakError};
use crate::providers::{GenerateResponse, Provider, TokenUsage};
use crate::session::Turn;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Seconds the client is told to wait after the retry budget is exhausted.
const RATE_LIMIT_RETRY_AFTER_SECS: u64 = 60;

/// Gemini API provider
///
/// Sends assembled turn sequences to the Gemini `generateContent` endpoint.
/// Rate-limited responses (HTTP 429) are retried with exponential backoff
/// (base delay doubling per attempt) up to the configured retry budget; any
/// other upstream failure propagates immediately.
///
/// # Examples
///
/// ```no_run
/// use sahayak::config::GeminiConfig;
/// use sahayak::providers::{GeminiProvider, Provider};
/// use sahayak::session::Turn;
///
/// # async fn example() -> sahayak::error::Result<()> {
/// let config = GeminiConfig {
///     api_key: Some("key".to_string()),
///     ..Default::default()
/// };
/// let provider = GeminiProvider::new(config)?;
/// let reply = provider.generate(&[Turn::model_text("hi")]).await?;
/// println!("{}", reply.text);
/// # Ok(())
/// # }
/// ```
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

/// Request body for the generateContent endpoint
#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: &'a [Turn],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

/// Generation parameters sent with every request
#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f64,
}

/// Response body from the generateContent endpoint
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: usize,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: usize,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    ///
    /// # Arguments
    ///
    /// * `config` - Gemini configuration containing model, key, and retry settings
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("sahayak/0.2.0")
            .build()
            .map_err(|e| SahayakError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini provider: model={}, api_base={}",
            config.model,
            config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
        );

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!("{}/models/{}:generateContent", base, self.config.model)
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                SahayakError::Provider(
                    "Missing Gemini API key; set GEMINI_API_KEY".to_string(),
                )
                .into()
            })
    }

    async fn send_once(&self, contents: &[Turn]) -> Result<reqwest::Response> {
        let request = GeminiRequest {
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key()?)])
            .json(&request)
            .send()
            .await
            .map_err(|e| SahayakError::Provider(format!("Gemini request failed: {}", e)))?;

        Ok(response)
    }

    fn extract_text(response: GeminiResponse) -> Result<GenerateResponse> {
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                SahayakError::Provider("Gemini response contained no candidates".to_string())
            })?;

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count));

        Ok(GenerateResponse { text, usage })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, contents: &[Turn]) -> Result<GenerateResponse> {
        let base_delay = Duration::from_millis(self.config.retry_base_delay_ms);
        let mut retries = 0u32;

        loop {
            let response = self.send_once(contents).await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries < self.config.max_retries {
                    retries += 1;
                    let delay = base_delay * 2u32.pow(retries - 1);
                    tracing::warn!(
                        "Gemini rate limit hit, retrying in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        retries,
                        self.config.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(SahayakError::RateLimited {
                    message: "Gemini rate limit still exceeded after retries".to_string(),
                    retry_after: RATE_LIMIT_RETRY_AFTER_SECS,
                }
                .into());
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SahayakError::Provider(format!(
                    "Gemini API returned error {}: {}",
                    status, body
                ))
                .into());
            }

            let parsed: GeminiResponse = response.json().await.map_err(|e| {
                SahayakError::Provider(format!("Failed to parse Gemini response: {}", e))
            })?;

            tracing::debug!("Gemini response received successfully");
            return Self::extract_text(parsed);
        }
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}
