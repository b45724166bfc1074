//! Configuration management for Sahayak
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, SahayakError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Sahayak
///
/// This structure holds all configuration needed by the server, including
/// listener settings, upstream provider settings, authentication, and
/// saved-chat storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Provider configuration (Gemini, etc.)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Saved-chat and upload storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the listener to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Provider configuration
///
/// Specifies which upstream generative provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Gemini configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Model to use for generation
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API key; normally supplied via the `GEMINI_API_KEY` environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Optional API base URL override (useful for tests and local mocks)
    ///
    /// When set, requests are built against this base instead of the public
    /// Gemini endpoint, which allows tests to point the provider at a mock
    /// server.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Maximum tokens the model may produce per reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Number of retries after a rate-limited response
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_output_tokens() -> u32 {
    2000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            api_key: None,
            api_base: None,
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path of the JSON file holding registered users
    #[serde(default = "default_users_file")]
    pub users_file: String,

    /// Secret used to sign access tokens; override via `SAHAYAK_TOKEN_SECRET`
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Token lifetime in days
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

fn default_users_file() -> String {
    "users.json".to_string()
}

fn default_token_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_token_ttl_days() -> i64 {
    7
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_file: default_users_file(),
            token_secret: default_token_secret(),
            token_ttl_days: default_token_ttl_days(),
        }
    }
}

/// Saved-chat and upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where saved chats are written as JSON files
    #[serde(default = "default_saved_chats_dir")]
    pub saved_chats_dir: String,

    /// Maximum size of a single uploaded file, in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Maximum number of files accepted per chat request
    #[serde(default = "default_max_files_per_request")]
    pub max_files_per_request: usize,
}

fn default_saved_chats_dir() -> String {
    "saved-chats".to_string()
}

fn default_max_file_size_mb() -> u64 {
    20
}

fn default_max_files_per_request() -> usize {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            saved_chats_dir: default_saved_chats_dir(),
            max_file_size_mb: default_max_file_size_mb(),
            max_files_per_request: default_max_files_per_request(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SahayakError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SahayakError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            if !api_key.is_empty() {
                self.provider.gemini.api_key = Some(api_key);
            }
        }

        if let Ok(model) = std::env::var("SAHAYAK_GEMINI_MODEL") {
            self.provider.gemini.model = model;
        }

        if let Ok(secret) = std::env::var("SAHAYAK_TOKEN_SECRET") {
            self.auth.token_secret = secret;
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid PORT: {}", port);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        let crate::cli::Commands::Serve { port, host } = &cli.command;
        if let Some(port) = port {
            self.server.port = *port;
        }
        if let Some(host) = host {
            self.server.host = host.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error when a value is out of range or the provider type is
    /// unknown
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type != "gemini" {
            return Err(SahayakError::Config(format!(
                "Unknown provider type: {}",
                self.provider.provider_type
            ))
            .into());
        }

        let gemini = &self.provider.gemini;
        if gemini.model.is_empty() {
            return Err(SahayakError::Config("Gemini model must not be empty".to_string()).into());
        }
        if !(0.0..=2.0).contains(&gemini.temperature) {
            return Err(SahayakError::Config(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                gemini.temperature
            ))
            .into());
        }
        if gemini.max_output_tokens == 0 {
            return Err(
                SahayakError::Config("max_output_tokens must be positive".to_string()).into(),
            );
        }

        if self.storage.max_file_size_mb == 0 {
            return Err(
                SahayakError::Config("max_file_size_mb must be positive".to_string()).into(),
            );
        }
        if self.storage.max_files_per_request == 0 {
            return Err(
                SahayakError::Config("max_files_per_request must be positive".to_string()).into(),
            );
        }

        if self.auth.token_ttl_days <= 0 {
            return Err(SahayakError::Config("token_ttl_days must be positive".to_string()).into());
        }
        if self.auth.token_secret == default_token_secret() {
            tracing::warn!("Using the default token secret; set SAHAYAK_TOKEN_SECRET");
        }

        Ok(())
    }

    /// Maximum upload size in bytes derived from the configured megabyte cap
    pub fn max_file_size_bytes(&self) -> u64 {
        self.storage.max_file_size_mb * 1024 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
