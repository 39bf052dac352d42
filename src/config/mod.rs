//! Configuration module for the call bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use callbridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use merge::{DEFAULT_HOST, DEFAULT_PORT};
pub use yaml::YamlConfig;

use crate::core::InterruptionTrigger;
use crate::core::realtime::{InputTranscriptionConfig, RealtimeConfig};
use crate::core::transcript::RetryConfig;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the call bridge, including:
/// - Server settings (host, port, TLS)
/// - Realtime model settings (key, endpoint, voice, instructions)
/// - Transcript webhook delivery
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Realtime model settings
    /// OpenAI API key; required before a call can be bridged
    pub openai_api_key: Option<String>,
    pub openai_realtime_url: String,
    pub openai_realtime_model: String,
    pub openai_voice: String,
    pub system_instructions: String,
    pub openai_temperature: f32,
    /// Caller transcription model; `None` disables caller transcripts
    pub input_transcription_model: Option<String>,
    /// Which VAD signal interrupts the assistant
    pub interruption_trigger: InterruptionTrigger,
    /// When set, the assistant speaks first using this prompt
    pub initial_greeting: Option<String>,

    // Transcript webhook
    /// Webhook receiving transcripts; `None` disables delivery
    pub webhook_url: Option<String>,
    /// Default: 3
    pub webhook_max_attempts: u32,
    /// Default: 10
    pub webhook_timeout_seconds: u64,
    /// Default: 1000
    pub webhook_initial_backoff_ms: u64,
    /// Default: 1024
    pub webhook_queue_capacity: usize,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// `.env` values are expected to be loaded into the environment already
    /// (see `main.rs`).
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_realtime_url(&self.openai_realtime_url)?;
        validation::validate_temperature(self.openai_temperature)?;
        validation::validate_webhook_url(&self.webhook_url)?;
        validation::validate_webhook_delivery(
            self.webhook_max_attempts,
            self.webhook_queue_capacity,
        )?;
        validation::validate_rate_limit(
            self.rate_limit_requests_per_second,
            self.rate_limit_burst_size,
        )?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if transcript delivery is configured
    pub fn has_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Build the realtime channel configuration for a call.
    ///
    /// # Errors
    /// Returns an error message when no OpenAI API key is configured.
    pub fn realtime_config(&self) -> Result<RealtimeConfig, String> {
        let api_key = self
            .openai_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| "OpenAI API key not configured (set OPENAI_API_KEY)".to_string())?;

        Ok(RealtimeConfig {
            api_key,
            url: self.openai_realtime_url.clone(),
            model: self.openai_realtime_model.clone(),
            voice: Some(self.openai_voice.clone()),
            instructions: Some(self.system_instructions.clone()),
            temperature: Some(self.openai_temperature),
            input_audio_transcription: self
                .input_transcription_model
                .clone()
                .map(|model| InputTranscriptionConfig { model }),
            initial_greeting: self.initial_greeting.clone(),
            ..Default::default()
        })
    }

    /// Retry policy for transcript webhook delivery.
    pub fn webhook_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.webhook_max_attempts,
            initial_backoff: Duration::from_millis(self.webhook_initial_backoff_ms),
            timeout: Duration::from_secs(self.webhook_timeout_seconds),
        }
    }
}
