//! Environment variable loading.
//!
//! Reads every supported variable into an all-optional [`EnvConfig`]; defaults
//! are applied later in `merge`.

use super::utils::{env_bool, env_parse, env_string};

/// Configuration values read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_enabled: Option<bool>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_realtime_url: Option<String>,
    pub openai_realtime_model: Option<String>,
    pub openai_voice: Option<String>,
    pub system_instructions: Option<String>,
    pub openai_temperature: Option<f32>,
    /// Set but empty means "disabled", so this is read raw
    pub input_transcription_model: Option<String>,
    pub interruption_trigger: Option<String>,
    pub initial_greeting: Option<String>,

    pub webhook_url: Option<String>,
    pub webhook_max_attempts: Option<u32>,
    pub webhook_timeout_seconds: Option<u64>,
    pub webhook_initial_backoff_ms: Option<u64>,
    pub webhook_queue_capacity: Option<usize>,

    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl EnvConfig {
    /// Read all supported variables.
    ///
    /// # Errors
    /// Returns an error naming the variable when a numeric or boolean value
    /// does not parse.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            host: env_string("HOST"),
            port: env_parse("PORT")?,
            tls_enabled: env_bool("TLS_ENABLED")?,
            tls_cert_path: env_string("TLS_CERT_PATH"),
            tls_key_path: env_string("TLS_KEY_PATH"),

            openai_api_key: env_string("OPENAI_API_KEY"),
            openai_realtime_url: env_string("OPENAI_REALTIME_URL"),
            openai_realtime_model: env_string("OPENAI_REALTIME_MODEL"),
            openai_voice: env_string("OPENAI_VOICE"),
            system_instructions: env_string("SYSTEM_INSTRUCTIONS"),
            openai_temperature: env_parse("OPENAI_TEMPERATURE")?,
            input_transcription_model: std::env::var("INPUT_TRANSCRIPTION_MODEL")
                .ok()
                .map(|v| v.trim().to_string()),
            interruption_trigger: env_string("INTERRUPTION_TRIGGER"),
            initial_greeting: env_string("INITIAL_GREETING"),

            webhook_url: env_string("FRONTEND_WEBHOOK_URL"),
            webhook_max_attempts: env_parse("WEBHOOK_MAX_ATTEMPTS")?,
            webhook_timeout_seconds: env_parse("WEBHOOK_TIMEOUT_SECONDS")?,
            webhook_initial_backoff_ms: env_parse("WEBHOOK_INITIAL_BACKOFF_MS")?,
            webhook_queue_capacity: env_parse("WEBHOOK_QUEUE_CAPACITY")?,

            cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")?,
            rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE")?,
            max_websocket_connections: env_parse("MAX_WEBSOCKET_CONNECTIONS")?,
            max_connections_per_ip: env_parse("MAX_CONNECTIONS_PER_IP")?,
        })
    }
}
