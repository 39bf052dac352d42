//! Merging of environment and YAML configuration.
//!
//! Priority (highest to lowest): YAML file, environment variables (which
//! already include `.env` values loaded in `main`), defaults.

use std::path::PathBuf;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};
use crate::core::InterruptionTrigger;
use crate::core::realtime::openai::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_VOICE: &str = "sage";
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "You are a friendly, natural-sounding phone assistant. \
Keep answers short and conversational, and stop talking as soon as the caller interrupts.";
pub const DEFAULT_WEBHOOK_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_WEBHOOK_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_WEBHOOK_INITIAL_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_WEBHOOK_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 100;

/// Build a [`ServerConfig`] from the environment with optional YAML overrides.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let env = EnvConfig::from_env()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();
    let realtime = yaml.realtime.unwrap_or_default();
    let webhook = yaml.webhook.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls_enabled = tls_yaml.enabled.or(env.tls_enabled).unwrap_or(false);
    let tls = if tls_enabled {
        let cert_path = tls_yaml.cert_path.or(env.tls_cert_path);
        let key_path = tls_yaml.key_path.or(env.tls_key_path);
        match (cert_path, key_path) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => {
                return Err(
                    "TLS is enabled but TLS_CERT_PATH and TLS_KEY_PATH are not both set".into(),
                );
            }
        }
    } else {
        None
    };

    let interruption_trigger = match realtime.interruption_trigger.or(env.interruption_trigger) {
        Some(raw) => raw.parse::<InterruptionTrigger>()?,
        None => InterruptionTrigger::default(),
    };

    let input_transcription_model = realtime
        .input_transcription_model
        .or(env.input_transcription_model)
        .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());

    Ok(ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,

        openai_api_key: realtime.api_key.or(env.openai_api_key),
        openai_realtime_url: realtime
            .url
            .or(env.openai_realtime_url)
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        openai_realtime_model: realtime
            .model
            .or(env.openai_realtime_model)
            .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        openai_voice: realtime
            .voice
            .or(env.openai_voice)
            .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        system_instructions: realtime
            .instructions
            .or(env.system_instructions)
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTIONS.to_string()),
        openai_temperature: realtime
            .temperature
            .or(env.openai_temperature)
            .unwrap_or(DEFAULT_TEMPERATURE),
        input_transcription_model: Some(input_transcription_model).filter(|m| !m.is_empty()),
        interruption_trigger,
        initial_greeting: realtime
            .initial_greeting
            .or(env.initial_greeting)
            .filter(|g| !g.trim().is_empty()),

        webhook_url: webhook.url.or(env.webhook_url).filter(|u| !u.is_empty()),
        webhook_max_attempts: webhook
            .max_attempts
            .or(env.webhook_max_attempts)
            .unwrap_or(DEFAULT_WEBHOOK_MAX_ATTEMPTS),
        webhook_timeout_seconds: webhook
            .timeout_seconds
            .or(env.webhook_timeout_seconds)
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECONDS),
        webhook_initial_backoff_ms: webhook
            .initial_backoff_ms
            .or(env.webhook_initial_backoff_ms)
            .unwrap_or(DEFAULT_WEBHOOK_INITIAL_BACKOFF_MS),
        webhook_queue_capacity: webhook
            .queue_capacity
            .or(env.webhook_queue_capacity)
            .unwrap_or(DEFAULT_WEBHOOK_QUEUE_CAPACITY),

        cors_allowed_origins: security.cors_allowed_origins.or(env.cors_allowed_origins),
        rate_limit_requests_per_second: security
            .rate_limit_requests_per_second
            .or(env.rate_limit_requests_per_second)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: security
            .rate_limit_burst_size
            .or(env.rate_limit_burst_size)
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST),
        max_websocket_connections: security
            .max_websocket_connections
            .or(env.max_websocket_connections),
        max_connections_per_ip: security
            .max_connections_per_ip
            .or(env.max_connections_per_ip)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    })
}
