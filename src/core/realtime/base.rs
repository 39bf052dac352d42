//! Base types for the realtime speech-to-speech model channel.
//!
//! The bridge talks to exactly one model endpoint per call. These types
//! describe how that channel is configured and how it fails; the
//! provider-specific wire protocol lives in the `openai` submodule.
//!
//! # Audio Format
//!
//! Telephony audio is G.711 u-law at 8kHz in both directions. The codec is
//! fixed for the session and never negotiated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on the model channel.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed (missing or rejected API key)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel is not connected (writer task gone)
    #[error("Not connected")]
    NotConnected,
}

/// Result type for model channel operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for the realtime model channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key used for the `Authorization` header
    pub api_key: String,

    /// WebSocket endpoint (without the `model` query parameter)
    #[serde(default = "default_realtime_url")]
    pub url: String,

    /// Model identifier
    #[serde(default = "default_realtime_model")]
    pub model: String,

    /// Voice profile for synthesized audio
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Input transcription; `None` disables caller transcripts
    #[serde(default)]
    pub input_audio_transcription: Option<InputTranscriptionConfig>,

    /// Turn detection settings (server VAD by default)
    #[serde(default)]
    pub turn_detection: TurnDetectionConfig,

    /// When set, the assistant greets the caller with this prompt before any audio arrives
    #[serde(default)]
    pub initial_greeting: Option<String>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_realtime_url(),
            model: default_realtime_model(),
            voice: None,
            instructions: None,
            temperature: None,
            input_audio_transcription: None,
            turn_detection: TurnDetectionConfig::default(),
            initial_greeting: None,
        }
    }
}

fn default_realtime_url() -> String {
    super::openai::OPENAI_REALTIME_URL.to_string()
}

fn default_realtime_model() -> String {
    super::openai::DEFAULT_REALTIME_MODEL.to_string()
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side voice activity detection
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(default)]
        threshold: Option<f32>,
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_points_at_openai() {
        let config = RealtimeConfig::default();
        assert_eq!(config.url, "wss://api.openai.com/v1/realtime");
        assert!(!config.model.is_empty());
        assert!(config.api_key.is_empty());
        assert_eq!(config.turn_detection, TurnDetectionConfig::default());
    }

    #[test]
    fn test_turn_detection_serializes_as_server_vad() {
        let json = serde_json::to_value(TurnDetectionConfig::default()).unwrap();
        assert_eq!(json["type"], "server_vad");
    }

    #[test]
    fn test_config_deserialize_fills_defaults() {
        let config: RealtimeConfig =
            serde_json::from_str(r#"{"api_key":"sk-test","voice":"sage"}"#).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.voice.as_deref(), Some("sage"));
        assert_eq!(config.url, "wss://api.openai.com/v1/realtime");
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::ConnectionFailed("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");
        assert_eq!(RealtimeError::NotConnected.to_string(), "Not connected");
    }
}
