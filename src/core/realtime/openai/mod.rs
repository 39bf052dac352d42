//! OpenAI Realtime API module.
//!
//! Model-side channel for the call bridge: a WebSocket speaking the Realtime
//! JSON event protocol.
//!
//! # Audio Format
//!
//! Telephony media streams carry G.711 u-law at 8kHz. The session is
//! configured with `g711_ulaw` for both input and output, so payloads pass
//! through without transcoding.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge::core::realtime::{OpenAIRealtime, RealtimeConfig};
//!
//! let realtime = OpenAIRealtime::new(RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     voice: Some("sage".to_string()),
//!     ..Default::default()
//! })?;
//!
//! let connection = realtime.connect().await?;
//! for event in realtime.opening_events() {
//!     connection.sender.send(event).await?;
//! }
//! ```

mod client;
mod config;
mod messages;

pub use client::{ModelEventStream, OpenAIRealtime, RealtimeConnection};
pub use config::{
    DEFAULT_REALTIME_MODEL, OPENAI_BETA_HEADER_VALUE, OPENAI_REALTIME_URL,
    OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice, TELEPHONY_AUDIO_FORMAT,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, InputAudioTranscription, ServerEvent,
    SessionConfig, TextDelta, TurnDetection,
};
