//! Realtime speech-to-speech model channel.
//!
//! The bridge speaks to one provider, the OpenAI Realtime API, over a
//! WebSocket per call. `base` holds the provider-neutral configuration and
//! error types; `openai` holds the wire protocol and client.

mod base;
pub mod openai;

pub use base::{
    InputTranscriptionConfig, RealtimeConfig, RealtimeError, RealtimeResult, TurnDetectionConfig,
};
pub use openai::{
    ClientEvent, ModelEventStream, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeVoice, RealtimeConnection, ServerEvent,
};
