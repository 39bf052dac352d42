//! Barge-in handling.
//!
//! When the caller starts talking over the assistant, the in-flight turn is
//! cut on the model side at the point the caller actually heard, and audio
//! buffered on the caller side is discarded.
//!
//! Elapsed playback is measured on the caller's own media clock:
//! `audio_end_ms = latest_media_timestamp_ms - response_start_timestamp_ms`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::state::CallSession;
use crate::core::realtime::ClientEvent;
use crate::core::telephony::MediaStreamFrame;

/// Voice-activity signal that counts as the caller interrupting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionTrigger {
    /// `input_audio_buffer.speech_started`
    #[default]
    SpeechStarted,
    /// `input_audio_buffer.speech_stopped`
    SpeechStopped,
}

impl InterruptionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpeechStarted => "speech_started",
            Self::SpeechStopped => "speech_stopped",
        }
    }
}

impl fmt::Display for InterruptionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterruptionTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speech_started" | "input_audio_buffer.speech_started" => Ok(Self::SpeechStarted),
            "speech_stopped" | "input_audio_buffer.speech_stopped" => Ok(Self::SpeechStopped),
            other => Err(format!(
                "Invalid interruption trigger '{other}', expected speech_started or speech_stopped"
            )),
        }
    }
}

/// Voice-activity signal observed on the model channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSignal {
    Started,
    Stopped,
}

/// Instructions produced by one barge-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    pub item_id: String,
    pub stream_sid: String,
    pub audio_end_ms: u64,
    pub latest_media_timestamp_ms: u64,
    pub response_start_timestamp_ms: u64,
}

impl Interruption {
    /// Truncate instruction for the model channel.
    pub fn truncate_event(&self) -> ClientEvent {
        ClientEvent::truncate(self.item_id.clone(), self.audio_end_ms)
    }

    /// Flush instruction for the caller side.
    pub fn clear_frame(&self) -> MediaStreamFrame {
        MediaStreamFrame::clear(self.stream_sid.clone())
    }
}

/// Decides whether a speech signal interrupts the active assistant turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct BargeInController {
    trigger: InterruptionTrigger,
}

impl BargeInController {
    pub fn new(trigger: InterruptionTrigger) -> Self {
        Self { trigger }
    }

    pub fn trigger(&self) -> InterruptionTrigger {
        self.trigger
    }

    /// Evaluate a speech signal against the session.
    ///
    /// Interrupts only when the signal matches the configured trigger, a turn
    /// is active, at least one mark is outstanding and the turn start is
    /// anchored. On interruption the session's turn tracking is reset; in
    /// every other case the session is left untouched.
    pub fn on_speech(&self, signal: SpeechSignal, session: &mut CallSession) -> Option<Interruption> {
        let matches = match (self.trigger, signal) {
            (InterruptionTrigger::SpeechStarted, SpeechSignal::Started) => true,
            (InterruptionTrigger::SpeechStopped, SpeechSignal::Stopped) => true,
            _ => false,
        };
        if !matches {
            return None;
        }

        let item_id = session.active_turn_id()?.to_string();
        if session.pending_marks() == 0 {
            return None;
        }
        let response_start_timestamp_ms = session.response_start_timestamp_ms()?;
        let stream_sid = session.stream_sid()?.to_string();

        let latest_media_timestamp_ms = session.latest_media_timestamp_ms();
        let audio_end_ms = latest_media_timestamp_ms.saturating_sub(response_start_timestamp_ms);

        session.reset_turn();

        Some(Interruption {
            item_id,
            stream_sid,
            audio_end_ms,
            latest_media_timestamp_ms,
            response_start_timestamp_ms,
        })
    }
}
