//! Transcript events emitted by the bridge.
//!
//! The outbound relay pushes [`TranscriptEvent`]s into a bounded queue with
//! `try_send`; a full or closed queue drops the event. Delivery happens on a
//! separate worker ([`webhook::WebhookWorker`]) so a slow consumer never
//! stalls audio forwarding.

pub mod webhook;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

pub use webhook::{RetryConfig, WebhookError, WebhookPayload, WebhookWorker};

/// Minimum accumulated length before an assistant partial is emitted.
pub const ASSISTANT_PARTIAL_MIN_CHARS: usize = 5;

/// Minimum accumulated length before a caller partial is emitted.
pub const CALLER_PARTIAL_MIN_CHARS: usize = 3;

/// Growth needed after one partial before the next is emitted.
pub const PARTIAL_STEP_CHARS: usize = 24;

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Assistant,
}

impl Speaker {
    /// Label used by the transcript dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Caller => "Caller",
            Speaker::Assistant => "You",
        }
    }
}

/// One transcript fragment for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEvent {
    /// Stream identifier of the call
    pub call_id: String,
    pub speaker: Speaker,
    pub text: String,
    pub is_partial: bool,
}

/// Non-blocking handle to the transcript queue.
#[derive(Debug, Clone, Default)]
pub struct TranscriptSink {
    tx: Option<mpsc::Sender<TranscriptEvent>>,
}

impl TranscriptSink {
    /// Create a sink and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TranscriptEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue an event without waiting. Returns whether it was accepted.
    pub fn emit(&self, event: TranscriptEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    call_id = %event.call_id,
                    speaker = event.speaker.label(),
                    "Transcript queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    call_id = %event.call_id,
                    "Transcript queue closed, dropping event"
                );
                false
            }
        }
    }
}

/// Accumulates streamed text for partial transcripts.
#[derive(Debug, Clone)]
pub struct PartialTranscript {
    buffer: String,
    min_chars: usize,
    /// Length of the last emitted partial, 0 if none yet
    emitted_chars: usize,
}

impl PartialTranscript {
    pub fn new(min_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            min_chars,
            emitted_chars: 0,
        }
    }

    /// Append a delta. Returns the accumulated text the first time it is
    /// longer than the threshold, then again each time it has grown by
    /// [`PARTIAL_STEP_CHARS`].
    pub fn push(&mut self, delta: &str) -> Option<&str> {
        if delta.is_empty() {
            return None;
        }
        self.buffer.push_str(delta);

        let len = self.buffer.chars().count();
        let due = if self.emitted_chars == 0 {
            len > self.min_chars
        } else {
            len >= self.emitted_chars + PARTIAL_STEP_CHARS
        };
        if !due {
            return None;
        }
        self.emitted_chars = len;
        Some(self.buffer.as_str())
    }

    /// Clear the buffer, returning what it held.
    pub fn take(&mut self) -> String {
        self.emitted_chars = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
