//! Media stream frames exchanged with the telephony provider.
//!
//! Inbound (caller side to bridge):
//! - connected - Socket accepted, no stream yet
//! - start - Stream identifiers assigned
//! - media - One chunk of caller audio with its timeline position
//! - mark - Playback of a previously sent mark reached the caller
//! - dtmf - Keypad digit
//! - stop - Call ended
//!
//! Outbound (bridge to caller side): `media`, `mark` and `clear`.

use serde::{Deserialize, Deserializer, Serialize};

/// Inbound media stream event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MediaStreamEvent {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },

    Start {
        start: StartPayload,
    },

    Media {
        media: MediaPayload,
    },

    Mark {
        mark: MarkPayload,
    },

    Dtmf {
        #[serde(default)]
        dtmf: serde_json::Value,
    },

    Stop,

    /// Any event the bridge does not act on
    #[serde(other)]
    Unrecognized,
}

impl MediaStreamEvent {
    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            MediaStreamEvent::Connected { .. } => "connected",
            MediaStreamEvent::Start { .. } => "start",
            MediaStreamEvent::Media { .. } => "media",
            MediaStreamEvent::Mark { .. } => "mark",
            MediaStreamEvent::Dtmf { .. } => "dtmf",
            MediaStreamEvent::Stop => "stop",
            MediaStreamEvent::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Milliseconds since stream start on the caller's clock
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
    /// Base64 audio
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// The provider sends `timestamp` as a decimal string; numbers are accepted too.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Number(u64),
        Text(String),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Number(ms) => Ok(ms),
        Timestamp::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid media timestamp '{text}'"))),
    }
}

/// Outbound frame sent to the caller side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MediaStreamFrame {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },

    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },

    /// Discard any audio buffered on the caller side
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl MediaStreamFrame {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        MediaStreamFrame::Media {
            stream_sid: stream_sid.into(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn mark(stream_sid: impl Into<String>, name: impl Into<String>) -> Self {
        MediaStreamFrame::Mark {
            stream_sid: stream_sid.into(),
            mark: MarkPayload { name: name.into() },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        MediaStreamFrame::Clear {
            stream_sid: stream_sid.into(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            MediaStreamFrame::Media { .. } => "media",
            MediaStreamFrame::Mark { .. } => "mark",
            MediaStreamFrame::Clear { .. } => "clear",
        }
    }
}
