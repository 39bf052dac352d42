//! Telephony media stream protocol.
//!
//! The caller-side channel is a WebSocket of JSON text frames tagged by an
//! `event` field. Inbound frames are decoded once into [`MediaStreamEvent`];
//! outbound frames are built as [`MediaStreamFrame`].

mod messages;

pub use messages::{
    MarkPayload, MediaPayload, MediaStreamEvent, MediaStreamFrame, OutboundMedia, StartPayload,
};
