//! Per-call bridging between the telephony media stream and the model.
//!
//! A call runs two relays concurrently:
//! - [`InboundRelay`] decodes caller frames, tracks the caller clock and
//!   forwards audio to the model
//! - [`OutboundRelay`] decodes model events, forwards synthesized audio with
//!   playback marks and runs barge-in
//!
//! [`SessionOrchestrator`] owns both for the lifetime of the call and tears
//! both channels down as soon as either relay stops.

mod barge_in;
mod inbound;
mod orchestrator;
mod outbound;
mod registry;
mod state;

use thiserror::Error;

pub use barge_in::{BargeInController, InterruptionTrigger, Interruption, SpeechSignal};
pub use inbound::InboundRelay;
pub use orchestrator::{SessionOrchestrator, SessionOutcome};
pub use outbound::OutboundRelay;
pub use registry::SessionRegistry;
pub use state::{AudioDispatch, CallSession, MARK_NAME_PREFIX, SessionSnapshot, SharedSession};

/// Why a relay stopped. Every variant ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayExit {
    #[error("caller channel closed")]
    CallerClosed,

    #[error("call stopped by telephony provider")]
    CallStopped,

    #[error("model channel closed")]
    ModelClosed,

    #[error("caller channel error: {0}")]
    CallerError(String),

    #[error("model channel error: {0}")]
    ModelError(String),
}

impl RelayExit {
    /// True when the session ended without a transport failure.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            RelayExit::CallerClosed | RelayExit::CallStopped | RelayExit::ModelClosed
        )
    }
}
