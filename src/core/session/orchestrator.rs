//! Session orchestration for one bridged call.

use std::fmt::Display;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::barge_in::BargeInController;
use super::inbound::InboundRelay;
use super::outbound::OutboundRelay;
use super::registry::SessionRegistry;
use super::state::{CallSession, SessionSnapshot};
use super::RelayExit;
use crate::core::realtime::{OpenAIRealtime, RealtimeConnection, RealtimeResult};
use crate::core::telephony::MediaStreamFrame;
use crate::core::transcript::TranscriptSink;

/// How long to wait for the model writer to flush its Close frame.
const MODEL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Reason reported by the relay that stopped first
    pub exit: RelayExit,
    /// Final session state
    pub snapshot: SessionSnapshot,
}

/// Runs the two relays of a call and tears both channels down together.
#[derive(Debug, Clone)]
pub struct SessionOrchestrator {
    realtime: OpenAIRealtime,
    registry: SessionRegistry,
    transcripts: TranscriptSink,
    barge_in: BargeInController,
}

impl SessionOrchestrator {
    pub fn new(
        realtime: OpenAIRealtime,
        registry: SessionRegistry,
        transcripts: TranscriptSink,
        barge_in: BargeInController,
    ) -> Self {
        Self {
            realtime,
            registry,
            transcripts,
            barge_in,
        }
    }

    /// Open the model channel. Must succeed before caller audio is accepted.
    pub async fn connect(&self) -> RealtimeResult<RealtimeConnection> {
        self.realtime.connect().await
    }

    /// Bridge one call until either side stops.
    ///
    /// Sends the session configuration first, then runs both relays. When
    /// one returns, the other is dropped mid-await; with it go the last
    /// senders of both channels, so the model writer closes the model socket
    /// and the caller writer closes the caller socket.
    pub async fn run<S, E>(
        &self,
        model: RealtimeConnection,
        caller_frames: S,
        caller_tx: mpsc::Sender<MediaStreamFrame>,
    ) -> SessionOutcome
    where
        S: Stream<Item = Result<String, E>>,
        E: Display,
    {
        let RealtimeConnection {
            sender: model_tx,
            events: model_events,
            mut writer,
        } = model;
        let session = CallSession::shared();

        let exit = 'bridge: {
            for event in self.realtime.opening_events() {
                debug!(event_type = event.event_type(), "Sending opening event");
                if model_tx.send(event).await.is_err() {
                    break 'bridge RelayExit::ModelClosed;
                }
            }

            let inbound = InboundRelay::new(session.clone(), model_tx.clone(), self.registry.clone());
            let outbound = OutboundRelay::new(
                session.clone(),
                caller_tx,
                model_tx,
                self.barge_in,
                self.transcripts.clone(),
            );

            tokio::select! {
                exit = inbound.run(caller_frames) => {
                    info!(reason = %exit, "Inbound relay stopped");
                    exit
                }
                exit = outbound.run(model_events) => {
                    info!(reason = %exit, "Outbound relay stopped");
                    exit
                }
            }
        };

        if tokio::time::timeout(MODEL_CLOSE_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            warn!("Model writer did not finish, aborting");
            writer.abort();
        }

        let stream_sid = session.lock().stream_sid().map(str::to_owned);
        if let Some(stream_sid) = stream_sid {
            self.registry.remove(&stream_sid, &session);
        }

        let snapshot = session.lock().snapshot();
        if exit.is_clean() {
            info!(reason = %exit, "Session ended");
        } else {
            warn!(reason = %exit, "Session ended on transport error");
        }

        SessionOutcome { exit, snapshot }
    }
}
