//! Caller to model relay.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::RelayExit;
use super::registry::SessionRegistry;
use super::state::SharedSession;
use crate::core::realtime::ClientEvent;
use crate::core::telephony::MediaStreamEvent;

/// Consumes caller frames until the caller side closes or the call stops.
pub struct InboundRelay {
    session: SharedSession,
    model_tx: mpsc::Sender<ClientEvent>,
    registry: SessionRegistry,
}

impl InboundRelay {
    pub fn new(
        session: SharedSession,
        model_tx: mpsc::Sender<ClientEvent>,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            session,
            model_tx,
            registry,
        }
    }

    /// Run until the caller stream ends, errors, sends `stop`, or the model
    /// channel can no longer accept audio.
    pub async fn run<S, E>(mut self, frames: S) -> RelayExit
    where
        S: Stream<Item = Result<String, E>>,
        E: Display,
    {
        let mut frames = std::pin::pin!(frames);

        loop {
            let text = match frames.next().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => return RelayExit::CallerError(e.to_string()),
                None => return RelayExit::CallerClosed,
            };

            let event = match serde_json::from_str::<MediaStreamEvent>(&text) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed media stream frame");
                    continue;
                }
            };

            if let Err(exit) = self.handle_event(event).await {
                return exit;
            }
        }
    }

    async fn handle_event(&mut self, event: MediaStreamEvent) -> Result<(), RelayExit> {
        match event {
            MediaStreamEvent::Start { start } => {
                let previous = self
                    .session
                    .lock()
                    .start(start.stream_sid.clone(), start.call_sid.clone());

                if let Some(previous) = previous {
                    self.registry.remove(&previous, &self.session);
                }
                self.registry
                    .insert(start.stream_sid.clone(), self.session.clone());

                tracing::Span::current().record("stream_sid", start.stream_sid.as_str());
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = start.call_sid.as_deref().unwrap_or("unknown"),
                    "Incoming stream has started"
                );
            }

            MediaStreamEvent::Media { media } => {
                self.session.lock().record_media(media.timestamp);

                if self.model_tx.is_closed() {
                    return Err(RelayExit::ModelClosed);
                }
                self.model_tx
                    .send(ClientEvent::audio_append(media.payload))
                    .await
                    .map_err(|_| RelayExit::ModelClosed)?;
            }

            MediaStreamEvent::Mark { mark } => {
                let popped = self.session.lock().acknowledge_mark();
                match popped {
                    Some(expected) if expected != mark.name => {
                        debug!(expected = %expected, received = %mark.name, "Mark acknowledged out of order");
                    }
                    Some(_) => trace!(name = %mark.name, "Mark acknowledged"),
                    None => debug!(name = %mark.name, "Mark received with empty queue"),
                }
            }

            MediaStreamEvent::Stop => {
                info!("Call stopped by telephony provider");
                return Err(RelayExit::CallStopped);
            }

            MediaStreamEvent::Connected { protocol } => {
                debug!(protocol = protocol.as_deref().unwrap_or("unknown"), "Media stream connected");
            }

            MediaStreamEvent::Dtmf { dtmf } => {
                debug!(dtmf = %dtmf, "Ignoring DTMF event");
            }

            MediaStreamEvent::Unrecognized => {
                debug!("Ignoring unrecognized media stream event");
            }
        }

        Ok(())
    }
}
