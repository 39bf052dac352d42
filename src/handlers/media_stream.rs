//! Telephony media stream WebSocket handler
//!
//! Each upgraded connection is one phone call. The handler opens the realtime
//! model channel first; if that fails the caller socket is closed straight
//! away. Otherwise the socket is split into a reader feeding the session
//! orchestrator and a writer task draining outgoing frames.

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt, future};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::telephony::MediaStreamFrame;
use crate::state::AppState;

/// Outgoing caller frames buffered before the relay waits on the socket
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// How long the caller writer gets to flush and send its Close frame
const CALLER_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Media stream WebSocket handler
///
/// Upgrades `GET /media-stream` and bridges the call to the realtime model.
/// Answers 503 when the server is full and 429 when the peer address is over
/// its share; the slot is held until the call ends.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let slot = match state.try_acquire_connection(addr.ip()) {
        Ok(slot) => slot,
        Err(e) => {
            warn!(ip = %addr.ip(), error = %e, "Rejecting media stream");
            return e.into_response();
        }
    };
    debug!(ip = %slot.ip(), "Media stream upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            let span = info_span!(
                "media_stream",
                connection_id = %Uuid::new_v4(),
                stream_sid = tracing::field::Empty,
            );
            bridge_call(socket, state).instrument(span).await;
            drop(slot);
        })
}

async fn bridge_call(mut socket: WebSocket, state: Arc<AppState>) {
    info!("Client connected");

    let orchestrator = match state.orchestrator() {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "Realtime model is not configured");
            close_socket(&mut socket).await;
            return;
        }
    };

    let model = match orchestrator.connect().await {
        Ok(model) => model,
        Err(e) => {
            error!(error = %e, "Failed to connect to realtime model");
            close_socket(&mut socket).await;
            return;
        }
    };

    let (sink, stream) = socket.split();
    let (caller_tx, caller_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let mut writer = tokio::spawn(write_caller_frames(sink, caller_rx).in_current_span());

    let outcome = orchestrator
        .run(model, caller_frames(stream), caller_tx)
        .await;

    if timeout(CALLER_CLOSE_TIMEOUT, &mut writer).await.is_err() {
        warn!("Caller writer did not finish, aborting");
        writer.abort();
    }

    info!(
        reason = %outcome.exit,
        pending_marks = outcome.snapshot.pending_marks,
        "Client disconnected"
    );
}

async fn close_socket(socket: &mut WebSocket) {
    if let Err(e) = socket.send(Message::Close(None)).await {
        debug!(error = %e, "Failed to close media stream");
    }
}

/// Text frames of the caller socket, ending at the first Close frame.
fn caller_frames(
    stream: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<String, axum::Error>> {
    stream
        .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        })
}

/// Sole owner of the caller sink. Sends Close once every sender is gone.
async fn write_caller_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<MediaStreamFrame>,
) {
    while let Some(frame) = frames.recv().await {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, event = frame.event_name(), "Failed to serialize media stream frame");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(json.into())).await {
            warn!(error = %e, "Failed to write to caller, dropping remaining frames");
            return;
        }
    }

    if let Err(e) = sink.send(Message::Close(None)).await {
        debug!(error = %e, "Caller socket already closed");
    }
}
