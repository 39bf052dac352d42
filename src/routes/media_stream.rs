//! Media stream WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream WebSocket router
///
/// # Endpoint
///
/// `GET /media-stream` - WebSocket upgrade for a telephony media stream
///
/// # Protocol
///
/// The telephony provider sends JSON text frames (`connected`, `start`,
/// `media`, `mark`, `stop`). The server answers with `media` frames carrying
/// base64 mu-law audio, a `mark` after each audio chunk, and `clear` when the
/// caller interrupts the assistant.
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
