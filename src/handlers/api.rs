use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::core::session::SessionSnapshot;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        active_sessions: state.registry.len(),
    })
}

/// Snapshot of every call currently bridged, ordered by stream sid
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSnapshot>> {
    Json(state.registry.snapshots())
}
