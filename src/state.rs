//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::core::realtime::{OpenAIRealtime, RealtimeError, RealtimeResult};
use crate::core::session::{BargeInController, SessionOrchestrator, SessionRegistry};
use crate::core::transcript::TranscriptSink;

/// Why a media stream connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("global websocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP websocket connection limit reached")]
    PerIpLimitReached,
}

impl IntoResponse for ConnectionLimitError {
    fn into_response(self) -> Response {
        let status = match self {
            ConnectionLimitError::GlobalLimitReached => StatusCode::SERVICE_UNAVAILABLE,
            ConnectionLimitError::PerIpLimitReached => StatusCode::TOO_MANY_REQUESTS,
        };
        (status, self.to_string()).into_response()
    }
}

/// A reserved media stream slot. Dropping it gives the slot back.
pub struct ConnectionSlot {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionSlot {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}

/// State shared by every route.
pub struct AppState {
    pub config: ServerConfig,
    /// Calls currently bridged, keyed by stream sid
    pub registry: SessionRegistry,
    /// Queue feeding the transcript webhook worker
    pub transcripts: TranscriptSink,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    pub fn new(config: ServerConfig, transcripts: TranscriptSink) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            transcripts,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Build the orchestrator for one call from the current configuration.
    pub fn orchestrator(&self) -> RealtimeResult<SessionOrchestrator> {
        let realtime_config = self
            .config
            .realtime_config()
            .map_err(RealtimeError::InvalidConfiguration)?;
        let realtime = OpenAIRealtime::new(realtime_config)?;

        Ok(SessionOrchestrator::new(
            realtime,
            self.registry.clone(),
            self.transcripts.clone(),
            BargeInController::new(self.config.interruption_trigger),
        ))
    }

    /// Reserve a websocket slot for `ip`, held until the returned guard drops.
    ///
    /// The global limit is checked first; a per-IP rejection gives the
    /// global slot back.
    pub fn try_acquire_connection(
        self: &Arc<Self>,
        ip: IpAddr,
    ) -> Result<ConnectionSlot, ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            self.ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                })
                .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        let per_ip_limit = self.config.max_connections_per_ip;
        let mut entry = self.ip_connections.entry(ip).or_insert(0);
        if *entry >= per_ip_limit {
            drop(entry);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            self.ip_connections.remove_if(&ip, |_, count| *count == 0);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *entry += 1;

        Ok(ConnectionSlot {
            state: Arc::clone(self),
            ip,
        })
    }

    fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
