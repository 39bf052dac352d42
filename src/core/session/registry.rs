//! Registry of live call sessions keyed by stream identifier.
//!
//! Entries are inserted when a stream starts and removed when its session
//! tears down, so the map only ever holds calls that are currently bridged.

use std::sync::Arc;

use dashmap::DashMap;

use super::state::{SessionSnapshot, SharedSession};

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its stream identifier.
    pub fn insert(&self, stream_sid: impl Into<String>, session: SharedSession) {
        let stream_sid = stream_sid.into();
        if self.sessions.insert(stream_sid.clone(), session).is_some() {
            tracing::warn!(stream_sid = %stream_sid, "Replaced existing session registration");
        }
    }

    /// Remove the registration for `stream_sid` if it still belongs to `session`.
    pub fn remove(&self, stream_sid: &str, session: &SharedSession) -> bool {
        self.sessions
            .remove_if(stream_sid, |_, registered| Arc::ptr_eq(registered, session))
            .is_some()
    }

    pub fn get(&self, stream_sid: &str) -> Option<SharedSession> {
        self.sessions.get(stream_sid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshots of every registered session, ordered by stream identifier.
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<SharedSession> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut snapshots: Vec<SessionSnapshot> =
            sessions.iter().map(|session| session.lock().snapshot()).collect();
        snapshots.sort_by(|a, b| a.stream_sid.cmp(&b.stream_sid));
        snapshots
    }
}
