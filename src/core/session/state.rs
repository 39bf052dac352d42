//! Per-call session state.
//!
//! Both relays share one [`CallSession`] behind a [`parking_lot::Mutex`].
//! Every mutation is a named method; the lock is only ever held for the
//! duration of one such call and never across an `.await`.
//!
//! Field ownership:
//! - `latest_media_timestamp_ms` is written by the inbound relay
//! - the mark queue head is popped by the inbound relay
//! - turn tracking and mark pushes belong to the outbound relay, which also
//!   runs the barge-in reset

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Prefix of every playback mark name sent to the caller side.
pub const MARK_NAME_PREFIX: &str = "responsePart";

/// Shared handle used by the two relay tasks of one call.
pub type SharedSession = Arc<Mutex<CallSession>>;

/// Mutable state of one bridged call.
#[derive(Debug, Default)]
pub struct CallSession {
    stream_sid: Option<String>,
    call_sid: Option<String>,
    latest_media_timestamp_ms: u64,
    active_turn_id: Option<String>,
    response_start_timestamp_ms: Option<u64>,
    mark_queue: VecDeque<String>,
    mark_seq: u64,
}

/// Result of recording one forwarded audio delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDispatch {
    /// Stream the media and mark frames must be tagged with
    pub stream_sid: String,
    /// Name of the mark just enqueued
    pub mark_name: String,
    /// True when this delta began a new assistant turn
    pub turn_started: bool,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub stream_sid: Option<String>,
    pub call_sid: Option<String>,
    pub latest_media_timestamp_ms: u64,
    pub active_turn_id: Option<String>,
    pub response_start_timestamp_ms: Option<u64>,
    pub pending_marks: usize,
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session wrapped for sharing between relays.
    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Begin a stream: assign identifiers and reset the timeline and turn.
    ///
    /// Returns the previous stream identifier when it differs from the new one.
    pub fn start(&mut self, stream_sid: impl Into<String>, call_sid: Option<String>) -> Option<String> {
        let stream_sid = stream_sid.into();
        let previous = self
            .stream_sid
            .replace(stream_sid.clone())
            .filter(|prev| *prev != stream_sid);

        self.call_sid = call_sid;
        self.latest_media_timestamp_ms = 0;
        self.active_turn_id = None;
        self.response_start_timestamp_ms = None;
        self.mark_queue.clear();

        previous
    }

    /// Record the caller-side timeline position of a media frame.
    pub fn record_media(&mut self, timestamp_ms: u64) {
        self.latest_media_timestamp_ms = timestamp_ms;
    }

    /// Pop the oldest outstanding mark.
    ///
    /// Returns `None` when nothing was outstanding; that is not an error.
    pub fn acknowledge_mark(&mut self) -> Option<String> {
        self.mark_queue.pop_front()
    }

    /// Record that an audio delta of `item_id` is being forwarded.
    ///
    /// Anchors the turn start to the caller clock when the turn is new, then
    /// enqueues a mark. Returns `None` before the stream has started; the
    /// delta has nowhere to go and no mark is enqueued.
    pub fn on_audio_sent(&mut self, item_id: &str) -> Option<AudioDispatch> {
        let stream_sid = self.stream_sid.clone()?;

        let turn_started = self.active_turn_id.as_deref() != Some(item_id);
        if turn_started {
            self.active_turn_id = Some(item_id.to_string());
            self.response_start_timestamp_ms = Some(self.latest_media_timestamp_ms);
        } else if self.response_start_timestamp_ms.is_none() {
            self.response_start_timestamp_ms = Some(self.latest_media_timestamp_ms);
        }

        self.mark_seq += 1;
        let mark_name = format!("{}-{}", MARK_NAME_PREFIX, self.mark_seq);
        self.mark_queue.push_back(mark_name.clone());

        Some(AudioDispatch {
            stream_sid,
            mark_name,
            turn_started,
        })
    }

    /// Drop all turn tracking after an interruption.
    pub(crate) fn reset_turn(&mut self) {
        self.mark_queue.clear();
        self.active_turn_id = None;
        self.response_start_timestamp_ms = None;
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.call_sid.as_deref()
    }

    pub fn latest_media_timestamp_ms(&self) -> u64 {
        self.latest_media_timestamp_ms
    }

    pub fn active_turn_id(&self) -> Option<&str> {
        self.active_turn_id.as_deref()
    }

    pub fn response_start_timestamp_ms(&self) -> Option<u64> {
        self.response_start_timestamp_ms
    }

    pub fn pending_marks(&self) -> usize {
        self.mark_queue.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stream_sid: self.stream_sid.clone(),
            call_sid: self.call_sid.clone(),
            latest_media_timestamp_ms: self.latest_media_timestamp_ms,
            active_turn_id: self.active_turn_id.clone(),
            response_start_timestamp_ms: self.response_start_timestamp_ms,
            pending_marks: self.mark_queue.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> CallSession {
        let mut session = CallSession::new();
        session.start("MZ1", Some("CA1".to_string()));
        session
    }

    #[test]
    fn test_start_resets_timeline_and_turn() {
        let mut session = started();
        session.record_media(900);
        session.on_audio_sent("A").unwrap();

        assert_eq!(session.start("MZ1", None), None);
        assert_eq!(session.latest_media_timestamp_ms(), 0);
        assert_eq!(session.active_turn_id(), None);
        assert_eq!(session.response_start_timestamp_ms(), None);
        assert_eq!(session.pending_marks(), 0);
    }

    #[test]
    fn test_restart_with_new_sid_reports_previous() {
        let mut session = started();
        assert_eq!(session.start("MZ2", None), Some("MZ1".to_string()));
        assert_eq!(session.stream_sid(), Some("MZ2"));
    }

    #[test]
    fn test_latest_timestamp_follows_last_media_frame() {
        let mut session = started();
        for ts in [0, 20, 40, 60, 35] {
            session.record_media(ts);
        }
        assert_eq!(session.latest_media_timestamp_ms(), 35);
    }

    #[test]
    fn test_audio_before_start_is_not_tracked() {
        let mut session = CallSession::new();
        assert_eq!(session.on_audio_sent("A"), None);
        assert_eq!(session.pending_marks(), 0);
        assert_eq!(session.active_turn_id(), None);
    }

    #[test]
    fn test_first_delta_anchors_turn_to_caller_clock() {
        let mut session = started();
        session.record_media(480);

        let dispatch = session.on_audio_sent("A").unwrap();
        assert!(dispatch.turn_started);
        assert_eq!(dispatch.stream_sid, "MZ1");
        assert_eq!(session.active_turn_id(), Some("A"));
        assert_eq!(session.response_start_timestamp_ms(), Some(480));

        session.record_media(600);
        let dispatch = session.on_audio_sent("A").unwrap();
        assert!(!dispatch.turn_started);
        assert_eq!(session.response_start_timestamp_ms(), Some(480));
    }

    #[test]
    fn test_new_item_reanchors_turn_start() {
        let mut session = started();
        session.on_audio_sent("A").unwrap();
        session.record_media(2000);
        let dispatch = session.on_audio_sent("B").unwrap();
        assert!(dispatch.turn_started);
        assert_eq!(session.active_turn_id(), Some("B"));
        assert_eq!(session.response_start_timestamp_ms(), Some(2000));
    }

    #[test]
    fn test_marks_match_deltas_and_pop_in_order() {
        let mut session = started();
        let names: Vec<String> = (0..4)
            .map(|_| session.on_audio_sent("A").unwrap().mark_name)
            .collect();
        assert_eq!(session.pending_marks(), 4);

        let acked: Vec<String> = std::iter::from_fn(|| session.acknowledge_mark()).collect();
        assert_eq!(acked, names);
        assert_eq!(session.pending_marks(), 0);
    }

    #[test]
    fn test_mark_on_empty_queue_is_noop() {
        let mut session = started();
        session.record_media(100);
        let before = session.snapshot();
        assert_eq!(session.acknowledge_mark(), None);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut session = started();
        session.on_audio_sent("A").unwrap();
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["stream_sid"], "MZ1");
        assert_eq!(json["call_sid"], "CA1");
        assert_eq!(json["active_turn_id"], "A");
        assert_eq!(json["pending_marks"], 1);
    }
}
