//! Model to caller relay.
//!
//! Every recognized model event is recorded through `tracing`; only audio
//! deltas, speech signals and transcript events change state or produce
//! frames.

use std::fmt::Display;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::RelayExit;
use super::barge_in::{BargeInController, SpeechSignal};
use super::state::SharedSession;
use crate::core::realtime::{ClientEvent, ServerEvent};
use crate::core::telephony::MediaStreamFrame;
use crate::core::transcript::{
    ASSISTANT_PARTIAL_MIN_CHARS, CALLER_PARTIAL_MIN_CHARS, PartialTranscript, Speaker,
    TranscriptEvent, TranscriptSink,
};

/// Consumes model events until the model channel closes.
pub struct OutboundRelay {
    session: SharedSession,
    caller_tx: mpsc::Sender<MediaStreamFrame>,
    model_tx: mpsc::Sender<ClientEvent>,
    barge_in: BargeInController,
    transcripts: TranscriptSink,
    assistant_partial: PartialTranscript,
    caller_partial: PartialTranscript,
}

impl OutboundRelay {
    pub fn new(
        session: SharedSession,
        caller_tx: mpsc::Sender<MediaStreamFrame>,
        model_tx: mpsc::Sender<ClientEvent>,
        barge_in: BargeInController,
        transcripts: TranscriptSink,
    ) -> Self {
        Self {
            session,
            caller_tx,
            model_tx,
            barge_in,
            transcripts,
            assistant_partial: PartialTranscript::new(ASSISTANT_PARTIAL_MIN_CHARS),
            caller_partial: PartialTranscript::new(CALLER_PARTIAL_MIN_CHARS),
        }
    }

    /// Run until the model stream ends or errors, or the caller side stops
    /// accepting frames.
    pub async fn run<S, E>(mut self, events: S) -> RelayExit
    where
        S: Stream<Item = Result<String, E>>,
        E: Display,
    {
        let mut events = std::pin::pin!(events);

        loop {
            let text = match events.next().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => return RelayExit::ModelError(e.to_string()),
                None => return RelayExit::ModelClosed,
            };

            let event = match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed model event");
                    continue;
                }
            };

            if let Err(exit) = self.handle_event(event).await {
                return exit;
            }
        }
    }

    async fn handle_event(&mut self, event: ServerEvent) -> Result<(), RelayExit> {
        match event {
            ServerEvent::AudioDelta { item_id, delta, .. } => {
                self.forward_audio(&item_id, &delta).await?;
            }

            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                info!(audio_start_ms, "Speech started detected");
                self.on_speech(SpeechSignal::Started).await?;
            }

            ServerEvent::SpeechStopped { audio_end_ms, .. } => {
                info!(audio_end_ms, "Speech stopped detected");
                let heard = self.caller_partial.take();
                if !heard.is_empty() {
                    debug!(text = %heard, "Complete caller input");
                }
                self.on_speech(SpeechSignal::Stopped).await?;
            }

            ServerEvent::TranscriptionDelta { delta, .. } => {
                trace!(delta = %delta, "Caller transcription delta");
                if let Some(text) = self.caller_partial.push(&delta).map(str::to_owned) {
                    self.emit_transcript(Speaker::Caller, text, true);
                }
            }

            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                info!(transcript = %transcript, "Caller transcript");
                self.caller_partial.take();
                if !transcript.trim().is_empty() {
                    self.emit_transcript(Speaker::Caller, transcript, false);
                }
            }

            ServerEvent::TextDelta { delta, .. } => {
                trace!(delta = %delta, "Assistant text delta");
                self.on_assistant_delta(&delta);
            }

            // Spoken replies finish with audio_transcript.done; their deltas
            // arrive per token and are not forwarded.
            ServerEvent::AudioTranscriptDelta { delta, .. } => {
                trace!(delta = %delta, "Assistant audio transcript delta");
            }

            ServerEvent::ContentDelta { delta, .. } => {
                trace!(delta = delta.text(), "Assistant content delta");
                self.on_assistant_delta(delta.text());
            }

            ServerEvent::ContentDone => {
                let text = self.assistant_partial.take();
                debug!(text = %text, "Complete assistant response");
            }

            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                info!(transcript = %transcript, "Assistant transcript");
                self.assistant_partial.take();
                if !transcript.trim().is_empty() {
                    self.emit_transcript(Speaker::Assistant, transcript, false);
                }
            }

            ServerEvent::ResponseDone { response } => {
                info!(
                    event_type = "response.done",
                    response_id = %response.id,
                    status = response.status.as_deref().unwrap_or("unknown"),
                    "Received model event"
                );
                self.assistant_partial.take();
            }

            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = error.code.as_deref().unwrap_or(""),
                    message = %error.message,
                    "Model reported error"
                );
            }

            ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
                info!(session_id = %session.id, model = session.model.as_deref().unwrap_or(""), "Model session ready");
            }

            ServerEvent::InputAudioBufferCommitted { item_id } => {
                info!(event_type = "input_audio_buffer.committed", item_id = item_id.as_deref().unwrap_or(""), "Received model event");
            }

            ServerEvent::ConversationItemTruncated { item_id, audio_end_ms } => {
                info!(event_type = "conversation.item.truncated", item_id = %item_id, audio_end_ms, "Received model event");
            }

            ServerEvent::ResponseCreated { response } => {
                info!(event_type = "response.created", response_id = %response.id, "Received model event");
            }

            ServerEvent::AudioDone { item_id } => {
                debug!(event_type = "response.audio.done", item_id = item_id.as_deref().unwrap_or(""), "Received model event");
            }

            ServerEvent::RateLimitsUpdated { rate_limits } => {
                debug!(event_type = "rate_limits.updated", limits = rate_limits.len(), "Received model event");
            }

            ServerEvent::Unrecognized => {
                trace!("Ignoring unrecognized model event");
            }
        }

        Ok(())
    }

    /// Forward one audio delta followed by its playback mark.
    async fn forward_audio(&mut self, item_id: &str, delta: &str) -> Result<(), RelayExit> {
        let audio = match BASE64_STANDARD.decode(delta) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(item_id, error = %e, "Dropping undecodable audio delta");
                return Ok(());
            }
        };
        let payload = BASE64_STANDARD.encode(&audio);

        let dispatch = self.session.lock().on_audio_sent(item_id);
        let Some(dispatch) = dispatch else {
            debug!(item_id, "Audio delta before stream start, dropping");
            return Ok(());
        };

        if dispatch.turn_started {
            let start_ms = self.session.lock().response_start_timestamp_ms();
            debug!(item_id, start_ms, "Setting start timestamp for new response");
        }
        trace!(item_id, bytes = audio.len(), "Forwarding audio delta");

        self.send_caller(MediaStreamFrame::media(dispatch.stream_sid.clone(), payload))
            .await?;
        self.send_caller(MediaStreamFrame::mark(dispatch.stream_sid, dispatch.mark_name))
            .await
    }

    async fn on_speech(&mut self, signal: SpeechSignal) -> Result<(), RelayExit> {
        let barge_in = self.barge_in;
        let interruption = barge_in.on_speech(signal, &mut self.session.lock());
        let Some(interruption) = interruption else {
            return Ok(());
        };

        debug!(
            latest_ms = interruption.latest_media_timestamp_ms,
            start_ms = interruption.response_start_timestamp_ms,
            elapsed_ms = interruption.audio_end_ms,
            "Calculating elapsed time for truncation"
        );
        info!(
            item_id = %interruption.item_id,
            audio_end_ms = interruption.audio_end_ms,
            "Interrupting assistant turn"
        );

        self.model_tx
            .send(interruption.truncate_event())
            .await
            .map_err(|_| RelayExit::ModelClosed)?;
        self.send_caller(interruption.clear_frame()).await
    }

    fn on_assistant_delta(&mut self, delta: &str) {
        if let Some(text) = self.assistant_partial.push(delta).map(str::to_owned) {
            self.emit_transcript(Speaker::Assistant, text, true);
        }
    }

    fn emit_transcript(&self, speaker: Speaker, text: String, is_partial: bool) {
        if !self.transcripts.is_enabled() {
            return;
        }
        let call_id = self.session.lock().stream_sid().map(str::to_owned);
        let Some(call_id) = call_id else {
            return;
        };

        self.transcripts.emit(TranscriptEvent {
            call_id,
            speaker,
            text,
            is_partial,
        });
    }

    async fn send_caller(&self, frame: MediaStreamFrame) -> Result<(), RelayExit> {
        self.caller_tx
            .send(frame)
            .await
            .map_err(|_| RelayExit::CallerClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::CallSession;
    use crate::core::transcript::PARTIAL_STEP_CHARS;
    use futures::stream;
    use serde_json::json;

    struct Harness {
        session: SharedSession,
        caller_rx: mpsc::Receiver<MediaStreamFrame>,
        model_rx: mpsc::Receiver<ClientEvent>,
        transcripts: mpsc::Receiver<TranscriptEvent>,
    }

    async fn run_outbound(session: SharedSession, events: Vec<serde_json::Value>) -> (RelayExit, Harness) {
        let (caller_tx, caller_rx) = mpsc::channel(64);
        let (model_tx, model_rx) = mpsc::channel(64);
        let (sink, transcripts) = TranscriptSink::channel(64);

        let relay = OutboundRelay::new(
            session.clone(),
            caller_tx,
            model_tx,
            BargeInController::default(),
            sink,
        );
        let items: Vec<Result<String, std::io::Error>> =
            events.into_iter().map(|e| Ok(e.to_string())).collect();
        let exit = relay.run(stream::iter(items)).await;

        (
            exit,
            Harness {
                session,
                caller_rx,
                model_rx,
                transcripts,
            },
        )
    }

    fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }

    fn started_session(latest_ms: u64) -> SharedSession {
        let session = CallSession::shared();
        session.lock().start("MZ1", Some("CA1".to_string()));
        session.lock().record_media(latest_ms);
        session
    }

    #[tokio::test]
    async fn test_audio_delta_forwards_media_then_mark() {
        let session = started_session(0);
        let (exit, mut h) = run_outbound(
            session,
            vec![json!({"type": "response.audio.delta", "item_id": "A", "delta": "f/9/fw=="})],
        )
        .await;

        assert_eq!(exit, RelayExit::ModelClosed);
        let frames = drain(&mut h.caller_rx);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], MediaStreamFrame::media("MZ1", "f/9/fw=="));
        assert!(matches!(&frames[1], MediaStreamFrame::Mark { stream_sid, .. } if stream_sid == "MZ1"));

        let session = h.session.lock();
        assert_eq!(session.active_turn_id(), Some("A"));
        assert_eq!(session.response_start_timestamp_ms(), Some(0));
        assert_eq!(session.pending_marks(), 1);
    }

    #[tokio::test]
    async fn test_marks_follow_each_delta_in_order() {
        let session = started_session(0);
        let deltas: Vec<_> = ["AAAA", "BBBB", "CCCC"]
            .iter()
            .map(|d| json!({"type": "response.audio.delta", "item_id": "A", "delta": d}))
            .collect();
        let (_, mut h) = run_outbound(session, deltas).await;

        let frames = drain(&mut h.caller_rx);
        let kinds: Vec<_> = frames.iter().map(|f| f.event_name()).collect();
        assert_eq!(kinds, vec!["media", "mark", "media", "mark", "media", "mark"]);
        assert_eq!(h.session.lock().pending_marks(), 3);

        let mark_names: Vec<String> = frames
            .iter()
            .filter_map(|f| match f {
                MediaStreamFrame::Mark { mark, .. } => Some(mark.name.clone()),
                _ => None,
            })
            .collect();
        let acked: Vec<String> =
            std::iter::from_fn(|| h.session.lock().acknowledge_mark()).collect();
        assert_eq!(acked, mark_names);
    }

    #[tokio::test]
    async fn test_delta_before_start_is_dropped() {
        let session = CallSession::shared();
        let (_, mut h) = run_outbound(
            session,
            vec![json!({"type": "response.audio.delta", "item_id": "A", "delta": "AAAA"})],
        )
        .await;

        assert!(drain(&mut h.caller_rx).is_empty());
        assert_eq!(h.session.lock().pending_marks(), 0);
        assert_eq!(h.session.lock().active_turn_id(), None);
    }

    #[tokio::test]
    async fn test_speech_started_interrupts_active_turn() {
        let session = started_session(2000);
        let delta = json!({"type": "response.audio.delta", "item_id": "A", "delta": "AAAA"});

        let (caller_tx, mut caller_rx) = mpsc::channel(64);
        let (model_tx, mut model_rx) = mpsc::channel(64);
        let relay = OutboundRelay::new(
            session.clone(),
            caller_tx,
            model_tx,
            BargeInController::default(),
            TranscriptSink::disabled(),
        );
        let (event_tx, event_rx) = futures::channel::mpsc::unbounded::<Result<String, std::io::Error>>();
        let task = tokio::spawn(relay.run(event_rx));

        event_tx.unbounded_send(Ok(delta.to_string())).unwrap();
        assert!(matches!(caller_rx.recv().await, Some(MediaStreamFrame::Media { .. })));
        assert!(matches!(caller_rx.recv().await, Some(MediaStreamFrame::Mark { .. })));

        session.lock().record_media(5000);
        event_tx
            .unbounded_send(Ok(json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 4900}).to_string()))
            .unwrap();

        assert_eq!(model_rx.recv().await, Some(ClientEvent::truncate("A", 3000)));
        assert_eq!(caller_rx.recv().await, Some(MediaStreamFrame::clear("MZ1")));

        drop(event_tx);
        assert_eq!(task.await.unwrap(), RelayExit::ModelClosed);

        let session = session.lock();
        assert_eq!(session.active_turn_id(), None);
        assert_eq!(session.response_start_timestamp_ms(), None);
        assert_eq!(session.pending_marks(), 0);
    }

    #[tokio::test]
    async fn test_speech_started_without_turn_sends_nothing() {
        let session = started_session(700);
        let (_, mut h) = run_outbound(
            session,
            vec![json!({"type": "input_audio_buffer.speech_started"})],
        )
        .await;

        assert!(drain(&mut h.caller_rx).is_empty());
        assert!(drain(&mut h.model_rx).is_empty());
        assert_eq!(h.session.lock().latest_media_timestamp_ms(), 700);
    }

    #[tokio::test]
    async fn test_response_done_keeps_active_turn() {
        let session = started_session(0);
        let (_, h) = run_outbound(
            session,
            vec![
                json!({"type": "response.audio.delta", "item_id": "A", "delta": "AAAA"}),
                json!({"type": "response.done", "response": {"id": "r1", "status": "completed"}}),
            ],
        )
        .await;
        assert_eq!(h.session.lock().active_turn_id(), Some("A"));
    }

    #[tokio::test]
    async fn test_error_and_unknown_events_do_not_stop_relay() {
        let session = started_session(0);
        let (exit, mut h) = run_outbound(
            session,
            vec![
                json!({"type": "error", "error": {"type": "server_error", "message": "boom"}}),
                json!({"type": "response.output_item.added"}),
                json!({"type": "response.audio.delta", "item_id": "A"}),
                json!({"type": "response.audio.delta", "item_id": "A", "delta": "AAAA"}),
            ],
        )
        .await;

        assert_eq!(exit, RelayExit::ModelClosed);
        assert_eq!(drain(&mut h.caller_rx).len(), 2);
    }

    #[tokio::test]
    async fn test_model_transport_error_ends_relay() {
        let session = started_session(0);
        let (caller_tx, _caller_rx) = mpsc::channel(4);
        let (model_tx, _model_rx) = mpsc::channel(4);
        let relay = OutboundRelay::new(
            session,
            caller_tx,
            model_tx,
            BargeInController::default(),
            TranscriptSink::disabled(),
        );
        let items: Vec<Result<String, std::io::Error>> =
            vec![Err(std::io::Error::other("connection reset"))];
        assert_eq!(
            relay.run(stream::iter(items)).await,
            RelayExit::ModelError("connection reset".to_string())
        );
    }

    #[tokio::test]
    async fn test_closed_caller_channel_ends_relay() {
        let session = started_session(0);
        let (caller_tx, caller_rx) = mpsc::channel(4);
        drop(caller_rx);
        let (model_tx, _model_rx) = mpsc::channel(4);
        let relay = OutboundRelay::new(
            session,
            caller_tx,
            model_tx,
            BargeInController::default(),
            TranscriptSink::disabled(),
        );
        let items: Vec<Result<String, std::io::Error>> = vec![Ok(json!({
            "type": "response.audio.delta", "item_id": "A", "delta": "AAAA"
        })
        .to_string())];
        assert_eq!(relay.run(stream::iter(items)).await, RelayExit::CallerClosed);
    }

    #[tokio::test]
    async fn test_transcripts_partial_and_final() {
        let session = started_session(0);
        let (_, mut h) = run_outbound(
            session,
            vec![
                json!({"type": "conversation.item.input_audio_transcription.delta", "delta": "Hi"}),
                json!({"type": "conversation.item.input_audio_transcription.delta", "delta": " there"}),
                json!({"type": "conversation.item.input_audio_transcription.completed", "transcript": "Hi there"}),
                json!({"type": "response.content.delta", "delta": {"text": "Hello"}}),
                json!({"type": "response.content.delta", "delta": {"text": "!"}}),
                json!({"type": "response.content.done"}),
                json!({"type": "response.audio_transcript.done", "transcript": "Hello!"}),
            ],
        )
        .await;

        let events = drain(&mut h.transcripts);
        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.speaker, e.text.as_str(), e.is_partial))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Speaker::Caller, "Hi there", true),
                (Speaker::Caller, "Hi there", false),
                (Speaker::Assistant, "Hello!", true),
                (Speaker::Assistant, "Hello!", false),
            ]
        );
        assert!(events.iter().all(|e| e.call_id == "MZ1"));
    }

    #[tokio::test]
    async fn test_streamed_reply_emits_bounded_partials() {
        let session = started_session(0);
        let words = ["I ", "can ", "help ", "you ", "with ", "that. "];
        let mut events = Vec::new();
        for _ in 0..10 {
            for word in words {
                events.push(json!({"type": "response.audio_transcript.delta", "delta": word}));
                events.push(json!({"type": "response.content.delta", "delta": {"text": word}}));
            }
        }
        let full = words.concat().repeat(10);
        events.push(json!({"type": "response.audio_transcript.done", "transcript": full.trim_end()}));

        let (_, mut h) = run_outbound(session, events).await;
        let transcripts = drain(&mut h.transcripts);

        let partials: Vec<_> = transcripts.iter().filter(|e| e.is_partial).collect();
        // 60 content deltas, one partial per 24 chars of growth
        assert!(partials.len() >= 2);
        assert!(partials.len() <= full.len() / PARTIAL_STEP_CHARS + 1);
        assert!(partials.iter().all(|e| e.speaker == Speaker::Assistant));
        assert!(partials.windows(2).all(|w| w[1].text.len() > w[0].text.len()));

        let finals: Vec<_> = transcripts.iter().filter(|e| !e.is_partial).collect();
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].text, full.trim_end());
    }

    #[tokio::test]
    async fn test_audio_transcript_deltas_emit_no_partials() {
        let session = started_session(0);
        let (_, mut h) = run_outbound(
            session,
            vec![
                json!({"type": "response.audio_transcript.delta", "delta": "Hello "}),
                json!({"type": "response.audio_transcript.delta", "delta": "there, how are you?"}),
                json!({"type": "response.audio_transcript.done", "transcript": "Hello there, how are you?"}),
            ],
        )
        .await;

        let events = drain(&mut h.transcripts);
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_partial);
    }
}
