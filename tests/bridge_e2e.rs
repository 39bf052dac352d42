//! End-to-end bridge tests
//!
//! Runs the real router on a random port with a mock realtime model server
//! behind it, and drives the call from a WebSocket client playing the
//! telephony provider.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message};

use callbridge::{
    ServerConfig, core::InterruptionTrigger, core::TranscriptEvent, core::TranscriptSink,
    routes, state::AppState,
};

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the mock realtime model.
struct MockModel {
    addr: SocketAddr,
    /// Text frames received from the bridge; `None` once the bridge closes
    received: mpsc::UnboundedReceiver<Option<Value>>,
    /// Frames to push to the bridge
    outgoing: mpsc::UnboundedSender<Message>,
}

impl MockModel {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            let (mut write, mut read) = ws.split();

            tokio::spawn(async move {
                while let Some(message) = outgoing_rx.recv().await {
                    let closing = matches!(message, Message::Close(_));
                    if write.send(message).await.is_err() || closing {
                        break;
                    }
                }
            });

            while let Some(Ok(message)) = read.next().await {
                match message {
                    Message::Text(text) => {
                        let value: Value = serde_json::from_str(text.as_str()).unwrap();
                        let _ = received_tx.send(Some(value));
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            let _ = received_tx.send(None);
        });

        Self {
            addr,
            received,
            outgoing,
        }
    }

    async fn next(&mut self) -> Option<Value> {
        timeout(STEP_TIMEOUT, self.received.recv())
            .await
            .expect("timed out waiting for the bridge")
            .flatten()
    }

    fn send(&self, event: Value) {
        self.outgoing.send(Message::text(event.to_string())).unwrap();
    }

    fn close(&self) {
        self.outgoing.send(Message::Close(None)).unwrap();
    }
}

fn config(model_addr: SocketAddr) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        openai_api_key: Some("sk-test".to_string()),
        openai_realtime_url: format!("ws://{model_addr}/v1/realtime"),
        openai_realtime_model: "gpt-4o-realtime-preview".to_string(),
        openai_voice: "sage".to_string(),
        system_instructions: "You are a helpful phone assistant.".to_string(),
        openai_temperature: 0.8,
        input_transcription_model: Some("whisper-1".to_string()),
        interruption_trigger: InterruptionTrigger::SpeechStarted,
        initial_greeting: None,
        webhook_url: None,
        webhook_max_attempts: 3,
        webhook_timeout_seconds: 10,
        webhook_initial_backoff_ms: 1000,
        webhook_queue_capacity: 16,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
        max_websocket_connections: None,
        max_connections_per_ip: 100,
    }
}

async fn serve(state: std::sync::Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_router(state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

type CallerSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn send_frame(caller: &mut CallerSocket, frame: Value) {
    caller.send(Message::text(frame.to_string())).await.unwrap();
}

/// Next JSON frame from the bridge, or `None` once the socket closes.
async fn next_frame(caller: &mut CallerSocket) -> Option<Value> {
    loop {
        let message = timeout(STEP_TIMEOUT, caller.next())
            .await
            .expect("timed out waiting for caller frame");
        match message {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).unwrap());
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

fn media(timestamp: u64, payload: &str) -> Value {
    json!({
        "event": "media",
        "streamSid": "MZ100",
        "media": {"track": "inbound", "chunk": "1", "timestamp": timestamp.to_string(), "payload": payload}
    })
}

#[tokio::test]
async fn test_call_with_barge_in() {
    let mut model = MockModel::start().await;
    let (transcripts, mut transcript_rx) = TranscriptSink::channel(16);
    let state = AppState::new(config(model.addr), transcripts);
    let server = serve(state.clone()).await;

    let (mut caller, _) = connect_async(format!("ws://{server}/media-stream"))
        .await
        .unwrap();

    let session_update = model.next().await.unwrap();
    assert_eq!(session_update["type"], "session.update");
    assert_eq!(session_update["session"]["input_audio_format"], "g711_ulaw");
    assert_eq!(session_update["session"]["output_audio_format"], "g711_ulaw");
    assert_eq!(session_update["session"]["voice"], "sage");

    send_frame(&mut caller, json!({"event": "connected", "protocol": "Call", "version": "1.0.0"})).await;
    send_frame(
        &mut caller,
        json!({"event": "start", "start": {"streamSid": "MZ100", "callSid": "CA100"}}),
    )
    .await;
    send_frame(&mut caller, media(0, "AAAA")).await;

    let append = model.next().await.unwrap();
    assert_eq!(append, json!({"type": "input_audio_buffer.append", "audio": "AAAA"}));

    model.send(json!({
        "type": "response.audio.delta",
        "response_id": "resp_1",
        "item_id": "item_A",
        "output_index": 0,
        "content_index": 0,
        "delta": "f/9/"
    }));

    let media_frame = next_frame(&mut caller).await.unwrap();
    assert_eq!(
        media_frame,
        json!({"event": "media", "streamSid": "MZ100", "media": {"payload": "f/9/"}})
    );
    let mark_frame = next_frame(&mut caller).await.unwrap();
    assert_eq!(mark_frame["event"], "mark");
    assert_eq!(mark_frame["streamSid"], "MZ100");
    assert!(
        mark_frame["mark"]["name"]
            .as_str()
            .unwrap()
            .starts_with("responsePart")
    );

    let sessions = state.registry.snapshots();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].active_turn_id.as_deref(), Some("item_A"));
    assert_eq!(sessions[0].pending_marks, 1);

    send_frame(&mut caller, media(1200, "BBBB")).await;
    let append = model.next().await.unwrap();
    assert_eq!(append["audio"], "BBBB");

    model.send(json!({
        "type": "input_audio_buffer.speech_started",
        "audio_start_ms": 1180,
        "item_id": "item_B"
    }));

    let truncate = model.next().await.unwrap();
    assert_eq!(
        truncate,
        json!({
            "type": "conversation.item.truncate",
            "item_id": "item_A",
            "content_index": 0,
            "audio_end_ms": 1200
        })
    );
    let clear = next_frame(&mut caller).await.unwrap();
    assert_eq!(clear, json!({"event": "clear", "streamSid": "MZ100"}));

    model.send(json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_B",
        "content_index": 0,
        "transcript": "Wait, I need help"
    }));
    let TranscriptEvent {
        call_id,
        text,
        is_partial,
        ..
    } = timeout(STEP_TIMEOUT, transcript_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(call_id, "MZ100");
    assert_eq!(text, "Wait, I need help");
    assert!(!is_partial);

    send_frame(&mut caller, json!({"event": "stop", "streamSid": "MZ100"})).await;

    assert_eq!(model.next().await, None);
    assert_eq!(next_frame(&mut caller).await, None);

    // Registry cleanup happens after both channels close
    for _ in 0..50 {
        if state.registry.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_model_close_closes_caller() {
    let mut model = MockModel::start().await;
    let state = AppState::new(config(model.addr), TranscriptSink::disabled());
    let server = serve(state).await;

    let (mut caller, _) = connect_async(format!("ws://{server}/media-stream"))
        .await
        .unwrap();
    assert_eq!(model.next().await.unwrap()["type"], "session.update");

    send_frame(
        &mut caller,
        json!({"event": "start", "start": {"streamSid": "MZ200"}}),
    )
    .await;

    model.close();
    assert_eq!(model.next().await, None);

    let frame = next_frame(&mut caller).await;
    assert_eq!(frame, None);
}

#[tokio::test]
async fn test_unreachable_model_closes_caller() {
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let model_addr = unused.local_addr().unwrap();
    drop(unused);

    let state = AppState::new(config(model_addr), TranscriptSink::disabled());
    let server = serve(state.clone()).await;

    let (mut caller, _) = connect_async(format!("ws://{server}/media-stream"))
        .await
        .unwrap();

    assert_eq!(next_frame(&mut caller).await, None);
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_health_over_http() {
    let model = MockModel::start().await;
    let state = AppState::new(config(model.addr), TranscriptSink::disabled());
    let server = serve(state).await;

    let body: Value = reqwest::get(format!("http://{server}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "OK", "active_sessions": 0}));
}

#[tokio::test]
async fn test_connection_cap_refuses_second_call() {
    let mut model = MockModel::start().await;
    let mut config = config(model.addr);
    config.max_websocket_connections = Some(1);
    let state = AppState::new(config, TranscriptSink::disabled());
    let server = serve(state.clone()).await;

    let (mut caller, _) = connect_async(format!("ws://{server}/media-stream"))
        .await
        .unwrap();
    assert_eq!(model.next().await.unwrap()["type"], "session.update");
    assert_eq!(state.ws_connection_count(), 1);

    match connect_async(format!("ws://{server}/media-stream")).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 503);
        }
        Err(e) => panic!("expected 503 for the second call, got {e}"),
        Ok(_) => panic!("second call was accepted over the cap"),
    }
    assert_eq!(state.ws_connection_count(), 1);

    send_frame(&mut caller, json!({"event": "stop", "streamSid": "MZ300"})).await;
    assert_eq!(next_frame(&mut caller).await, None);

    for _ in 0..50 {
        if state.ws_connection_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.ws_connection_count(), 0);
}
