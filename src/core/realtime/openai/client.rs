//! OpenAI Realtime API WebSocket client.
//!
//! Opens the model-side channel for one call. The socket is split: a writer
//! task owns the sink and drains a bounded [`mpsc`] channel of
//! [`ClientEvent`]s, while the read half is exposed as a stream of raw text
//! frames for the outbound relay to decode.
//!
//! Dropping every [`mpsc::Sender`] handed out by a [`RealtimeConnection`]
//! makes the writer send a Close frame and exit, so the channel cannot outlive
//! the relays that use it.

use futures::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message, client::IntoClientRequest};

use super::config::{OPENAI_BETA_HEADER_VALUE, OpenAIRealtimeVoice, TELEPHONY_AUDIO_FORMAT};
use super::messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, SessionConfig, TurnDetection,
};
use crate::core::realtime::base::{
    RealtimeConfig, RealtimeError, RealtimeResult, TurnDetectionConfig,
};

/// Channel capacity for outgoing model events.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Raw text frames read from the model channel.
pub type ModelEventStream = BoxStream<'static, RealtimeResult<String>>;

/// OpenAI Realtime API client for one telephony bridge configuration.
#[derive(Debug, Clone)]
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    voice: OpenAIRealtimeVoice,
}

/// An open model channel.
pub struct RealtimeConnection {
    /// Queue feeding the writer task
    pub sender: mpsc::Sender<ClientEvent>,
    /// Text frames from the model, ending when the socket closes
    pub events: ModelEventStream,
    /// Writer task; completes once every sender is dropped and the Close frame is out
    pub writer: JoinHandle<()>,
}

impl std::fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("sender_closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

impl OpenAIRealtime {
    /// Create a client, validating the configuration.
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        if config.model.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "Model is required".to_string(),
            ));
        }

        let voice = config
            .voice
            .as_deref()
            .map(OpenAIRealtimeVoice::from_str_or_default)
            .unwrap_or_default();

        Ok(Self { config, voice })
    }

    /// Get the configured voice.
    pub fn voice(&self) -> OpenAIRealtimeVoice {
        self.voice
    }

    /// Get the underlying configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Build the WebSocket URL with the model query parameter.
    pub fn build_ws_url(&self) -> RealtimeResult<String> {
        let mut url = url::Url::parse(&self.config.url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid URL: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "Unsupported URL scheme '{other}', expected ws or wss"
                )));
            }
        }

        url.query_pairs_mut().append_pair("model", &self.config.model);
        Ok(url.into())
    }

    /// Build the session configuration sent right after connecting.
    ///
    /// The audio codec is fixed to G.711 u-law in both directions; telephony
    /// payloads are passed through without transcoding.
    pub fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.config.instructions.clone(),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some(TELEPHONY_AUDIO_FORMAT.as_str().to_string()),
            output_audio_format: Some(TELEPHONY_AUDIO_FORMAT.as_str().to_string()),
            input_audio_transcription: self
                .config
                .input_audio_transcription
                .as_ref()
                .filter(|t| !t.model.is_empty())
                .map(|t| InputAudioTranscription {
                    model: t.model.clone(),
                }),
            turn_detection: Some(match &self.config.turn_detection {
                TurnDetectionConfig::ServerVad {
                    threshold,
                    prefix_padding_ms,
                    silence_duration_ms,
                } => TurnDetection::ServerVad {
                    threshold: *threshold,
                    prefix_padding_ms: *prefix_padding_ms,
                    silence_duration_ms: *silence_duration_ms,
                },
            }),
            temperature: self.config.temperature,
        }
    }

    /// Events to send before any caller audio: the session update, then the
    /// optional greeting.
    pub fn opening_events(&self) -> Vec<ClientEvent> {
        let mut events = vec![ClientEvent::SessionUpdate {
            session: self.build_session_config(),
        }];

        if let Some(greeting) = self
            .config
            .initial_greeting
            .as_deref()
            .filter(|g| !g.trim().is_empty())
        {
            events.push(ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(greeting),
            });
            events.push(ClientEvent::ResponseCreate);
        }

        events
    }

    /// Open the model channel.
    ///
    /// Sends `Authorization: Bearer <key>` and the `OpenAI-Beta` protocol
    /// marker. A 401/403 handshake response maps to
    /// [`RealtimeError::AuthenticationFailed`].
    pub async fn connect(&self) -> RealtimeResult<RealtimeConnection> {
        let url = self.build_ws_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| {
                RealtimeError::InvalidConfiguration("API key is not a valid header".to_string())
            })?;
        let headers = request.headers_mut();
        headers.insert(http::header::AUTHORIZATION, auth);
        headers.insert(
            "OpenAI-Beta",
            HeaderValue::from_static(OPENAI_BETA_HEADER_VALUE),
        );

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(response)
                    if matches!(response.status().as_u16(), 401 | 403) =>
                {
                    RealtimeError::AuthenticationFailed(format!(
                        "Handshake rejected with status {}",
                        response.status()
                    ))
                }
                other => RealtimeError::ConnectionFailed(other.to_string()),
            })?;

        tracing::info!(model = %self.config.model, "Connected to OpenAI Realtime API");

        let (mut ws_sink, ws_read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };

                tracing::trace!(event_type = event.event_type(), "Sending model event");

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    tracing::error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }

            if let Err(e) = ws_sink.close().await {
                tracing::debug!("Model channel close: {}", e);
            }
            tracing::debug!("Model channel writer stopped");
        });

        let events = futures::stream::unfold(ws_read, |mut read| async move {
            loop {
                match read.next().await? {
                    Ok(Message::Text(text)) => return Some((Ok(text.as_str().to_owned()), read)),
                    Ok(Message::Close(frame)) => {
                        tracing::info!(?frame, "Model channel closed by server");
                        return None;
                    }
                    Ok(Message::Binary(data)) => {
                        tracing::debug!(len = data.len(), "Ignoring binary model frame");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Some((Err(RealtimeError::WebSocketError(e.to_string())), read));
                    }
                }
            }
        })
        .boxed();

        Ok(RealtimeConnection {
            sender: tx,
            events,
            writer,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
