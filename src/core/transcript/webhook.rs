//! Webhook delivery of transcript events.
//!
//! A single worker drains the transcript queue and POSTs one JSON document
//! per event:
//!
//! ```json
//! {
//!   "transcriptions": [{"id": 1718000000000, "speaker": "Caller", "text": "...",
//!                       "time": "14:03:07", "sentiment": "neutral", "confidence": null,
//!                       "call_sid": "MZ...", "is_partial": false}],
//!   "insights": []
//! }
//! ```
//!
//! Failed deliveries are retried with a linearly growing delay; once the
//! attempts are spent the record is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{Speaker, TranscriptEvent};

/// Caller phrases that raise a warning insight.
const DISTRESS_KEYWORDS: [&str; 5] = ["help", "emergency", "urgent", "scared", "afraid"];

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request to {url} failed: {error}")]
    Request { url: String, error: String },

    #[error("Webhook {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Retry policy for webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per record, including the first.
    /// Default: 3
    pub max_attempts: u32,

    /// Delay after the first failure; the n-th failure waits n times this.
    /// Default: 1s
    pub initial_backoff: Duration,

    /// Per-request timeout.
    /// Default: 10s
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(attempt.max(1))
    }

    /// Check if another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Strictly increasing millisecond-based record ids.
///
/// Ids advance by at least 2 so `id + 1` is free for an attached insight.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    last: AtomicU64,
}

impl RecordIdGenerator {
    pub fn next_id(&self) -> u64 {
        let now_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = now_ms.max(last.saturating_add(2));
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionRecord {
    pub id: u64,
    pub speaker: &'static str,
    pub text: String,
    pub time: String,
    pub sentiment: &'static str,
    pub confidence: Option<f32>,
    pub call_sid: String,
    pub is_partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub transcriptions: Vec<TranscriptionRecord>,
    pub insights: Vec<Insight>,
}

impl WebhookPayload {
    /// Build the document for one transcript event.
    pub fn from_event(event: &TranscriptEvent, id: u64, time: String) -> Self {
        let mut insights = Vec::new();
        if event.speaker == Speaker::Caller && contains_distress_keyword(&event.text) {
            insights.push(Insight {
                id: id + 1,
                kind: "warning",
                text: format!("Detected concern in caller's message: '{}'", event.text),
            });
        }

        Self {
            transcriptions: vec![TranscriptionRecord {
                id,
                speaker: event.speaker.label(),
                text: event.text.clone(),
                time,
                sentiment: "neutral",
                confidence: None,
                call_sid: event.call_id.clone(),
                is_partial: event.is_partial,
            }],
            insights,
        }
    }
}

fn contains_distress_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    DISTRESS_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// UTC time of day as `HH:MM:SS`.
fn time_of_day() -> String {
    let format = time::macros::format_description!("[hour]:[minute]:[second]");
    time::OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_default()
}

/// Drains the transcript queue and delivers each event to the webhook.
#[derive(Debug)]
pub struct WebhookWorker {
    client: reqwest::Client,
    url: String,
    retry: RetryConfig,
    ids: RecordIdGenerator,
}

impl WebhookWorker {
    pub fn new(url: impl Into<String>, retry: RetryConfig) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| WebhookError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            retry,
            ids: RecordIdGenerator::default(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the worker on its own task until the queue closes.
    pub fn spawn(self, rx: mpsc::Receiver<TranscriptEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    pub async fn run(self, mut rx: mpsc::Receiver<TranscriptEvent>) {
        debug!(url = %self.url, "Webhook worker started");

        while let Some(event) = rx.recv().await {
            let payload = self.build_payload(&event);
            if let Err(e) = self.deliver(&payload).await {
                error!(
                    url = %self.url,
                    call_id = %event.call_id,
                    error = %e,
                    "Dropping transcript record"
                );
            }
        }

        debug!(url = %self.url, "Webhook worker stopped");
    }

    pub fn build_payload(&self, event: &TranscriptEvent) -> WebhookPayload {
        WebhookPayload::from_event(event, self.ids.next_id(), time_of_day())
    }

    /// POST the payload, retrying per the configured policy.
    ///
    /// Returns the number of attempts used on success.
    pub async fn deliver(&self, payload: &WebhookPayload) -> Result<u32, WebhookError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_error = match self.post_once(payload).await {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };

            if !self.retry.should_retry(attempt) {
                return Err(WebhookError::RetriesExhausted {
                    attempts: attempt,
                    last_error: last_error.to_string(),
                });
            }

            let delay = self.retry.calculate_delay(attempt);
            warn!(
                url = %self.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Webhook delivery failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn post_once(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookError::Request {
                url: self.url.clone(),
                error: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        debug!(url = %self.url, status = %status, "Webhook delivered");
        Ok(())
    }
}
