pub mod realtime;
pub mod session;
pub mod telephony;
pub mod transcript;

// Re-export commonly used types for convenience
pub use realtime::{OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeResult};

pub use session::{
    BargeInController, CallSession, InterruptionTrigger, RelayExit, SessionOrchestrator,
    SessionOutcome, SessionRegistry, SessionSnapshot,
};

pub use transcript::{Speaker, TranscriptEvent, TranscriptSink, WebhookWorker};
