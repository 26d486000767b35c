use thiserror::Error;

/// Failure taxonomy for the practice session pipeline.
///
/// Configuration errors are fatal and non-retryable. Transport errors on
/// upload/transcription propagate to the caller, who may retry from scratch.
/// Grading failures never appear here: they are absorbed by the fallback
/// grader, so `GradingUnavailable` stays reserved and is never produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage destination is not configured: {0}")]
    Configuration(String),

    #[error("not enough coins: balance {balance}, need {cost}")]
    GateDenied { balance: u32, cost: u32 },

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} already completed")]
    SessionCompleted(String),

    #[error("session {0} already has an evaluation")]
    SessionEvaluated(String),

    #[error("audio upload failed: {0}")]
    UploadFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("grading service unavailable")]
    GradingUnavailable,

    #[error("progress commit failed: {0}")]
    CompletionFailed(String),
}

/// Failures surfaced by the client session state machine.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A record/submit gesture arrived while another attempt is in flight.
    /// Rejected, not queued: at most one session per screen instance.
    #[error("another attempt is already in flight")]
    Busy,

    #[error("no attempt in progress")]
    NotRecording,

    #[error("no finished attempt to act on")]
    NotDone,

    #[error("retry limit reached")]
    RetryExhausted,

    #[error("the answer was already correct")]
    AlreadyCorrect,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
