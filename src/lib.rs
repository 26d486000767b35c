pub mod config;
pub mod entitlement;
pub mod error;
pub mod grading;
pub mod http;
pub mod ledger;
pub mod progress;
pub mod session;
pub mod storage;
pub mod stt;

pub use config::Config;
pub use entitlement::{EntitlementProvider, StaticEntitlement};
pub use error::{FlowError, PipelineError};
pub use grading::{fallback_evaluation, Grader, GraderOutcome, HttpGrader, GRADING_TIMEOUT};
pub use http::{create_router, AppState};
pub use ledger::{
    apply_regen, CoinLedger, JsonFileStore, LedgerStore, MemoryStore, ResourceAccount,
    SpendOutcome, COIN_CAP, REGEN_INTERVAL_SECS, SESSION_COST,
};
pub use progress::{FileProgressTracker, ProgressTracker, ProgressUpdate};
pub use session::{
    combined_result, Evaluation, FlowPhase, GradeResult, Linkage, PracticeFlow, PracticePipeline,
    Session, StartedSession, StepTimeouts, TargetItem, MAX_ATTEMPTS,
};
pub use storage::{AudioStore, LocalAudioStore, StorageError, UploadTarget};
pub use stt::{HttpSttClient, SpeechToText};
