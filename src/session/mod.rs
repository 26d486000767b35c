//! Practice session management
//!
//! This module provides the practice session pipeline:
//! - Session, evaluation and linkage types
//! - `PracticePipeline`: the server-side lifecycle (gate → upload target →
//!   transcribe → grade → commit)
//! - `PracticeFlow`: the client-side recording/submission state machine

mod flow;
mod pipeline;
mod types;

pub use flow::{FlowPhase, PracticeFlow, MAX_ATTEMPTS};
pub use pipeline::{PracticePipeline, StartedSession, StepTimeouts};
pub use types::{
    combined_result, Evaluation, GradeResult, Linkage, Session, TargetItem, CORRECT_THRESHOLD,
    MAX_ERRORS, MAX_IMPROVEMENTS, PARTIAL_THRESHOLD,
};
