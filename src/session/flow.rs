use std::sync::Arc;
use tracing::{info, warn};

use super::pipeline::{PracticePipeline, StartedSession};
use super::types::{combined_result, Evaluation, GradeResult, Linkage, TargetItem};
use crate::error::{FlowError, PipelineError};
use crate::progress::ProgressUpdate;
use crate::storage::AUDIO_CONTENT_TYPE;

/// Attempts allowed per flow before retry is refused
pub const MAX_ATTEMPTS: u32 = 3;

/// Where one screen instance currently is in its practice attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Recording,
    Uploading,
    Transcribing,
    Evaluating,
    Done,
}

/// Client session state machine for one screen instance.
///
/// Drives the pipeline through the press-to-record or type-to-submit flows:
/// `Idle → Recording → Uploading → Transcribing → Evaluating → Done`, with
/// the text path jumping `Idle → Evaluating → Done`. Any transport failure
/// returns the machine to `Idle` with no partial state; error is a
/// side-channel, never a dead end, and the learner may always retry.
///
/// Concurrent input is rejected rather than queued: while a gesture is in
/// flight every new gesture fails with `FlowError::Busy`, so at most one
/// session is in flight per flow.
pub struct PracticeFlow {
    pipeline: Arc<PracticePipeline>,
    linkage: Option<Linkage>,
    target_item: Option<TargetItem>,

    phase: FlowPhase,
    current: Option<StartedSession>,
    evaluation: Option<Evaluation>,
    attempts: u32,
    completed: bool,
}

impl PracticeFlow {
    pub fn new(
        pipeline: Arc<PracticePipeline>,
        linkage: Option<Linkage>,
        target_item: Option<TargetItem>,
    ) -> Self {
        Self {
            pipeline,
            linkage,
            target_item,
            phase: FlowPhase::Idle,
            current: None,
            evaluation: None,
            attempts: 0,
            completed: false,
        }
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.session_id.as_str())
    }

    /// Press-and-hold started: gate a new session and begin recording.
    pub async fn begin_recording(&mut self) -> Result<(), FlowError> {
        self.ensure_idle()?;
        self.start_attempt().await?;
        self.phase = FlowPhase::Recording;
        Ok(())
    }

    /// Released: upload the captured artifact and drive it through
    /// transcription and grading.
    pub async fn finish_recording(&mut self, audio: Vec<u8>) -> Result<Evaluation, FlowError> {
        if self.phase != FlowPhase::Recording {
            return Err(FlowError::NotRecording);
        }

        let session_id = match self.current.as_ref() {
            Some(started) => started.session_id.clone(),
            None => {
                self.phase = FlowPhase::Idle;
                return Err(FlowError::NotRecording);
            }
        };

        // The pipeline drives upload → transcribe → evaluate as one
        // sequential call; a failure at any step lands back in idle.
        self.phase = FlowPhase::Uploading;
        match self
            .pipeline
            .submit_recording(&session_id, AUDIO_CONTENT_TYPE, audio)
            .await
        {
            Ok(evaluation) => {
                self.phase = FlowPhase::Done;
                self.evaluation = Some(evaluation.clone());
                Ok(evaluation)
            }
            Err(e) => {
                // Back to idle, no partial state kept
                warn!("Attempt failed, returning to idle: {e}");
                self.fail_attempt();
                Err(e.into())
            }
        }
    }

    /// Type-to-submit path: skips recording, uploading and transcription.
    pub async fn submit_text(&mut self, text: String) -> Result<Evaluation, FlowError> {
        self.ensure_idle()?;
        self.start_attempt().await?;

        let session_id = match self.current.as_ref() {
            Some(started) => started.session_id.clone(),
            None => {
                self.phase = FlowPhase::Idle;
                return Err(FlowError::NotRecording);
            }
        };

        self.phase = FlowPhase::Evaluating;
        match self.pipeline.submit_text(&session_id, text).await {
            Ok(evaluation) => {
                self.phase = FlowPhase::Done;
                self.evaluation = Some(evaluation.clone());
                Ok(evaluation)
            }
            Err(e) => {
                warn!("Text attempt failed, returning to idle: {e}");
                self.fail_attempt();
                Err(e.into())
            }
        }
    }

    /// Whether the learner may try again from a finished attempt
    pub fn can_retry(&self) -> bool {
        self.phase == FlowPhase::Done
            && self.attempts < MAX_ATTEMPTS
            && self
                .evaluation
                .as_ref()
                .map(|e| e.result != GradeResult::Correct)
                .unwrap_or(false)
    }

    /// Return to idle for another attempt. Only a non-correct result may be
    /// retried; each retry produces a new session under the same linkage and
    /// the completion step is not re-run per attempt.
    pub fn retry(&mut self) -> Result<(), FlowError> {
        if self.phase != FlowPhase::Done {
            return Err(FlowError::NotDone);
        }
        if let Some(evaluation) = &self.evaluation {
            if evaluation.result == GradeResult::Correct {
                return Err(FlowError::AlreadyCorrect);
            }
        }
        if self.attempts >= MAX_ATTEMPTS {
            return Err(FlowError::RetryExhausted);
        }

        info!("Retrying practice attempt ({}/{MAX_ATTEMPTS})", self.attempts);

        self.phase = FlowPhase::Idle;
        self.current = None;
        self.evaluation = None;
        Ok(())
    }

    /// Commit the finished attempt's combined result, once per flow.
    ///
    /// `discrete_ok` carries the outcome of a discrete multiple-choice
    /// component, which downgrades the combined result when wrong. A failed
    /// commit leaves the evaluation in place and may simply be called again.
    pub async fn complete(
        &mut self,
        discrete_ok: Option<bool>,
    ) -> Result<ProgressUpdate, FlowError> {
        if self.phase != FlowPhase::Done {
            return Err(FlowError::NotDone);
        }
        if self.completed {
            return Err(FlowError::Pipeline(PipelineError::SessionCompleted(
                self.session_id().unwrap_or_default().to_string(),
            )));
        }

        let (session_id, evaluation) = match (self.current.as_ref(), self.evaluation.as_ref()) {
            (Some(started), Some(evaluation)) => (started.session_id.clone(), evaluation.clone()),
            _ => return Err(FlowError::NotDone),
        };

        let combined = combined_result(evaluation.result, discrete_ok);

        let update = self
            .pipeline
            .complete_linked_action(&session_id, combined, evaluation.score)
            .await?;

        self.completed = true;
        Ok(update)
    }

    fn ensure_idle(&self) -> Result<(), FlowError> {
        if self.phase == FlowPhase::Idle {
            Ok(())
        } else {
            Err(FlowError::Busy)
        }
    }

    async fn start_attempt(&mut self) -> Result<(), FlowError> {
        let started = self
            .pipeline
            .start_session(self.linkage.clone(), self.target_item.clone())
            .await?;

        self.attempts += 1;
        self.current = Some(started);
        Ok(())
    }

    fn fail_attempt(&mut self) {
        self.phase = FlowPhase::Idle;
        self.current = None;
        self.evaluation = None;
    }
}
