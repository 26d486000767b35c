use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{error, info};

use super::types::{Evaluation, GradeResult, Linkage, Session, TargetItem};
use crate::error::PipelineError;
use crate::grading::{self, Grader};
use crate::ledger::{CoinLedger, SpendOutcome, SESSION_COST};
use crate::progress::{ProgressTracker, ProgressUpdate};
use crate::storage::{AudioStore, StorageError, UploadTarget};
use crate::stt::SpeechToText;

/// Per-step network timeouts. Every network step enforces one: expiry maps
/// to the same typed transport failure as any other error on that step, so
/// a hung upload or transcription can never park a client indefinitely.
#[derive(Debug, Clone)]
pub struct StepTimeouts {
    pub upload: Duration,
    pub transcribe: Duration,
    pub complete: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            upload: Duration::from_secs(15),
            transcribe: Duration::from_secs(30),
            complete: Duration::from_secs(10),
        }
    }
}

/// A freshly started session: the id joining all subsequent steps plus the
/// write-once destination for the recorded audio.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: String,
    pub upload: UploadTarget,
}

/// Server-side practice session lifecycle.
///
/// Steps for one session run in strict sequence (start → transcribe →
/// evaluate → complete); different sessions may be in flight concurrently,
/// keyed by session id. The coin ledger is the only shared mutable state and
/// gates every start.
pub struct PracticePipeline {
    ledger: Arc<CoinLedger>,
    store: Arc<dyn AudioStore>,
    stt: Arc<dyn SpeechToText>,
    grader: Arc<dyn Grader>,
    progress: Arc<dyn ProgressTracker>,
    timeouts: StepTimeouts,

    /// Fire-and-forget session records, retained for audit
    sessions: RwLock<HashMap<String, Session>>,
}

impl PracticePipeline {
    pub fn new(
        ledger: Arc<CoinLedger>,
        store: Arc<dyn AudioStore>,
        stt: Arc<dyn SpeechToText>,
        grader: Arc<dyn Grader>,
        progress: Arc<dyn ProgressTracker>,
    ) -> Self {
        Self {
            ledger,
            store,
            stt,
            grader,
            progress,
            timeouts: StepTimeouts::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Override the per-step timeouts (tests exercise expiry with short ones)
    pub fn with_timeouts(mut self, timeouts: StepTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn ledger(&self) -> &CoinLedger {
        &self.ledger
    }

    /// Start a new gated practice session: spend a coin, then issue the
    /// upload target.
    ///
    /// A missing storage destination fails before the gate so a
    /// configuration error never costs a coin, and neither failure leaves a
    /// partial session behind.
    pub async fn start_session(
        &self,
        linkage: Option<Linkage>,
        target_item: Option<TargetItem>,
    ) -> Result<StartedSession, PipelineError> {
        self.store
            .ready()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        match self.ledger.try_spend(SESSION_COST, "practice session").await {
            SpendOutcome::Denied { balance } => {
                return Err(PipelineError::GateDenied {
                    balance,
                    cost: SESSION_COST,
                });
            }
            SpendOutcome::GrantedUnpersisted { .. } => {
                // Explicit policy: proceed optimistically on a failed
                // ledger write-back; the spend itself succeeded.
                error!("Coin spend not persisted; continuing with session start");
            }
            SpendOutcome::Granted { .. } => {}
        }

        let session = Session::new(linkage, target_item);
        let session_id = session.session_id.to_string();

        let upload = self
            .store
            .issue_upload_target(&session_id)
            .await
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        info!("Practice session started: {session_id}");

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), session);

        Ok(StartedSession { session_id, upload })
    }

    /// Voice path: upload the recorded artifact, transcribe it, grade it.
    ///
    /// Upload and transcription failures (including timeout expiry)
    /// propagate as typed errors; grading can only ever resolve, through the
    /// primary grader or its deterministic fallback.
    pub async fn submit_recording(
        &self,
        session_id: &str,
        content_type: &str,
        audio: Vec<u8>,
    ) -> Result<Evaluation, PipelineError> {
        let target_item = self.pending_target(session_id).await?;

        // Upload to the issued write-once target
        match timeout(
            self.timeouts.upload,
            self.store.put_object(session_id, content_type, &audio),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(upload_error(e)),
            Err(_) => {
                return Err(PipelineError::UploadFailed(format!(
                    "upload timed out after {:?}",
                    self.timeouts.upload
                )))
            }
        }

        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(session_id) {
                session.audio_ref = Some(session_id.to_string());
            }
        }

        // Read the object back from the shared store and transcribe it
        let transcript = match timeout(self.timeouts.transcribe, self.transcribe(session_id)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(PipelineError::TranscriptionFailed(format!(
                    "transcription timed out after {:?}",
                    self.timeouts.transcribe
                )))
            }
        };

        Ok(self
            .grade_and_record(session_id, transcript, target_item)
            .await)
    }

    /// Text path: the learner typed instead of spoke. The transcription step
    /// is skipped entirely and the supplied text is graded verbatim.
    pub async fn submit_text(
        &self,
        session_id: &str,
        text: String,
    ) -> Result<Evaluation, PipelineError> {
        let target_item = self.pending_target(session_id).await?;

        Ok(self.grade_and_record(session_id, text, target_item).await)
    }

    /// Commit a session's combined result to progress tracking.
    ///
    /// Best-effort and independently retryable: a failure here is reported
    /// but never un-publishes the evaluation the learner already saw. Each
    /// session commits at most once.
    pub async fn complete_linked_action(
        &self,
        session_id: &str,
        combined: GradeResult,
        score: u8,
    ) -> Result<ProgressUpdate, PipelineError> {
        let linkage = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(session_id)
                .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;

            if session.completed {
                return Err(PipelineError::SessionCompleted(session_id.to_string()));
            }

            session.linkage.clone()
        };

        let update = match timeout(
            self.timeouts.complete,
            self.progress.commit(linkage.as_ref(), combined, score),
        )
        .await
        {
            Ok(Ok(update)) => update,
            Ok(Err(e)) => {
                error!("Progress commit failed for {session_id}: {e:#}");
                return Err(PipelineError::CompletionFailed(format!("{e:#}")));
            }
            Err(_) => {
                error!("Progress commit timed out for {session_id}");
                return Err(PipelineError::CompletionFailed(format!(
                    "commit timed out after {:?}",
                    self.timeouts.complete
                )));
            }
        };

        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.completed = true;
        }

        info!(
            "Session {session_id} completed: +{} points, {} unlocked",
            update.points,
            update.unlocked.len()
        );

        Ok(update)
    }

    /// Audit lookup
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Fetch the session's grader context, rejecting unknown or
    /// already-graded sessions. Session ids are never reused; a second
    /// submission belongs to a new session.
    async fn pending_target(
        &self,
        session_id: &str,
    ) -> Result<Option<TargetItem>, PipelineError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;

        if session.evaluation.is_some() {
            return Err(PipelineError::SessionEvaluated(session_id.to_string()));
        }

        Ok(session.target_item.clone())
    }

    async fn transcribe(&self, session_id: &str) -> Result<String, PipelineError> {
        let audio = self
            .store
            .read_object(session_id)
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(e.to_string()))?;

        self.stt
            .transcribe(&audio)
            .await
            .map_err(|e| PipelineError::TranscriptionFailed(format!("{e:#}")))
    }

    /// Grade the transcript and record both onto the session. Infallible:
    /// the grading step always resolves, via fallback if necessary.
    async fn grade_and_record(
        &self,
        session_id: &str,
        transcript: String,
        target_item: Option<TargetItem>,
    ) -> Evaluation {
        let evaluation =
            grading::evaluate(self.grader.as_ref(), &transcript, target_item.as_ref()).await;

        info!(
            "Session {session_id} evaluated: score={} result={:?}",
            evaluation.score, evaluation.result
        );

        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.transcript = Some(transcript);
            session.evaluation = Some(evaluation.clone());
        }

        evaluation
    }
}

fn upload_error(e: StorageError) -> PipelineError {
    match e {
        StorageError::Unconfigured => PipelineError::Configuration(e.to_string()),
        other => PipelineError::UploadFailed(other.to_string()),
    }
}
