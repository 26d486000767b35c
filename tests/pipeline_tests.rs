// Integration tests for the server-side practice pipeline.
//
// These wire the real ledger and filesystem audio store to mock external
// services and drive whole sessions through start → submit → complete.

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use parla_practice::{
    AudioStore, CoinLedger, GradeResult, LocalAudioStore, MemoryStore, PipelineError,
    PracticePipeline, SpendOutcome, SpeechToText, StaticEntitlement, StepTimeouts, StorageError,
    COIN_CAP, SESSION_COST,
};

mod common;

use common::{
    card_linkage, memory_ledger, target_item, FailingStt, RecordingProgress, StaticGrader,
    StaticStt,
};

struct Harness {
    pipeline: Arc<PracticePipeline>,
    stt: Arc<StaticStt>,
    progress: Arc<RecordingProgress>,
    _uploads: TempDir,
}

fn harness() -> Result<Harness> {
    harness_with(memory_ledger(false))
}

fn harness_with(ledger: Arc<CoinLedger>) -> Result<Harness> {
    let uploads = TempDir::new()?;
    let stt = Arc::new(StaticStt::new("sto molto bene grazie"));
    let progress = Arc::new(RecordingProgress::new());

    let pipeline = Arc::new(PracticePipeline::new(
        ledger,
        Arc::new(LocalAudioStore::new(uploads.path())),
        stt.clone(),
        Arc::new(StaticGrader::scoring(90)),
        progress.clone(),
    ));

    Ok(Harness {
        pipeline,
        stt,
        progress,
        _uploads: uploads,
    })
}

#[tokio::test]
async fn test_voice_session_end_to_end() -> Result<()> {
    let h = harness()?;

    let started = h
        .pipeline
        .start_session(Some(card_linkage()), Some(target_item()))
        .await?;
    assert_eq!(started.upload.key, started.session_id);

    // One coin spent on start
    assert_eq!(
        h.pipeline.ledger().balance().await,
        COIN_CAP - SESSION_COST
    );

    let evaluation = h
        .pipeline
        .submit_recording(&started.session_id, "audio/wav", vec![0u8; 1600])
        .await?;

    assert_eq!(evaluation.score, 90);
    assert_eq!(evaluation.result, GradeResult::Correct);
    assert_eq!(h.stt.call_count(), 1);

    // Session record carries the transcript and evaluation for audit
    let session = h.pipeline.session(&started.session_id).await.unwrap();
    assert_eq!(session.transcript.as_deref(), Some("sto molto bene grazie"));
    assert_eq!(session.evaluation, Some(evaluation.clone()));
    assert_eq!(session.audio_ref.as_deref(), Some(started.session_id.as_str()));

    let update = h
        .pipeline
        .complete_linked_action(&started.session_id, evaluation.result, evaluation.score)
        .await?;

    assert_eq!(update.points, 10);
    assert_eq!(update.unlocked, vec![card_linkage().entity_id()]);
    assert_eq!(h.progress.commit_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_text_session_skips_transcription() -> Result<()> {
    let h = harness()?;

    let started = h
        .pipeline
        .start_session(Some(card_linkage()), Some(target_item()))
        .await?;

    let evaluation = h
        .pipeline
        .submit_text(&started.session_id, "sto bene".to_string())
        .await?;

    assert_eq!(evaluation.result, GradeResult::Correct);

    // The typed text is used verbatim; STT is never consulted
    assert_eq!(h.stt.call_count(), 0);
    let session = h.pipeline.session(&started.session_id).await.unwrap();
    assert_eq!(session.transcript.as_deref(), Some("sto bene"));
    assert!(session.audio_ref.is_none());

    Ok(())
}

#[tokio::test]
async fn test_gate_denied_when_balance_exhausted() -> Result<()> {
    let ledger = Arc::new(CoinLedger::load(
        Box::new(MemoryStore::with_document(serde_json::json!({
            "balance": 0,
            "last_updated": chrono::Utc::now().to_rfc3339(),
        }))),
        Arc::new(StaticEntitlement::new(false)),
    ));
    let h = harness_with(ledger)?;

    let err = h
        .pipeline
        .start_session(Some(card_linkage()), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::GateDenied {
            balance: 0,
            cost: SESSION_COST
        }
    ));

    Ok(())
}

#[tokio::test]
async fn test_unconfigured_storage_fails_before_spending() -> Result<()> {
    let ledger = memory_ledger(false);
    let stt = Arc::new(StaticStt::new("x"));

    let pipeline = PracticePipeline::new(
        ledger.clone(),
        Arc::new(LocalAudioStore::new("")),
        stt,
        Arc::new(StaticGrader::scoring(90)),
        Arc::new(RecordingProgress::new()),
    );

    let err = pipeline
        .start_session(Some(card_linkage()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));

    // A configuration error never costs a coin
    assert_eq!(ledger.balance().await, COIN_CAP);

    Ok(())
}

#[tokio::test]
async fn test_upload_is_write_once() -> Result<()> {
    let uploads = TempDir::new()?;
    let store = LocalAudioStore::new(uploads.path());

    store.issue_upload_target("abc").await?;
    store.put_object("abc", "audio/wav", b"first").await?;

    let err = store.put_object("abc", "audio/wav", b"second").await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyUploaded(_)));

    // The original artifact is untouched
    assert_eq!(store.read_object("abc").await?, b"first");

    Ok(())
}

#[tokio::test]
async fn test_content_type_mismatch_is_caller_error() -> Result<()> {
    let h = harness()?;

    let started = h.pipeline.start_session(None, None).await?;

    let err = h
        .pipeline
        .submit_recording(&started.session_id, "video/mp4", vec![1, 2, 3])
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::UploadFailed(_)));

    Ok(())
}

#[tokio::test]
async fn test_transcription_failure_propagates() -> Result<()> {
    let uploads = TempDir::new()?;
    let pipeline = PracticePipeline::new(
        memory_ledger(false),
        Arc::new(LocalAudioStore::new(uploads.path())),
        Arc::new(FailingStt),
        Arc::new(StaticGrader::scoring(90)),
        Arc::new(RecordingProgress::new()),
    );

    let started = pipeline.start_session(Some(card_linkage()), None).await?;

    let err = pipeline
        .submit_recording(&started.session_id, "audio/wav", vec![0u8; 100])
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::TranscriptionFailed(_)));

    // The failure is not silently swallowed: no evaluation was recorded and
    // the learner may retry from scratch
    let session = pipeline.session(&started.session_id).await.unwrap();
    assert!(session.evaluation.is_none());

    Ok(())
}

/// STT stub that never answers in time
struct SlowStt;

#[async_trait::async_trait]
impl SpeechToText for SlowStt {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok("too late".to_string())
    }
}

#[tokio::test]
async fn test_hung_transcription_hits_the_step_timeout() -> Result<()> {
    let uploads = TempDir::new()?;
    let pipeline = PracticePipeline::new(
        memory_ledger(false),
        Arc::new(LocalAudioStore::new(uploads.path())),
        Arc::new(SlowStt),
        Arc::new(StaticGrader::scoring(90)),
        Arc::new(RecordingProgress::new()),
    )
    .with_timeouts(StepTimeouts {
        upload: std::time::Duration::from_secs(5),
        transcribe: std::time::Duration::from_millis(50),
        complete: std::time::Duration::from_secs(5),
    });

    let started = pipeline.start_session(Some(card_linkage()), None).await?;

    // A hung STT call cannot park the client: expiry maps to the same typed
    // failure as any other transcription error
    let err = pipeline
        .submit_recording(&started.session_id, "audio/wav", vec![0u8; 100])
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::TranscriptionFailed(_)));

    Ok(())
}

#[tokio::test]
async fn test_completion_failure_keeps_evaluation() -> Result<()> {
    let uploads = TempDir::new()?;
    let pipeline = PracticePipeline::new(
        memory_ledger(false),
        Arc::new(LocalAudioStore::new(uploads.path())),
        Arc::new(StaticStt::new("sto bene")),
        Arc::new(StaticGrader::scoring(90)),
        Arc::new(RecordingProgress::failing()),
    );

    let started = pipeline.start_session(Some(card_linkage()), None).await?;
    let evaluation = pipeline
        .submit_text(&started.session_id, "sto bene".to_string())
        .await?;

    let err = pipeline
        .complete_linked_action(&started.session_id, evaluation.result, evaluation.score)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::CompletionFailed(_)));

    // Best-effort: the evaluation already shown is not discarded, and the
    // commit stays independently retryable
    let session = pipeline.session(&started.session_id).await.unwrap();
    assert_eq!(session.evaluation, Some(evaluation.clone()));
    assert!(!session.completed);

    let retry = pipeline
        .complete_linked_action(&started.session_id, evaluation.result, evaluation.score)
        .await;
    assert!(retry.is_err(), "still failing backend");

    Ok(())
}

#[tokio::test]
async fn test_completion_commits_once() -> Result<()> {
    let h = harness()?;

    let started = h.pipeline.start_session(Some(card_linkage()), None).await?;
    let evaluation = h
        .pipeline
        .submit_text(&started.session_id, "sto bene".to_string())
        .await?;

    h.pipeline
        .complete_linked_action(&started.session_id, evaluation.result, evaluation.score)
        .await?;

    let err = h
        .pipeline
        .complete_linked_action(&started.session_id, evaluation.result, evaluation.score)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SessionCompleted(_)));
    assert_eq!(h.progress.commit_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_wrong_discrete_choice_downgrades_completion() -> Result<()> {
    let h = harness()?;

    let started = h.pipeline.start_session(Some(card_linkage()), None).await?;

    // Grammatically perfect sentence...
    let evaluation = h
        .pipeline
        .submit_text(&started.session_id, "sto molto bene grazie".to_string())
        .await?;
    assert_eq!(evaluation.result, GradeResult::Correct);

    // ...but the learner picked the wrong multiple-choice option
    let combined = parla_practice::combined_result(evaluation.result, Some(false));
    assert_eq!(combined, GradeResult::Incorrect);

    let update = h
        .pipeline
        .complete_linked_action(&started.session_id, combined, evaluation.score)
        .await?;

    assert_eq!(update.points, 1);
    assert!(update.unlocked.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_session_is_not_found() -> Result<()> {
    let h = harness()?;

    let err = h
        .pipeline
        .submit_text("no-such-session", "ciao".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::SessionNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_second_submission_rejected() -> Result<()> {
    let h = harness()?;

    let started = h.pipeline.start_session(None, None).await?;
    h.pipeline
        .submit_text(&started.session_id, "prima".to_string())
        .await?;

    // Session ids are never reused; a new attempt means a new session
    let err = h
        .pipeline
        .submit_text(&started.session_id, "seconda".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::SessionEvaluated(_)));

    Ok(())
}

#[tokio::test]
async fn test_sessions_are_unique_per_start() -> Result<()> {
    let h = harness()?;

    let a = h.pipeline.start_session(Some(card_linkage()), None).await?;
    let b = h.pipeline.start_session(Some(card_linkage()), None).await?;

    assert_ne!(a.session_id, b.session_id);

    Ok(())
}

#[tokio::test]
async fn test_unlimited_entitlement_bypasses_gate() -> Result<()> {
    let h = harness_with(memory_ledger(true))?;

    for _ in 0..(COIN_CAP + 10) {
        h.pipeline.start_session(None, None).await?;
    }

    // Stored balance untouched the whole time
    assert_eq!(h.pipeline.ledger().balance().await, COIN_CAP);
    assert!(matches!(
        h.pipeline.ledger().try_spend(1, "probe").await,
        SpendOutcome::Granted { balance: COIN_CAP }
    ));

    Ok(())
}
