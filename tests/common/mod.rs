// Shared mock collaborators for the pipeline and flow tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parla_practice::{
    CoinLedger, GradeResult, Grader, GraderOutcome, Linkage, MemoryStore, ProgressTracker,
    ProgressUpdate, SpeechToText, StaticEntitlement, TargetItem,
};

/// STT stub returning a fixed transcript, counting how often it is called
pub struct StaticStt {
    pub text: String,
    pub calls: AtomicUsize,
}

impl StaticStt {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechToText for StaticStt {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// STT stub that always fails, like a dead external service
pub struct FailingStt;

#[async_trait]
impl SpeechToText for FailingStt {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        anyhow::bail!("STT error (503): service unavailable")
    }
}

/// Grader stub returning a fixed well-formed outcome
pub struct StaticGrader {
    pub score: i64,
    pub errors: Vec<String>,
    pub improvements: Vec<String>,
}

impl StaticGrader {
    pub fn scoring(score: i64) -> Self {
        Self {
            score,
            errors: vec!["minor word-order issue".to_string()],
            improvements: vec!["Una versione più naturale.".to_string()],
        }
    }
}

#[async_trait]
impl Grader for StaticGrader {
    async fn grade(&self, _transcript: &str, _target: Option<&TargetItem>) -> Result<GraderOutcome> {
        Ok(GraderOutcome {
            score: self.score,
            errors: self.errors.clone(),
            improvements: self.improvements.clone(),
        })
    }
}

/// Grader stub that always fails, forcing the fallback path
pub struct FailingGrader;

#[async_trait]
impl Grader for FailingGrader {
    async fn grade(&self, _transcript: &str, _target: Option<&TargetItem>) -> Result<GraderOutcome> {
        anyhow::bail!("Grading error (500): model overloaded")
    }
}

/// Progress stub recording commits
pub struct RecordingProgress {
    pub commits: AtomicUsize,
    pub fail: bool,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self {
            commits: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            commits: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressTracker for RecordingProgress {
    async fn commit(
        &self,
        linkage: Option<&Linkage>,
        combined: GradeResult,
        _score: u8,
    ) -> Result<ProgressUpdate> {
        if self.fail {
            anyhow::bail!("progress backend unreachable");
        }

        self.commits.fetch_add(1, Ordering::SeqCst);

        let unlocked = match (linkage, combined) {
            (Some(linkage), GradeResult::Correct) => vec![linkage.entity_id()],
            _ => Vec::new(),
        };

        Ok(ProgressUpdate {
            points: match combined {
                GradeResult::Correct => 10,
                GradeResult::Partial => 4,
                GradeResult::Incorrect => 1,
            },
            unlocked,
        })
    }
}

/// A coin ledger over an in-memory store, optionally unlimited
pub fn memory_ledger(unlimited: bool) -> Arc<CoinLedger> {
    Arc::new(CoinLedger::load(
        Box::new(MemoryStore::new()),
        Arc::new(StaticEntitlement::new(unlimited)),
    ))
}

/// A card linkage used across tests
pub fn card_linkage() -> Linkage {
    Linkage::Card {
        card_id: "greetings-01".to_string(),
    }
}

pub fn target_item() -> TargetItem {
    TargetItem {
        label: "How are you?".to_string(),
        example: "Come stai?".to_string(),
    }
}
