//! Progress tracking collaborator
//!
//! The completion step forwards a session's combined result here. The
//! reference implementation persists a flat `{entity_id → status}` document
//! and reports points plus any newly unlocked entities; richer progress
//! systems plug in behind the same trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::session::{GradeResult, Linkage};

/// Points awarded per combined result
const POINTS_CORRECT: u32 = 10;
const POINTS_PARTIAL: u32 = 4;
const POINTS_INCORRECT: u32 = 1;

/// Result of committing a session outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Points awarded for this commit
    pub points: u32,

    /// Entity ids that newly reached the passed state
    pub unlocked: Vec<String>,
}

/// Completion-step seam.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    async fn commit(
        &self,
        linkage: Option<&Linkage>,
        combined: GradeResult,
        score: u8,
    ) -> Result<ProgressUpdate>;
}

fn status_label(result: GradeResult) -> &'static str {
    match result {
        GradeResult::Correct => "correct",
        GradeResult::Partial => "partial",
        GradeResult::Incorrect => "incorrect",
    }
}

fn points_for(result: GradeResult) -> u32 {
    match result {
        GradeResult::Correct => POINTS_CORRECT,
        GradeResult::Partial => POINTS_PARTIAL,
        GradeResult::Incorrect => POINTS_INCORRECT,
    }
}

/// File-backed progress map, one flat JSON document.
pub struct FileProgressTracker {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileProgressTracker {
    /// Load the progress map, sanitizing a corrupt document to empty rather
    /// than failing.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Malformed progress document, starting empty: {e}");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        info!(
            "Progress map loaded: {} entries ({})",
            entries.len(),
            path.display()
        );

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create progress directory {}", parent.display())
            })?;
        }

        fs::write(&self.path, serde_json::to_vec(entries)?)
            .with_context(|| format!("Failed to write progress file {}", self.path.display()))
    }
}

#[async_trait]
impl ProgressTracker for FileProgressTracker {
    async fn commit(
        &self,
        linkage: Option<&Linkage>,
        combined: GradeResult,
        score: u8,
    ) -> Result<ProgressUpdate> {
        let points = points_for(combined);
        let mut unlocked = Vec::new();

        if let Some(linkage) = linkage {
            let entity_id = linkage.entity_id();
            let mut entries = self.entries.lock().await;

            let was_correct = entries.get(&entity_id).map(String::as_str) == Some("correct");
            entries.insert(entity_id.clone(), status_label(combined).to_string());

            if combined == GradeResult::Correct && !was_correct {
                unlocked.push(entity_id.clone());
            }

            self.persist(&entries)?;

            info!(
                "Progress committed: {entity_id} -> {} (score {score})",
                status_label(combined)
            );
        } else {
            info!(
                "Progress committed without linkage: {} (score {score})",
                status_label(combined)
            );
        }

        Ok(ProgressUpdate { points, unlocked })
    }
}
