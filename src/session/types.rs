use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score at or above which an answer counts as correct
pub const CORRECT_THRESHOLD: u8 = 85;

/// Score at or above which an answer counts as partially correct
pub const PARTIAL_THRESHOLD: u8 = 60;

/// Maximum corrective notes kept on an evaluation
pub const MAX_ERRORS: usize = 3;

/// Maximum rephrasings kept on an evaluation
pub const MAX_IMPROVEMENTS: usize = 2;

/// The content a practice session's result applies to: either a discrete
/// vocabulary/structure card or a story mission checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Linkage {
    Card {
        card_id: String,
    },
    StoryMission {
        story_id: String,
        mission_id: String,
    },
}

impl Linkage {
    /// Identifier used as the progress-map key for this linkage
    pub fn entity_id(&self) -> String {
        match self {
            Linkage::Card { card_id } => format!("card:{card_id}"),
            Linkage::StoryMission {
                story_id,
                mission_id,
            } => format!("story:{story_id}:{mission_id}"),
        }
    }
}

/// Ground-truth context handed to the grader: the prompted label and an
/// example of a natural answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetItem {
    pub label: String,
    pub example: String,
}

/// Bucketed grading outcome, always derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeResult {
    Correct,
    Partial,
    Incorrect,
}

impl GradeResult {
    /// Fixed thresholds: ≥85 correct, ≥60 partial, else incorrect
    pub fn from_score(score: u8) -> Self {
        if score >= CORRECT_THRESHOLD {
            GradeResult::Correct
        } else if score >= PARTIAL_THRESHOLD {
            GradeResult::Partial
        } else {
            GradeResult::Incorrect
        }
    }
}

/// A graded answer.
///
/// `result` is a pure function of `score`; construct through
/// `Evaluation::new` so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Correctness score, 0..=100
    pub score: u8,

    /// Bucketed outcome derived from `score`
    pub result: GradeResult,

    /// Short corrective notes in the learner's native language, most
    /// important first
    pub errors: Vec<String>,

    /// More natural rephrasings in the target language
    pub improvements: Vec<String>,
}

impl Evaluation {
    pub fn new(score: u8, mut errors: Vec<String>, mut improvements: Vec<String>) -> Self {
        let score = score.min(100);
        errors.truncate(MAX_ERRORS);
        improvements.truncate(MAX_IMPROVEMENTS);

        Self {
            score,
            result: GradeResult::from_score(score),
            errors,
            improvements,
        }
    }
}

/// Combine the grader's verdict with a discrete multiple-choice component.
///
/// A wrong discrete selection downgrades the whole attempt to incorrect no
/// matter how well the spoken/typed answer scored.
pub fn combined_result(grade: GradeResult, discrete_ok: Option<bool>) -> GradeResult {
    match discrete_ok {
        Some(false) => GradeResult::Incorrect,
        _ => grade,
    }
}

/// One attempt at producing a gradable answer for a specific prompt.
///
/// Created when the upload target is issued; the transcription step sets
/// `transcript`, the grading step sets `evaluation`, and the session is
/// terminal once completed or abandoned. Sessions are fire-and-forget:
/// retained for audit, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique identifier, never reused
    pub session_id: Uuid,

    /// Write-once reference to the uploaded audio; empty for typed answers
    pub audio_ref: Option<String>,

    /// Text derived from audio, or supplied directly by the learner
    pub transcript: Option<String>,

    /// Grader ground-truth context, when the prompt has one
    pub target_item: Option<TargetItem>,

    /// The card or story mission this attempt applies to
    pub linkage: Option<Linkage>,

    /// Set by the grading step
    pub evaluation: Option<Evaluation>,

    pub created_at: DateTime<Utc>,

    /// Whether the completion step has committed this session's result
    pub completed: bool,
}

impl Session {
    pub fn new(linkage: Option<Linkage>, target_item: Option<TargetItem>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            audio_ref: None,
            transcript: None,
            target_item,
            linkage,
            evaluation: None,
            created_at: Utc::now(),
            completed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_thresholds() {
        for score in 0..=100u8 {
            let expected = if score >= 85 {
                GradeResult::Correct
            } else if score >= 60 {
                GradeResult::Partial
            } else {
                GradeResult::Incorrect
            };
            assert_eq!(GradeResult::from_score(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_evaluation_derives_result_and_truncates() {
        let eval = Evaluation::new(
            90,
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec!["x".into(), "y".into(), "z".into()],
        );

        assert_eq!(eval.result, GradeResult::Correct);
        assert_eq!(eval.errors.len(), 3);
        assert_eq!(eval.improvements.len(), 2);
    }

    #[test]
    fn test_combined_result_downgrade() {
        // Perfect spoken answer, wrong multiple-choice pick
        assert_eq!(
            combined_result(GradeResult::Correct, Some(false)),
            GradeResult::Incorrect
        );
        assert_eq!(
            combined_result(GradeResult::Correct, Some(true)),
            GradeResult::Correct
        );
        assert_eq!(
            combined_result(GradeResult::Partial, None),
            GradeResult::Partial
        );
    }
}
