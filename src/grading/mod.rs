//! Grading step
//!
//! Primary path: an external language-model grading service called with a
//! bounded timeout and a structured-output contract. Fallback path: a
//! deterministic offline grader. The two compose into `evaluate`, which can
//! never fail: the learner always receives some evaluation.

mod client;
mod fallback;

pub use client::{Grader, GraderOutcome, HttpGrader};
pub use fallback::fallback_evaluation;

use std::time::Duration;
use tracing::warn;

use crate::session::{Evaluation, TargetItem};

/// Fixed bound on the external grading call. On expiry the outbound call is
/// abandoned and the fallback grader answers instead.
pub const GRADING_TIMEOUT: Duration = Duration::from_secs(8);

/// Grade a transcript, falling back deterministically on any failure.
///
/// Timeout, transport error, and malformed structured output all resolve the
/// same way: through `fallback_evaluation`. This function resolves within
/// `GRADING_TIMEOUT` plus a small epsilon and never returns an error.
pub async fn evaluate(
    grader: &dyn Grader,
    transcript: &str,
    target: Option<&TargetItem>,
) -> Evaluation {
    evaluate_with_timeout(grader, transcript, target, GRADING_TIMEOUT).await
}

/// `evaluate` with an explicit bound, so tests can exercise the timeout path
/// without waiting out the production constant.
pub async fn evaluate_with_timeout(
    grader: &dyn Grader,
    transcript: &str,
    target: Option<&TargetItem>,
    timeout: Duration,
) -> Evaluation {
    match tokio::time::timeout(timeout, grader.grade(transcript, target)).await {
        Ok(Ok(outcome)) => match validate(outcome) {
            Some(evaluation) => evaluation,
            None => {
                warn!("Grading response violated the structured-output contract, falling back");
                fallback_evaluation(transcript)
            }
        },
        Ok(Err(e)) => {
            warn!("Grading call failed, falling back: {e:#}");
            fallback_evaluation(transcript)
        }
        Err(_) => {
            warn!("Grading call exceeded {timeout:?}, falling back");
            fallback_evaluation(transcript)
        }
    }
}

/// Check the structured-output contract.
///
/// An out-of-range score is treated identically to a transport failure;
/// over-long note lists merely truncate (handled by `Evaluation::new`).
fn validate(outcome: GraderOutcome) -> Option<Evaluation> {
    if !(0..=100).contains(&outcome.score) {
        return None;
    }

    Some(Evaluation::new(
        outcome.score as u8,
        outcome.errors,
        outcome.improvements,
    ))
}
