use crate::session::Evaluation;

/// Generic corrective note used when the grading service cannot answer
const FALLBACK_NOTE: &str =
    "Detailed corrections are unavailable for this attempt. Review the example answer and try again.";

/// Deterministic offline grader.
///
/// A pure function of the transcript: `50 + (len mod 50)`, clamped to the
/// valid score range, with fixed generic feedback. Guarantees the pipeline
/// always completes with some evaluation when the external service times
/// out, errors, or returns garbage.
pub fn fallback_evaluation(transcript: &str) -> Evaluation {
    let score = (50 + (transcript.chars().count() % 50) as u8).min(100);

    Evaluation::new(score, vec![FALLBACK_NOTE.to_string()], Vec::new())
}
