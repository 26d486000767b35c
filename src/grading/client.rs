use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::session::TargetItem;

/// Raw structured output from the grading service, before contract
/// validation. Kept separate from `Evaluation` so a malformed response can
/// be rejected as a whole instead of half-applied.
#[derive(Debug, Clone, Deserialize)]
pub struct GraderOutcome {
    /// Correctness score; the contract says 0..=100 but the wire value is
    /// checked, not trusted
    pub score: i64,

    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub improvements: Vec<String>,
}

/// Grading seam. Implementations are expected to be fallible and slow; the
/// caller owns the timeout and the fallback.
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, transcript: &str, target: Option<&TargetItem>) -> Result<GraderOutcome>;
}

#[derive(Serialize)]
struct GradeRequest<'a> {
    instruction: String,
    transcript: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a TargetItem>,
}

/// HTTP client for the language-model grading service.
pub struct HttpGrader {
    client: reqwest::Client,
    url: String,
    native_language: String,
    target_language: String,
}

impl HttpGrader {
    pub fn new(
        url: &str,
        timeout: Duration,
        native_language: &str,
        target_language: &str,
    ) -> Result<Self> {
        if url.trim().is_empty() {
            anyhow::bail!("Grading service URL not configured");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.trim().trim_end_matches('/').to_string(),
            native_language: native_language.to_string(),
            target_language: target_language.to_string(),
        })
    }

    fn instruction(&self) -> String {
        format!(
            "You are grading a language learner's answer in {target}. \
             Score how correct and natural the answer is. \
             Respond with strict JSON only, no prose: \
             {{\"score\": <integer 0-100>, \
             \"errors\": [<up to 3 short corrective notes, written in {native}>], \
             \"improvements\": [<up to 2 more natural rephrasings, written in {target}>]}}",
            target = self.target_language,
            native = self.native_language,
        )
    }
}

#[async_trait]
impl Grader for HttpGrader {
    async fn grade(&self, transcript: &str, target: Option<&TargetItem>) -> Result<GraderOutcome> {
        let request = GradeRequest {
            instruction: self.instruction(),
            transcript,
            target,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send grading request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Grading error ({status}): {error_text}");
        }

        let outcome: GraderOutcome = response
            .json()
            .await
            .context("Failed to parse grading response")?;

        info!(
            "Grading service scored transcript at {} ({} notes, {} rephrasings)",
            outcome.score,
            outcome.errors.len(),
            outcome.improvements.len()
        );

        Ok(outcome)
    }
}
