//! Speech-to-text collaborator
//!
//! The pipeline treats the STT service as fallible and slow: one attempt per
//! submission, no retries, and a failure surfaces immediately as
//! `TranscriptionFailed` on the caller's side.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Transcription seam. Audio bytes in, text out.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Response shape of whisper-style transcription endpoints
#[derive(Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// HTTP client for an OpenAI-compatible transcription endpoint.
pub struct HttpSttClient {
    client: reqwest::Client,
    api_url: String,
}

impl HttpSttClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: build_api_url(server_url)?,
        })
    }
}

#[async_trait]
impl SpeechToText for HttpSttClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(audio.to_vec())
                .file_name("answer.wav")
                .mime_str(crate::storage::AUDIO_CONTENT_TYPE)?,
        );

        let response = self
            .client
            .post(&self.api_url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("STT error ({status}): {error_text}");
        }

        let resp: TranscribeResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        info!("Transcribed {} bytes of audio", audio.len());

        Ok(resp.text)
    }
}

/// Build the full API URL from the server base URL
fn build_api_url(server_url: &str) -> Result<String> {
    let trimmed = server_url.trim();
    if trimmed.is_empty() {
        anyhow::bail!("STT server URL not configured");
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        anyhow::bail!("Invalid STT URL: must start with http:// or https://, got {trimmed}");
    }

    let base = trimmed.trim_end_matches('/');
    Ok(format!("{base}/v1/audio/transcriptions"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_api_url() {
        assert_eq!(
            build_api_url("http://localhost:8765/").unwrap(),
            "http://localhost:8765/v1/audio/transcriptions"
        );
        assert!(build_api_url("").is_err());
        assert!(build_api_url("localhost:8765").is_err());
    }
}
