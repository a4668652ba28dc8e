use anyhow::{Context, Result};
use aws_sdk_transcribe::types::{TranscriptionJob, TranscriptionJobStatus};
use aws_sdk_transcribe::Client as TranscribeClient;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

use crate::pipeline::CancelFlag;

/// AWS Transcribe transcript format
#[derive(Debug, Deserialize)]
struct AwsTranscript {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptText>,
}

#[derive(Debug, Deserialize)]
struct TranscriptText {
    transcript: String,
}

/// Seconds to wait before status check number `check` (1-based)
fn poll_delay(check: u64) -> Duration {
    Duration::from_secs(std::cmp::min(5 + (check - 1) * 2, 30))
}

/// Transcription job processor
pub struct TranscriptionProcessor {
    client: TranscribeClient,
    job_name: String,
}

impl TranscriptionProcessor {
    pub fn new(client: TranscribeClient, job_name: String) -> Self {
        Self { client, job_name }
    }

    /// Poll the job until it finishes and return the transcript text.
    ///
    /// Cancellation is checked between polls; the job itself is left to AWS.
    pub async fn wait_for_completion(&self, cancel: &CancelFlag) -> Result<String> {
        let start_time = std::time::Instant::now();
        let mut check_count = 0;

        let job = loop {
            check_count += 1;

            let job = self.get_transcription_job().await?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::Queued) | Some(TranscriptionJobStatus::InProgress) => {
                    tracing::debug!(
                        "Transcribing {}... ({}s elapsed, check #{})",
                        self.job_name,
                        start_time.elapsed().as_secs(),
                        check_count
                    );
                    sleep(poll_delay(check_count)).await;
                    if cancel.is_cancelled() {
                        anyhow::bail!("cancelled while waiting for transcription job");
                    }
                }
                Some(TranscriptionJobStatus::Completed) => break job,
                Some(TranscriptionJobStatus::Failed) => {
                    let failure_reason = job.failure_reason().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", failure_reason);
                }
                _ => anyhow::bail!("Unexpected transcription job status"),
            }
        };

        tracing::debug!(
            "Transcription job {} completed in {}s",
            self.job_name,
            start_time.elapsed().as_secs()
        );

        let transcript_uri = job
            .transcript()
            .and_then(|t| t.transcript_file_uri())
            .ok_or_else(|| anyhow::anyhow!("No transcript URI found"))?;

        let transcript_json = self.download_transcript(transcript_uri).await?;
        transcript_text(&transcript_json)
    }

    /// Get transcription job details
    async fn get_transcription_job(&self) -> Result<TranscriptionJob> {
        let response = self
            .client
            .get_transcription_job()
            .transcription_job_name(&self.job_name)
            .send()
            .await
            .context("Failed to get transcription job status")?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transcription job not found"))
    }

    /// Download transcript JSON from the pre-signed result URI
    async fn download_transcript(&self, uri: &str) -> Result<String> {
        let response = reqwest::get(uri)
            .await
            .context("Failed to download transcript")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download transcript: HTTP {}", response.status());
        }

        let content = response
            .text()
            .await
            .context("Failed to read transcript content")?;

        Ok(content)
    }
}

/// Extract the full transcript text from an AWS Transcribe result document
fn transcript_text(json: &str) -> Result<String> {
    let transcript: AwsTranscript = serde_json::from_str(json)
        .context("Failed to parse transcript JSON")?;

    Ok(transcript
        .results
        .transcripts
        .into_iter()
        .map(|t| t.transcript)
        .collect::<Vec<_>>()
        .join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_text() {
        let json = r#"{
            "jobName": "channel-scraper_1",
            "accountId": "123",
            "status": "COMPLETED",
            "results": {
                "transcripts": [{"transcript": "Hello from the audio."}],
                "items": []
            }
        }"#;
        assert_eq!(transcript_text(json).unwrap(), "Hello from the audio.");
        assert!(transcript_text("{}").is_err());
    }

    #[test]
    fn test_poll_delay_is_capped() {
        assert_eq!(poll_delay(1), Duration::from_secs(5));
        assert_eq!(poll_delay(3), Duration::from_secs(9));
        assert_eq!(poll_delay(50), Duration::from_secs(30));
    }
}
