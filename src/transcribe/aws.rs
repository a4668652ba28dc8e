use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::types::{LanguageCode, Media, MediaFormat};
use aws_sdk_transcribe::Client as TranscribeClient;
use std::path::Path;
use uuid::Uuid;

use super::audio::AudioFormat;
use super::processor::TranscriptionProcessor;
use super::SpeechToText;
use crate::config::Config;
use crate::pipeline::CancelFlag;

/// Speech-to-text through AWS Transcribe, staging audio in S3
pub struct AwsTranscriber {
    bucket: String,
    key_prefix: String,
    language: Option<String>,
    s3_client: S3Client,
    transcribe_client: TranscribeClient,
}

impl AwsTranscriber {
    pub async fn new(config: &Config) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(config.aws_region())
            .load()
            .await;

        Self {
            bucket: config.aws.s3_bucket.clone(),
            key_prefix: config.aws.s3_key_prefix.clone().unwrap_or_default(),
            language: config.aws.transcription.default_language.clone(),
            s3_client: S3Client::new(&aws_config),
            transcribe_client: TranscribeClient::new(&aws_config),
        }
    }

    /// Upload audio file to S3
    async fn upload_to_s3(&self, audio_path: &Path, format: AudioFormat) -> Result<String> {
        let key = format!(
            "{}audio_{}_{}.{}",
            self.key_prefix,
            Uuid::new_v4(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            format.as_str()
        );

        tracing::debug!("Uploading audio to S3: s3://{}/{}", self.bucket, key);

        let content = fs_err::read(audio_path)?;

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(content.into())
            .content_type(format.mime_type())
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(key)
    }

    /// Start an AWS Transcribe job, with automatic language identification unless configured
    async fn start_transcription_job(&self, s3_key: &str, format: AudioFormat) -> Result<String> {
        let job_name = format!("channel-scraper_{}", Uuid::new_v4());
        let media_uri = format!("s3://{}/{}", self.bucket, s3_key);

        tracing::debug!("Starting transcription job: {}", job_name);

        let media_format = match format {
            AudioFormat::Mp3 => MediaFormat::Mp3,
            AudioFormat::M4a => MediaFormat::Mp4,
            AudioFormat::Wav => MediaFormat::Wav,
            AudioFormat::Flac => MediaFormat::Flac,
            AudioFormat::Ogg => MediaFormat::Ogg,
            AudioFormat::Webm => MediaFormat::Webm,
        };

        let media = Media::builder().media_file_uri(media_uri).build();

        let mut job_builder = self
            .transcribe_client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media_format(media_format)
            .media(media);

        job_builder = match self.language.as_deref() {
            Some(lang) => job_builder.language_code(LanguageCode::from(lang)),
            None => job_builder.identify_language(true),
        };

        job_builder
            .send()
            .await
            .context("Failed to start transcription job")?;

        Ok(job_name)
    }

    /// Clean up S3 object
    async fn cleanup_s3(&self, s3_key: &str) {
        tracing::debug!("Cleaning up S3 object: {}", s3_key);

        if let Err(e) = self
            .s3_client
            .delete_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .send()
            .await
        {
            tracing::warn!("Failed to clean up S3 object {}: {}", s3_key, e);
        }
    }
}

#[async_trait]
impl SpeechToText for AwsTranscriber {
    async fn transcribe_file(&self, path: &Path, cancel: &CancelFlag) -> Result<String> {
        let format = AudioFormat::from_path(path)
            .with_context(|| format!("Unsupported audio file: {}", path.display()))?;

        let s3_key = self.upload_to_s3(path, format).await?;

        let result = async {
            let job_name = self.start_transcription_job(&s3_key, format).await?;
            TranscriptionProcessor::new(self.transcribe_client.clone(), job_name)
                .wait_for_completion(cancel)
                .await
        }
        .await;

        // the staged audio goes away whether or not the job succeeded
        self.cleanup_s3(&s3_key).await;

        result
    }
}
