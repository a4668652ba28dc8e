use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pipeline::CancelFlag;
use crate::utils::truncate_chars;
use crate::Result;

pub mod audio;
pub mod aws;
pub mod captions;
pub mod processor;

/// Maximum transcript length stored on a record, in characters
pub const MAX_TRANSCRIPT_CHARS: usize = 5000;

/// Result of resolving one video's transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Human-authored captions
    Manual(String),
    /// Auto-generated captions
    AutoGenerated(String),
    /// Speech-to-text over the downloaded audio
    Transcribed(String),
    /// No tier produced text
    Unavailable(String),
}

impl TranscriptOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Manual(text) | Self::AutoGenerated(text) | Self::Transcribed(text) => Some(text),
            Self::Unavailable(_) => None,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Manual(_) => "manual captions",
            Self::AutoGenerated(_) => "auto-generated captions",
            Self::Transcribed(_) => "audio transcription",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// Text stored in the record's transcript column, truncated to `max_chars`
    pub fn into_record_text(self, max_chars: usize) -> String {
        match self {
            Self::Manual(text) | Self::AutoGenerated(text) | Self::Transcribed(text) => {
                truncate_chars(&text, max_chars)
            }
            Self::Unavailable(reason) => {
                truncate_chars(&format!("Transcript unavailable: {}", reason), max_chars)
            }
        }
    }
}

/// Caption container format offered by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptionFormat {
    Json3,
    Vtt,
}

/// A caption track listed for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub language: String,
    pub name: Option<String>,
    pub is_generated: bool,
    pub url: String,
    pub format: CaptionFormat,
}

/// One timed caption cue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionSegment {
    pub text: String,
    /// Start offset in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

/// Lists and downloads caption tracks
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Tracks available for the video, most preferred first within each kind
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>>;

    /// The timed text of one track
    async fn fetch_segments(&self, track: &CaptionTrack) -> Result<Vec<CaptionSegment>>;
}

/// Downloads a video's audio track
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Download the best available audio into `dir`. `None` when no file was produced.
    async fn download_best_audio(&self, video_id: &str, dir: &Path) -> Result<Option<PathBuf>>;
}

/// Turns an audio file into text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe_file(&self, path: &Path, cancel: &CancelFlag) -> Result<String>;
}

struct AudioTier {
    downloader: Arc<dyn AudioDownloader>,
    speech: Arc<dyn SpeechToText>,
}

/// Tiered transcript lookup: manual captions, then auto-generated captions, then transcription
/// of the downloaded audio. Tiers that are not configured are skipped.
#[derive(Default)]
pub struct TranscriptResolver {
    captions: Option<Arc<dyn CaptionSource>>,
    audio: Option<AudioTier>,
    temp_root: Option<PathBuf>,
}

impl TranscriptResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_captions(mut self, source: Arc<dyn CaptionSource>) -> Self {
        self.captions = Some(source);
        self
    }

    pub fn with_audio(
        mut self,
        downloader: Arc<dyn AudioDownloader>,
        speech: Arc<dyn SpeechToText>,
    ) -> Self {
        self.audio = Some(AudioTier { downloader, speech });
        self
    }

    /// Directory under which per-attempt audio directories are created
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn has_captions(&self) -> bool {
        self.captions.is_some()
    }

    pub fn has_audio_fallback(&self) -> bool {
        self.audio.is_some()
    }

    /// Resolve a transcript. Never fails; every failure ends up in `Unavailable`.
    pub async fn resolve(&self, video_id: &str, cancel: &CancelFlag) -> TranscriptOutcome {
        if let Some(captions) = &self.captions {
            if cancel.is_cancelled() {
                return TranscriptOutcome::Unavailable("cancelled".to_string());
            }

            match self.from_captions(captions.as_ref(), video_id, cancel).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => tracing::debug!("No captions for {}", video_id),
                Err(e) => tracing::debug!("Caption lookup failed for {}: {:#}", video_id, e),
            }
        }

        let Some(audio) = &self.audio else {
            let reason = if self.captions.is_some() {
                "no captions available"
            } else {
                "no transcript sources available"
            };
            return TranscriptOutcome::Unavailable(reason.to_string());
        };

        if cancel.is_cancelled() {
            return TranscriptOutcome::Unavailable("cancelled".to_string());
        }

        tracing::info!("Transcribing audio for {}", video_id);
        match self.from_audio(audio, video_id, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => TranscriptOutcome::Unavailable(format!("{:#}", e)),
        }
    }

    async fn from_captions(
        &self,
        source: &dyn CaptionSource,
        video_id: &str,
        cancel: &CancelFlag,
    ) -> Result<Option<TranscriptOutcome>> {
        let tracks = source.list_tracks(video_id).await?;

        if let Some(track) = tracks.iter().find(|t| !t.is_generated) {
            let segments = source.fetch_segments(track).await?;
            return Ok(Some(TranscriptOutcome::Manual(join_segments(segments))));
        }

        if cancel.is_cancelled() {
            return Ok(Some(TranscriptOutcome::Unavailable("cancelled".to_string())));
        }

        if let Some(track) = tracks.iter().find(|t| t.is_generated) {
            let segments = source.fetch_segments(track).await?;
            return Ok(Some(TranscriptOutcome::AutoGenerated(join_segments(segments))));
        }

        Ok(None)
    }

    async fn from_audio(
        &self,
        audio: &AudioTier,
        video_id: &str,
        cancel: &CancelFlag,
    ) -> Result<TranscriptOutcome> {
        // removed when dropped, on every path out of this function
        let workdir = match &self.temp_root {
            Some(root) => {
                fs_err::create_dir_all(root)?;
                tempfile::Builder::new().prefix("channel-scraper-").tempdir_in(root)?
            }
            None => tempfile::Builder::new().prefix("channel-scraper-").tempdir()?,
        };

        let Some(audio_path) = audio
            .downloader
            .download_best_audio(video_id, workdir.path())
            .await?
        else {
            return Ok(TranscriptOutcome::Unavailable("audio download failed".to_string()));
        };

        if cancel.is_cancelled() {
            return Ok(TranscriptOutcome::Unavailable("cancelled".to_string()));
        }

        let text = audio.speech.transcribe_file(&audio_path, cancel).await?;
        Ok(TranscriptOutcome::Transcribed(text.trim().to_string()))
    }
}

/// Concatenate caption text in timeline order with single spaces
pub fn join_segments(mut segments: Vec<CaptionSegment>) -> String {
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn track(language: &str, is_generated: bool) -> CaptionTrack {
        CaptionTrack {
            language: language.to_string(),
            name: None,
            is_generated,
            url: format!("https://captions.test/{}/{}", language, is_generated),
            format: CaptionFormat::Json3,
        }
    }

    fn segment(text: &str, start: f64) -> CaptionSegment {
        CaptionSegment { text: text.to_string(), start, duration: 1.0 }
    }

    fn unused_audio() -> (Arc<MockAudioDownloader>, Arc<MockSpeechToText>) {
        let mut downloader = MockAudioDownloader::new();
        downloader.expect_download_best_audio().never();
        let mut speech = MockSpeechToText::new();
        speech.expect_transcribe_file().never();
        (Arc::new(downloader), Arc::new(speech))
    }

    #[tokio::test]
    async fn test_manual_wins_over_generated() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_list_tracks()
            .returning(|_| Ok(vec![track("en", true), track("en", false)]));
        captions
            .expect_fetch_segments()
            .withf(|t: &CaptionTrack| !t.is_generated)
            .times(1)
            .returning(|_| Ok(vec![segment("world", 2.0), segment("hello", 1.0)]));

        let (downloader, speech) = unused_audio();
        let resolver = TranscriptResolver::new()
            .with_captions(Arc::new(captions))
            .with_audio(downloader, speech);

        let outcome = resolver.resolve("vid", &CancelFlag::new()).await;
        assert_eq!(outcome, TranscriptOutcome::Manual("hello world".to_string()));
    }

    #[tokio::test]
    async fn test_generated_used_without_manual() {
        let mut captions = MockCaptionSource::new();
        captions.expect_list_tracks().returning(|_| Ok(vec![track("en", true)]));
        captions
            .expect_fetch_segments()
            .returning(|_| Ok(vec![segment(" auto ", 0.0), segment("", 1.0), segment("text", 2.0)]));

        let resolver = TranscriptResolver::new().with_captions(Arc::new(captions));
        let outcome = resolver.resolve("vid", &CancelFlag::new()).await;
        assert_eq!(outcome, TranscriptOutcome::AutoGenerated("auto text".to_string()));
    }

    #[tokio::test]
    async fn test_caption_errors_fall_through_to_audio() {
        let mut captions = MockCaptionSource::new();
        captions
            .expect_list_tracks()
            .returning(|_| Err(anyhow::anyhow!("captions disabled")));

        let seen_dir = Arc::new(Mutex::new(None::<PathBuf>));
        let seen = seen_dir.clone();
        let mut downloader = MockAudioDownloader::new();
        downloader
            .expect_download_best_audio()
            .times(1)
            .returning(move |_, dir: &Path| {
                *seen.lock().unwrap() = Some(dir.to_path_buf());
                let path = dir.join("audio.mp3");
                std::fs::write(&path, b"fake audio").unwrap();
                Ok(Some(path))
            });

        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe_file()
            .times(1)
            .returning(|path: &Path, _| {
                assert!(path.exists());
                Ok("  spoken words ".to_string())
            });

        let resolver = TranscriptResolver::new()
            .with_captions(Arc::new(captions))
            .with_audio(Arc::new(downloader), Arc::new(speech));

        let outcome = resolver.resolve("vid", &CancelFlag::new()).await;
        assert_eq!(outcome, TranscriptOutcome::Transcribed("spoken words".to_string()));

        let dir = seen_dir.lock().unwrap().clone().unwrap();
        assert!(!dir.exists(), "temporary audio directory should be removed");
    }

    #[tokio::test]
    async fn test_missing_audio_file_is_unavailable() {
        let mut downloader = MockAudioDownloader::new();
        downloader.expect_download_best_audio().returning(|_, _| Ok(None));
        let mut speech = MockSpeechToText::new();
        speech.expect_transcribe_file().never();

        let resolver = TranscriptResolver::new().with_audio(Arc::new(downloader), Arc::new(speech));
        let outcome = resolver.resolve("vid", &CancelFlag::new()).await;
        assert_eq!(
            outcome,
            TranscriptOutcome::Unavailable("audio download failed".to_string())
        );
    }

    #[tokio::test]
    async fn test_transcription_error_is_unavailable_and_cleans_up() {
        let seen_dir = Arc::new(Mutex::new(None::<PathBuf>));
        let seen = seen_dir.clone();
        let mut downloader = MockAudioDownloader::new();
        downloader.expect_download_best_audio().returning(move |_, dir: &Path| {
            *seen.lock().unwrap() = Some(dir.to_path_buf());
            let path = dir.join("audio.mp3");
            std::fs::write(&path, b"fake audio").unwrap();
            Ok(Some(path))
        });
        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe_file()
            .returning(|_, _| Err(anyhow::anyhow!("job failed")));

        let resolver = TranscriptResolver::new().with_audio(Arc::new(downloader), Arc::new(speech));
        let outcome = resolver.resolve("vid", &CancelFlag::new()).await;

        assert_eq!(outcome, TranscriptOutcome::Unavailable("job failed".to_string()));
        assert!(!seen_dir.lock().unwrap().clone().unwrap().exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_any_tier() {
        let mut captions = MockCaptionSource::new();
        captions.expect_list_tracks().never();
        let (downloader, speech) = unused_audio();
        let resolver = TranscriptResolver::new()
            .with_captions(Arc::new(captions))
            .with_audio(downloader, speech);

        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(
            resolver.resolve("vid", &cancel).await,
            TranscriptOutcome::Unavailable("cancelled".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_sources_configured() {
        let resolver = TranscriptResolver::new();
        assert!(!resolver.has_captions());
        assert!(!resolver.has_audio_fallback());
        assert_eq!(
            resolver.resolve("vid", &CancelFlag::new()).await,
            TranscriptOutcome::Unavailable("no transcript sources available".to_string())
        );
    }

    #[test]
    fn test_record_text_is_truncated() {
        let long = "x".repeat(6000);
        let text = TranscriptOutcome::Manual(long).into_record_text(MAX_TRANSCRIPT_CHARS);
        assert_eq!(text.chars().count(), 5000);

        let text = TranscriptOutcome::Unavailable("audio download failed".to_string())
            .into_record_text(MAX_TRANSCRIPT_CHARS);
        assert_eq!(text, "Transcript unavailable: audio download failed");
    }
}
