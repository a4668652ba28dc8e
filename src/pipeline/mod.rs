use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod events;
pub mod state;

pub use events::{EventKind, EventSink, LogLevel, MemorySink, RunEvent};
pub use state::{CancelFlag, RunState};

use crate::channel::ChannelResolver;
use crate::config::{Config, YoutubeConfig};
use crate::extractors::api::ApiEnumerator;
use crate::extractors::web::WebEnumerator;
use crate::extractors::youtube_api::{DataApi, HttpDataApi};
use crate::extractors::{Enumeration, VideoRecord};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::transcribe::audio::YtDlpAudioDownloader;
use crate::transcribe::aws::AwsTranscriber;
use crate::transcribe::captions::YtDlpCaptionSource;
use crate::transcribe::TranscriptResolver;
use crate::utils::Capabilities;
use crate::{ConfigError, PipelineError};

/// How videos are enumerated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Scrape public channel and watch pages
    #[default]
    Web,
    /// Page through the YouTube Data API (needs an API key)
    Api,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Web => write!(f, "web"),
            Strategy::Api => write!(f, "api"),
        }
    }
}

/// Per-run options
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub strategy: Strategy,
    pub include_transcripts: bool,
    pub api_key: Option<String>,
}

impl ScrapeOptions {
    /// Options taken from the configuration defaults
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.scrape.method,
            include_transcripts: config.scrape.include_transcripts,
            api_key: config.api_key().map(String::from),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// How a run that got as far as enumeration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Enumeration ran to its natural end
    Completed,
    /// The cancellation flag stopped enumeration
    Cancelled,
    /// A provider call failed mid-run; the records collected before it are kept
    Aborted(String),
}

/// Records produced by one run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub records: Vec<VideoRecord>,
    pub strategy: Strategy,
    pub outcome: RunOutcome,
}

impl RunResult {
    /// Whether the run stopped because the user asked it to
    pub fn cancelled(&self) -> bool {
        self.outcome == RunOutcome::Cancelled
    }

    /// One-line description of the run's end state
    pub fn summary(&self) -> String {
        let count = self.records.len();
        match &self.outcome {
            RunOutcome::Cancelled if count == 0 => {
                "Scraping stopped by user before any videos were collected".to_string()
            }
            RunOutcome::Cancelled => format!("Scraping stopped by user after {} videos", count),
            RunOutcome::Aborted(detail) => {
                format!("Run aborted after {} videos: {}", count, detail)
            }
            RunOutcome::Completed if count == 0 => "No videos were scraped".to_string(),
            RunOutcome::Completed => format!("Successfully scraped {} videos", count),
        }
    }
}

/// Run state and event sink handed down to enumerators
#[derive(Clone)]
pub struct RunContext {
    state: Arc<RunState>,
    sink: Arc<dyn EventSink>,
}

impl RunContext {
    pub fn new(state: Arc<RunState>, sink: Arc<dyn EventSink>) -> Self {
        Self { state, sink }
    }

    pub fn cancelled(&self) -> bool {
        self.state.cancelled()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.state.cancel_flag()
    }

    /// Maximum number of videos the run collects
    pub fn target(&self) -> usize {
        self.state.target()
    }

    /// Record progress and report it
    pub fn progress(&self, processed: usize, target: usize) {
        self.state.advance_to(processed);
        self.sink
            .emit(RunEvent::now(EventKind::Progress { processed, target }));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    fn log(&self, level: LogLevel, message: String) {
        // diagnostic copy, shown with --verbose
        tracing::debug!(?level, "{}", message);
        self.sink.emit(RunEvent::now(EventKind::Log { level, message }));
    }
}

/// Top-level orchestrator: picks a strategy and drives it to completion or cancellation
pub struct AcquisitionPipeline {
    youtube: YoutubeConfig,
    fetcher: Arc<dyn PageFetcher>,
    data_api: Option<Arc<dyn DataApi>>,
    transcripts: Arc<TranscriptResolver>,
}

impl AcquisitionPipeline {
    /// Build the pipeline, enabling only the transcript tiers the environment supports
    pub async fn new(config: &Config, capabilities: Capabilities) -> crate::Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.youtube)?);

        let mut transcripts =
            TranscriptResolver::new().with_temp_root(config.app.temp_dir.clone());

        if capabilities.captions() {
            let captions = YtDlpCaptionSource::new(
                config.youtube.caption_languages.clone(),
                Duration::from_secs(config.youtube.request_timeout_secs),
            )?;
            transcripts = transcripts.with_captions(Arc::new(captions));
        }

        if capabilities.audio_transcription() {
            transcripts = transcripts.with_audio(
                Arc::new(YtDlpAudioDownloader::new()),
                Arc::new(AwsTranscriber::new(config).await),
            );
        }

        Ok(Self {
            youtube: config.youtube.clone(),
            fetcher,
            data_api: None,
            transcripts: Arc::new(transcripts),
        })
    }

    /// Replace the page fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the transcript resolver
    pub fn with_transcripts(mut self, transcripts: TranscriptResolver) -> Self {
        self.transcripts = Arc::new(transcripts);
        self
    }

    /// Use this Data API client instead of building one from the run's API key
    pub fn with_data_api(mut self, api: Arc<dyn DataApi>) -> Self {
        self.data_api = Some(api);
        self
    }

    /// Run one acquisition of up to `state.target()` videos.
    ///
    /// Resolution and configuration failures end the run before enumeration starts and are the
    /// only errors returned; everything later is reported through the result's outcome.
    pub async fn run(
        &self,
        input: &str,
        options: &ScrapeOptions,
        state: Arc<RunState>,
        sink: Arc<dyn EventSink>,
    ) -> Result<RunResult, PipelineError> {
        let ctx = RunContext::new(state, sink);

        ctx.info(format!("Starting scrape of {}", input));
        ctx.info(format!(
            "Method: {}, max videos: {}, transcripts: {}",
            options.strategy,
            ctx.target(),
            if options.include_transcripts { "yes" } else { "no" }
        ));

        let enumeration = match self.enumerate(input, options, &ctx).await {
            Ok(enumeration) => enumeration,
            Err(e) => {
                ctx.error(e.to_string());
                return Err(e);
            }
        };

        let result = RunResult {
            records: enumeration.records,
            strategy: options.strategy,
            outcome: enumeration.outcome,
        };

        match &result.outcome {
            RunOutcome::Completed if !result.records.is_empty() => ctx.success(result.summary()),
            RunOutcome::Aborted(_) => ctx.error(result.summary()),
            _ => ctx.warn(result.summary()),
        }

        Ok(result)
    }

    async fn enumerate(
        &self,
        input: &str,
        options: &ScrapeOptions,
        ctx: &RunContext,
    ) -> Result<Enumeration, PipelineError> {
        let transcripts = if options.include_transcripts {
            if !self.transcripts.has_captions() && !self.transcripts.has_audio_fallback() {
                ctx.warn("No transcript sources available; transcripts will be marked unavailable");
            }
            Some(self.transcripts.clone())
        } else {
            None
        };

        match options.strategy {
            Strategy::Web => {
                let channel = ChannelResolver::new(self.fetcher.clone())
                    .resolve(input)
                    .await?;
                ctx.success(format!("Channel ID: {}", channel.id()));

                Ok(WebEnumerator::new(self.fetcher.clone(), transcripts)
                    .enumerate(&channel, ctx)
                    .await)
            }
            Strategy::Api => {
                let api_key = options.api_key().ok_or(ConfigError::MissingCredential)?;

                let api: Arc<dyn DataApi> = match &self.data_api {
                    Some(api) => api.clone(),
                    None => Arc::new(
                        HttpDataApi::new(&self.youtube, api_key)
                            .map_err(|e| PipelineError::Provider(format!("{:#}", e)))?,
                    ),
                };

                ApiEnumerator::new(api, transcripts)
                    .enumerate(input, ctx)
                    .await
            }
        }
    }
}
