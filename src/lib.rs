//! Channel Scraper - A Rust CLI tool for exporting a YouTube channel's uploads
//!
//! This library resolves a channel from an arbitrary channel URL, enumerates its videos either
//! by scraping public pages or through the YouTube Data API, and attaches a transcript to every
//! record using captions first and audio transcription (AWS Transcribe) as a last resort.

pub mod channel;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod fetch;
pub mod locator;
pub mod output;
pub mod pipeline;
pub mod transcribe;
pub mod utils;

pub use channel::{ChannelReference, ChannelResolver};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{Count, VideoRecord};
pub use pipeline::{AcquisitionPipeline, RunOutcome, RunResult, RunState, ScrapeOptions, Strategy};
pub use transcribe::{TranscriptOutcome, TranscriptResolver};
pub use utils::Capabilities;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Failure to turn a user-supplied URL into a channel identifier
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unsupported channel URL format: {0}")]
    UnsupportedFormat(String),

    #[error("No channel identifier found on page: {0}")]
    NotFound(String),

    #[error("Failed to fetch channel page: {0}")]
    FetchFailed(String),
}

/// Run configuration problems detected before enumeration starts
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Invalid channel URL format: {0}")]
    UnsupportedFormat(String),

    #[error("The API method requires a YouTube Data API key")]
    MissingCredential,
}

/// Credential problems reported by the YouTube Data API
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("API key is not valid")]
    InvalidKey,

    #[error("API quota exceeded")]
    QuotaExceeded,
}

/// A single failed YouTube Data API call
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Terminal failure of a run that never started enumerating
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("YouTube API error: {0}")]
    Provider(String),
}

impl From<ApiError> for PipelineError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth(auth) => PipelineError::Auth(auth),
            other => PipelineError::Provider(other.to_string()),
        }
    }
}
