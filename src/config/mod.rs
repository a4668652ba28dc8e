use anyhow::{Context, Result};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pipeline::Strategy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// YouTube access settings
    pub youtube: YoutubeConfig,

    /// Scrape defaults
    pub scrape: ScrapeConfig,

    /// AWS configuration for the audio transcription fallback
    pub aws: AwsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// YouTube Data API key (only needed for the api method)
    pub api_key: Option<String>,

    /// Base URL of the YouTube Data API
    pub api_base_url: String,

    /// User agent sent when scraping pages
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Preferred caption languages, most preferred first
    pub caption_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Default number of videos per run
    pub max_videos: usize,

    /// Attach transcripts to records
    pub include_transcripts: bool,

    /// Default acquisition method
    pub method: Strategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,

    /// S3 bucket for temporary audio storage; empty disables audio transcription
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Transcription job settings
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Language code for transcription jobs (auto-detect if not specified)
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Temporary directory for audio downloads
    pub temp_dir: Option<PathBuf>,

    /// Default output format
    pub default_output_format: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            request_timeout_secs: 30,
            caption_languages: vec!["en".to_string()],
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_videos: 25,
            include_transcripts: true,
            method: Strategy::Web,
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            s3_bucket: "".to_string(),
            s3_key_prefix: Some("channel-scraper/".to_string()),
            transcription: TranscriptionConfig::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            default_output_format: "csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("channel-scraper").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.scrape.max_videos == 0 {
            anyhow::bail!("scrape.max_videos must be at least 1");
        }

        if self.youtube.request_timeout_secs == 0 {
            anyhow::bail!("youtube.request_timeout_secs must be positive");
        }

        if self.aws.region.trim().is_empty() {
            anyhow::bail!("AWS region must be configured");
        }

        Ok(())
    }

    /// Whether the audio transcription fallback has somewhere to stage audio
    pub fn speech_to_text_configured(&self) -> bool {
        !self.aws.s3_bucket.trim().is_empty()
    }

    /// API key from the config file, ignoring blanks
    pub fn api_key(&self) -> Option<&str> {
        self.youtube
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Config File: {}", Self::config_path().map(|p| p.display().to_string()).unwrap_or_default());
        println!("  Method: {}", self.scrape.method);
        println!("  Max Videos: {}", self.scrape.max_videos);
        println!("  Include Transcripts: {}", self.scrape.include_transcripts);
        println!("  API Key: {}", if self.api_key().is_some() { "configured" } else { "not set" });
        println!("  Caption Languages: {}", self.youtube.caption_languages.join(", "));
        println!("  AWS Region: {}", self.aws.region);
        if self.speech_to_text_configured() {
            println!("  S3 Bucket: {}", self.aws.s3_bucket);
        } else {
            println!("  S3 Bucket: not set (audio transcription disabled)");
        }
        println!("  Default Format: {}", self.app.default_output_format);
    }

    /// Get AWS region
    pub fn aws_region(&self) -> Region {
        Region::new(self.aws.region.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml("scrape:\n  max_videos: 10\n  method: api\n").unwrap();
        assert_eq!(config.scrape.max_videos, 10);
        assert_eq!(config.scrape.method, Strategy::Api);
        assert!(config.scrape.include_transcripts);
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.youtube.caption_languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_zero_max_videos_rejected() {
        assert!(Config::from_yaml("scrape:\n  max_videos: 0\n").is_err());
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let config = Config::from_yaml("youtube:\n  api_key: '  '\n").unwrap();
        assert_eq!(config.api_key(), None);
        assert!(!config.speech_to_text_configured());
    }
}
