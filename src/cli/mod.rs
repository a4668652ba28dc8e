use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::Strategy;

#[derive(Parser)]
#[command(
    name = "channel-scraper",
    about = "Channel Scraper - Export a YouTube channel's videos with metadata and transcripts",
    version,
    long_about = "A CLI tool that lists a YouTube channel's uploads, either by scraping public pages or through the YouTube Data API, and exports one record per video with its metadata and transcript. Transcripts come from manual captions, then auto-generated captions, then AWS Transcribe over the downloaded audio."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape a channel's videos
    Scrape {
        /// Channel URL (/channel/<id>, /c/<name> or /@<handle>)
        #[arg(value_name = "CHANNEL_URL")]
        url: String,

        /// Maximum number of videos to collect (defaults to the config value)
        #[arg(short = 'n', long, value_name = "COUNT", value_parser = clap::value_parser!(u64).range(1..))]
        max_videos: Option<u64>,

        /// Acquisition method (defaults to the config value)
        #[arg(short, long, value_enum)]
        method: Option<Strategy>,

        /// YouTube Data API key for the api method
        #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Skip transcript lookup
        #[arg(long)]
        no_transcripts: bool,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to the config value)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Report which optional tools and services are available
    Check,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// CSV with a header row
    Csv,
    /// Pretty-printed JSON array
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scrape_arguments() {
        let cli = Cli::try_parse_from([
            "channel-scraper",
            "scrape",
            "https://www.youtube.com/@someone",
            "-n",
            "5",
            "--method",
            "api",
            "--api-key",
            "k",
            "--no-transcripts",
            "-f",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Scrape { url, max_videos, method, api_key, no_transcripts, output, format } => {
                assert_eq!(url, "https://www.youtube.com/@someone");
                assert_eq!(max_videos, Some(5));
                assert_eq!(method, Some(Strategy::Api));
                assert_eq!(api_key.as_deref(), Some("k"));
                assert!(no_transcripts);
                assert_eq!(output, None);
                assert_eq!(format, Some(OutputFormat::Json));
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_zero_max_videos_rejected() {
        let parsed = Cli::try_parse_from(["channel-scraper", "scrape", "https://x/channel/UC1", "-n", "0"]);
        assert!(parsed.is_err());
    }
}
