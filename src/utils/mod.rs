use crate::config::Config;

/// Optional external tools and services, probed once per process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `yt-dlp` is on PATH (caption listing and audio download)
    pub yt_dlp: bool,
    /// `ffmpeg` is on PATH (audio extraction)
    pub ffmpeg: bool,
    /// A speech-to-text backend is configured
    pub speech_to_text: bool,
}

impl Capabilities {
    /// Check the current environment for the optional tools
    pub async fn detect(config: &Config) -> Self {
        Self {
            yt_dlp: check_command_available("yt-dlp", "--version").await,
            ffmpeg: check_command_available("ffmpeg", "-version").await,
            speech_to_text: config.speech_to_text_configured(),
        }
    }

    /// Caption tiers need yt-dlp to list tracks
    pub fn captions(&self) -> bool {
        self.yt_dlp
    }

    /// The audio tier needs every piece of the download and transcription chain
    pub fn audio_transcription(&self) -> bool {
        self.yt_dlp && self.ffmpeg && self.speech_to_text
    }

    /// Human-readable notes about missing pieces
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if !self.yt_dlp {
            missing.push("yt-dlp - required for captions and audio download".to_string());
        }

        if !self.ffmpeg {
            missing.push("ffmpeg - required for the audio transcription fallback".to_string());
        }

        if !self.speech_to_text {
            missing.push(
                "aws.s3_bucket - required for the audio transcription fallback".to_string(),
            );
        }

        missing
    }
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// The first `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
