use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::AudioDownloader;
use crate::Result;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Best-audio download using yt-dlp, converted to mp3 with ffmpeg
pub struct YtDlpAudioDownloader {
    yt_dlp_path: String,
}

impl YtDlpAudioDownloader {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }
}

impl Default for YtDlpAudioDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioDownloader for YtDlpAudioDownloader {
    async fn download_best_audio(&self, video_id: &str, dir: &Path) -> Result<Option<PathBuf>> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let template = dir.join("audio.%(ext)s").to_string_lossy().to_string();
        tracing::debug!("Downloading audio for {} into {}", url, dir.display());

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--format", "bestaudio",
                "--extract-audio",
                "--audio-format", "mp3",
                "--no-playlist",
                "--output", template.as_str(),
                url.as_str(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            tracing::debug!(
                "yt-dlp audio download failed for {}: {}",
                video_id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        find_audio_file(dir)
    }
}

/// The downloaded audio file, preferring the converted mp3
fn find_audio_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mp3 = dir.join("audio.mp3");
    if mp3.is_file() {
        return Ok(Some(mp3));
    }

    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let is_audio = path.file_stem().and_then(|s| s.to_str()) == Some("audio")
            && AudioFormat::from_path(&path).is_some();
        if is_audio && path.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("/tmp/audio.MP3")), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_path(Path::new("audio.opus")), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_path(Path::new("audio.part")), None);
        assert_eq!(AudioFormat::M4a.mime_type(), "audio/mp4");
    }

    #[test]
    fn test_find_audio_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_audio_file(dir.path()).unwrap(), None);

        fs_err::write(dir.path().join("audio.webm.part"), b"partial").unwrap();
        assert_eq!(find_audio_file(dir.path()).unwrap(), None);

        fs_err::write(dir.path().join("audio.m4a"), b"m4a").unwrap();
        assert_eq!(find_audio_file(dir.path()).unwrap(), Some(dir.path().join("audio.m4a")));

        fs_err::write(dir.path().join("audio.mp3"), b"mp3").unwrap();
        assert_eq!(find_audio_file(dir.path()).unwrap(), Some(dir.path().join("audio.mp3")));
    }
}
