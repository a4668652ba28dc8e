use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{CaptionFormat, CaptionSegment, CaptionSource, CaptionTrack};
use crate::Result;

/// Caption listing through `yt-dlp --dump-json`, track download through reqwest
pub struct YtDlpCaptionSource {
    yt_dlp_path: String,
    client: Client,
    languages: Vec<String>,
}

impl YtDlpCaptionSource {
    pub fn new(languages: Vec<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            yt_dlp_path: "yt-dlp".to_string(),
            client: Client::builder().timeout(timeout).build()?,
            languages,
        })
    }

    /// Get video information using yt-dlp
    async fn video_info(&self, video_id: &str) -> Result<Value> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        tracing::debug!("Listing captions for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--dump-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                url.as_str(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .context("Failed to parse yt-dlp output")?;

        Ok(info)
    }
}

#[async_trait]
impl CaptionSource for YtDlpCaptionSource {
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        let info = self.video_info(video_id).await?;
        Ok(tracks_from_info(&info, &self.languages))
    }

    async fn fetch_segments(&self, track: &CaptionTrack) -> Result<Vec<CaptionSegment>> {
        let response = self.client.get(&track.url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download captions: HTTP {}", response.status());
        }

        let body = response.text().await?;
        match track.format {
            CaptionFormat::Json3 => parse_json3(&body),
            CaptionFormat::Vtt => Ok(parse_vtt(&body)),
        }
    }
}

/// Manual tracks (from `subtitles`) followed by generated ones (from `automatic_captions`),
/// each group ordered by language preference
pub fn tracks_from_info(info: &Value, languages: &[String]) -> Vec<CaptionTrack> {
    let mut manual = tracks_in(info.get("subtitles"), false);
    let mut generated = tracks_in(info.get("automatic_captions"), true);

    manual.sort_by_key(|t| language_rank(&t.language, languages));
    generated.sort_by_key(|t| language_rank(&t.language, languages));

    manual.extend(generated);
    manual
}

fn tracks_in(listing: Option<&Value>, is_generated: bool) -> Vec<CaptionTrack> {
    let Some(Value::Object(by_language)) = listing else {
        return Vec::new();
    };

    by_language
        .iter()
        .filter(|(language, _)| language.as_str() != "live_chat")
        .filter_map(|(language, formats)| {
            let formats = formats.as_array()?;
            let pick = |ext: &str| {
                formats
                    .iter()
                    .find(|f| f.get("ext").and_then(Value::as_str) == Some(ext))
            };
            let (format, entry) = pick("json3")
                .map(|f| (CaptionFormat::Json3, f))
                .or_else(|| pick("vtt").map(|f| (CaptionFormat::Vtt, f)))?;

            Some(CaptionTrack {
                language: language.clone(),
                name: entry.get("name").and_then(Value::as_str).map(String::from),
                is_generated,
                url: entry.get("url")?.as_str()?.to_string(),
                format,
            })
        })
        .collect()
}

fn language_rank(language: &str, preferred: &[String]) -> usize {
    let base = language.split('-').next().unwrap_or(language);
    if let Some(pos) = preferred
        .iter()
        .position(|p| p.eq_ignore_ascii_case(language) || p.eq_ignore_ascii_case(base))
    {
        return pos;
    }
    // yt-dlp marks the source language of auto captions with "-orig"
    if language.ends_with("-orig") {
        preferred.len()
    } else {
        preferred.len() + 1
    }
}

#[derive(Debug, Deserialize)]
struct Json3Captions {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: f64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: f64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse YouTube's json3 caption format
pub fn parse_json3(body: &str) -> Result<Vec<CaptionSegment>> {
    let captions: Json3Captions = serde_json::from_str(body)
        .context("Failed to parse json3 captions")?;

    Ok(captions
        .events
        .into_iter()
        .filter_map(|event| {
            let text = event
                .segs
                .iter()
                .map(|s| s.utf8.as_str())
                .collect::<String>()
                .replace('\n', " ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }
            Some(CaptionSegment {
                text,
                start: event.start_ms / 1000.0,
                duration: event.duration_ms / 1000.0,
            })
        })
        .collect())
}

/// Parse WebVTT cues, dropping inline timing/style tags and the repeated lines of rolling
/// auto-captions
pub fn parse_vtt(body: &str) -> Vec<CaptionSegment> {
    let tags = Regex::new(r"<[^>]*>").expect("static regex");
    let mut segments = Vec::new();
    let mut current: Option<(f64, f64, Vec<String>)> = None;
    let mut last_line = String::new();

    let mut flush = |current: &mut Option<(f64, f64, Vec<String>)>| {
        if let Some((start, end, lines)) = current.take() {
            if !lines.is_empty() {
                segments.push(CaptionSegment {
                    text: lines.join(" "),
                    start,
                    duration: (end - start).max(0.0),
                });
            }
        }
    };

    for line in body.lines() {
        let line = line.trim();

        if let Some((from, to)) = line.split_once("-->") {
            flush(&mut current);
            let start = parse_timestamp(from.trim());
            let end = to.split_whitespace().next().and_then(parse_timestamp);
            if let Some(start) = start {
                current = Some((start, end.unwrap_or(start), Vec::new()));
            }
            continue;
        }

        if line.is_empty() {
            flush(&mut current);
            continue;
        }

        // header, metadata and cue identifiers sit outside cues
        let Some((_, _, lines)) = current.as_mut() else {
            continue;
        };

        let cleaned = tags.replace_all(line, "");
        let cleaned = decode_entities(cleaned.trim());
        if cleaned.is_empty() || cleaned == last_line {
            continue;
        }
        last_line = cleaned.clone();
        lines.push(cleaned);
    }
    flush(&mut current);

    segments
}

fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut seconds = 0.0;
    for part in ts.split(':') {
        seconds = seconds * 60.0 + part.trim().parse::<f64>().ok()?;
    }
    Some(seconds)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tracks_split_manual_and_generated() {
        let info = json!({
            "subtitles": {
                "de": [{"ext": "vtt", "url": "https://c/de.vtt"}],
                "en-GB": [{"ext": "vtt", "url": "https://c/en.vtt"}, {"ext": "json3", "url": "https://c/en.json3", "name": "English (UK)"}],
                "live_chat": [{"ext": "json", "url": "https://c/chat"}]
            },
            "automatic_captions": {
                "fr": [{"ext": "json3", "url": "https://c/fr.json3"}],
                "en-orig": [{"ext": "json3", "url": "https://c/en-orig.json3"}],
                "xx": [{"ext": "srv1", "url": "https://c/xx.srv1"}]
            }
        });

        let tracks = tracks_from_info(&info, &["en".to_string()]);
        let summary: Vec<_> = tracks
            .iter()
            .map(|t| (t.language.as_str(), t.is_generated, t.format))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("en-GB", false, CaptionFormat::Json3),
                ("de", false, CaptionFormat::Vtt),
                ("en-orig", true, CaptionFormat::Json3),
                ("fr", true, CaptionFormat::Json3),
            ]
        );
        assert_eq!(tracks[0].name.as_deref(), Some("English (UK)"));
    }

    #[test]
    fn test_no_caption_listings() {
        assert!(tracks_from_info(&json!({"id": "abc"}), &[]).is_empty());
    }

    #[test]
    fn test_parse_json3() {
        let body = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 1500, "segs": [{"utf8": "Hello"}, {"utf8": " there"}]},
            {"tStartMs": 1500, "dDurationMs": 10, "aAppend": 1, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 2000, "dDurationMs": 1000},
            {"tStartMs": 2500, "dDurationMs": 1000, "segs": [{"utf8": "general\nKenobi"}]}
        ]}"#;

        let segments = parse_json3(body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there");
        assert_eq!(segments[0].duration, 1.5);
        assert_eq!(segments[1].text, "general Kenobi");
        assert_eq!(segments[1].start, 2.5);
    }

    #[test]
    fn test_parse_vtt_strips_tags_and_rolling_repeats() {
        let body = "WEBVTT\nKind: captions\nLanguage: en\n\n\
            00:00:00.000 --> 00:00:02.000 align:start position:0%\n\
            we<00:00:00.500><c> are</c><00:00:01.000><c> here</c>\n\n\
            00:00:02.000 --> 00:00:04.500\n\
            we are here\n\
            Tom &amp; Jerry\n\n\
            1\n\
            01:00:00.000 --> 01:00:01.000\n\
            <i>the end</i>\n";

        let segments = parse_vtt(body);
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["we are here", "Tom & Jerry", "the end"]);
        assert_eq!(segments[1].start, 2.0);
        assert_eq!(segments[1].duration, 2.5);
        assert_eq!(segments[2].start, 3600.0);
    }
}
