use serde::Serialize;
use serde_json::Value;

pub mod api;
pub mod web;
pub mod youtube_api;

use crate::locator;
use crate::pipeline::{RunContext, RunOutcome};
use crate::transcribe::{TranscriptOutcome, TranscriptResolver, MAX_TRANSCRIPT_CHARS};

/// Maximum description length stored on a record, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Canonical watch URL for a video
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// A provider counter: a parsed number, or the provider's text when it is not a plain integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Count {
    Number(u64),
    Raw(String),
}

impl Default for Count {
    fn default() -> Self {
        Count::Number(0)
    }
}

impl Count {
    /// All-digit text becomes a number; anything else is kept verbatim
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse() {
                return Count::Number(n);
            }
        }
        Count::Raw(text.to_string())
    }

    /// Absent counters are zero
    pub fn from_optional(text: Option<&str>) -> Self {
        text.map(Self::from_text).unwrap_or_default()
    }

    /// Coerce a located JSON value; `null` counts as absent
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Count::default(),
            Value::Number(n) => n
                .as_u64()
                .map(Count::Number)
                .unwrap_or_else(|| Count::Raw(n.to_string())),
            Value::String(s) => Self::from_text(s),
            other => match locator::text_of(other) {
                Some(text) => Self::from_text(&text),
                None => Count::Raw(other.to_string()),
            },
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            Count::Number(n) => Some(*n),
            Count::Raw(_) => None,
        }
    }
}

impl std::fmt::Display for Count {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Count::Number(n) => write!(f, "{}", n),
            Count::Raw(s) => write!(f, "{}", s),
        }
    }
}

/// One exported video. Field order is the export column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub video_url: String,
    pub title: String,
    pub description: String,
    pub views: Count,
    pub likes: Count,
    /// Only the API strategy reports comment counts
    pub comments: Option<Count>,
    /// Raw provider duration: ISO-8601 from the API, seconds from the web
    pub duration: String,
    pub upload_date: String,
    pub channel_name: String,
    pub channel_id: String,
    pub transcript: String,
}

/// Records produced by an enumerator and why it stopped
#[derive(Debug, Clone)]
pub struct Enumeration {
    pub records: Vec<VideoRecord>,
    pub outcome: RunOutcome,
}

/// Transcript column for one video. Empty when transcripts are not requested.
pub(crate) async fn transcript_for(
    transcripts: Option<&TranscriptResolver>,
    video_id: &str,
    ctx: &RunContext,
) -> String {
    let Some(resolver) = transcripts else {
        return String::new();
    };

    let outcome = resolver.resolve(video_id, &ctx.cancel_flag()).await;
    match &outcome {
        TranscriptOutcome::Unavailable(reason) => {
            tracing::debug!("No transcript for {}: {}", video_id, reason)
        }
        found => tracing::debug!("Transcript for {} from {}", video_id, found.source()),
    }

    outcome.into_record_text(MAX_TRANSCRIPT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_from_text() {
        assert_eq!(Count::from_text("12345"), Count::Number(12345));
        assert_eq!(Count::from_text(" 42 "), Count::Number(42));
        assert_eq!(Count::from_text("1,234 views"), Count::Raw("1,234 views".to_string()));
        assert_eq!(Count::from_text("1.2M"), Count::Raw("1.2M".to_string()));
        assert_eq!(Count::from_text(""), Count::Raw(String::new()));
        assert_eq!(
            Count::from_text("99999999999999999999999"),
            Count::Raw("99999999999999999999999".to_string())
        );
    }

    #[test]
    fn test_count_from_value() {
        assert_eq!(Count::from_value(&json!(7)), Count::Number(7));
        assert_eq!(Count::from_value(&json!("8")), Count::Number(8));
        assert_eq!(Count::from_value(&Value::Null), Count::Number(0));
        assert_eq!(
            Count::from_value(&json!({"simpleText": "1,000 views"})),
            Count::Raw("1,000 views".to_string())
        );
        assert_eq!(Count::from_value(&json!({"runs": [{"text": "15"}]})), Count::Number(15));
        assert_eq!(Count::from_optional(None), Count::Number(0));
        assert_eq!(Count::Number(3).as_number(), Some(3));
        assert_eq!(Count::Raw("x".into()).as_number(), None);
    }

    #[test]
    fn test_count_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Count::Number(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Count::Raw("1.2M".into())).unwrap(), "\"1.2M\"");
    }
}
