//! Enumeration by scraping public channel and watch pages.

use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

use super::{transcript_for, watch_url, Count, Enumeration, VideoRecord, MAX_DESCRIPTION_CHARS};
use crate::channel::ChannelReference;
use crate::fetch::PageFetcher;
use crate::locator::{find, find_all_of, find_text, text_of};
use crate::pipeline::{RunContext, RunOutcome};
use crate::transcribe::TranscriptResolver;
use crate::utils::truncate_chars;
use crate::Result;

const INITIAL_DATA: &str = "ytInitialData";
const PLAYER_RESPONSE: &str = "ytInitialPlayerResponse";

/// A video listed on the channel page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub video_id: String,
    pub title: String,
}

/// Fields read from a watch page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchDetails {
    pub title: String,
    pub description: String,
    pub views: Count,
    pub likes: Count,
    pub duration: String,
    pub upload_date: String,
    pub channel_name: String,
    pub channel_id: Option<String>,
}

pub struct WebEnumerator {
    fetcher: Arc<dyn PageFetcher>,
    transcripts: Option<Arc<TranscriptResolver>>,
}

impl WebEnumerator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, transcripts: Option<Arc<TranscriptResolver>>) -> Self {
        Self { fetcher, transcripts }
    }

    /// Scrape up to the run's target number of videos of `channel`, in listing order.
    ///
    /// A video whose page cannot be fetched or parsed is skipped. Progress is reported against
    /// the target even when the channel lists fewer videos.
    pub async fn enumerate(&self, channel: &ChannelReference, ctx: &RunContext) -> Enumeration {
        let target = ctx.target();
        let mut records = Vec::new();

        let listing = match self.fetcher.fetch_ok(&channel.videos_url()).await {
            Ok(body) => body,
            Err(e) => {
                let detail = format!("Failed to fetch channel videos page: {:#}", e);
                ctx.error(detail.clone());
                return Enumeration { records, outcome: RunOutcome::Aborted(detail) };
            }
        };

        let mut candidates = listing_candidates(&listing);
        candidates.truncate(target);

        if candidates.is_empty() {
            ctx.warn("No videos found on the channel page");
        } else {
            ctx.info(format!("Found {} videos to process", candidates.len()));
        }

        for (index, candidate) in candidates.into_iter().enumerate() {
            if ctx.cancelled() {
                return Enumeration { records, outcome: RunOutcome::Cancelled };
            }

            ctx.info(format!(
                "Processing video {}: {}",
                index + 1,
                truncate_chars(&candidate.title, 50)
            ));

            match self.scrape_video(&candidate, channel, ctx).await {
                Ok(record) => records.push(record),
                Err(e) => ctx.warn(format!("Skipping video {}: {:#}", candidate.video_id, e)),
            }

            ctx.progress(index + 1, target);
        }

        Enumeration { records, outcome: RunOutcome::Completed }
    }

    async fn scrape_video(
        &self,
        candidate: &Candidate,
        channel: &ChannelReference,
        ctx: &RunContext,
    ) -> Result<VideoRecord> {
        let url = watch_url(&candidate.video_id);
        let page = self.fetcher.fetch_ok(&url).await?;
        let details = parse_watch_page(&page)?;

        let transcript =
            transcript_for(self.transcripts.as_deref(), &candidate.video_id, ctx).await;

        let title = if details.title.is_empty() {
            candidate.title.clone()
        } else {
            details.title
        };

        Ok(VideoRecord {
            video_id: candidate.video_id.clone(),
            video_url: url,
            title,
            description: details.description,
            views: details.views,
            likes: details.likes,
            comments: None,
            duration: details.duration,
            upload_date: details.upload_date,
            channel_name: details.channel_name,
            channel_id: details.channel_id.unwrap_or_else(|| channel.id().to_string()),
            transcript,
        })
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn script_bodies(document: &Html) -> Vec<String> {
    document
        .select(&selector("script"))
        .map(|el| el.text().collect::<String>())
        .collect()
}

/// Videos on a channel's listing page, in page order and without duplicates.
///
/// Title-link anchors are used when the page has them; otherwise renderer objects from the
/// embedded initial data.
pub fn listing_candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for anchor in document.select(&selector("a#video-title-link")) {
        let Some(video_id) = anchor.value().attr("href").and_then(video_id_from_href) else {
            continue;
        };
        let title = anchor
            .value()
            .attr("title")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| anchor.text().collect::<String>().trim().to_string());

        if seen.insert(video_id.clone()) {
            candidates.push(Candidate { video_id, title });
        }
    }

    if !candidates.is_empty() {
        return candidates;
    }

    let Some(data) = script_bodies(&document)
        .iter()
        .find_map(|script| embedded_json(script, INITIAL_DATA))
    else {
        return candidates;
    };

    for renderer in find_all_of(&data, &["videoRenderer", "gridVideoRenderer"]) {
        let Some(video_id) = renderer.get("videoId").and_then(Value::as_str) else {
            continue;
        };
        let title = renderer.get("title").and_then(text_of).unwrap_or_default();

        if seen.insert(video_id.to_string()) {
            candidates.push(Candidate { video_id: video_id.to_string(), title });
        }
    }

    candidates
}

/// The `v` query value of a `/watch` link, relative or absolute
fn video_id_from_href(href: &str) -> Option<String> {
    let url = Url::parse("https://www.youtube.com").ok()?.join(href).ok()?;
    if url.path() != "/watch" {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, id)| id.into_owned())
        .filter(|id| !id.is_empty())
}

/// Parse the first JSON object that follows `marker` in a script body.
///
/// The object is cut at its balanced closing brace; when the braces never balance the span up
/// to the last `}` is tried instead.
pub fn embedded_json(script: &str, marker: &str) -> Option<Value> {
    let at = script.find(marker)?;
    let rest = &script[at + marker.len()..];
    let start = rest.find('{')?;
    let body = &rest[start..];

    if let Some(end) = balanced_object_end(body) {
        if let Ok(value) = serde_json::from_str(&body[..end]) {
            return Some(value);
        }
    }

    let end = body.rfind('}')?;
    serde_json::from_str(&body[..=end]).ok()
}

/// Byte length of the `{...}` span at the start of `text`, skipping braces inside strings
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Locate a counter under `key`, unwrapping renderer wrappers that nest the same key
fn count_at(root: &Value, key: &str) -> Option<Count> {
    let mut value = find(root, key)?;
    while value.is_object() && text_of(value).is_none() {
        match find(value, key) {
            Some(inner) => value = inner,
            None => break,
        }
    }
    Some(Count::from_value(value))
}

/// Extract record fields from a watch page's embedded state, falling back to meta tags
pub fn parse_watch_page(html: &str) -> Result<WatchDetails> {
    let document = Html::parse_document(html);
    let scripts = script_bodies(&document);

    let meta = |css: &str| {
        document
            .select(&selector(css))
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };
    let og_title = meta(r#"meta[property="og:title"]"#);
    let meta_description = meta(r#"meta[name="description"]"#);

    let payloads: Vec<Value> = [INITIAL_DATA, PLAYER_RESPONSE]
        .into_iter()
        .filter_map(|marker| {
            scripts
                .iter()
                .find_map(|script| embedded_json(script, marker))
        })
        .collect();

    if payloads.is_empty() {
        anyhow::bail!("no embedded video data found");
    }
    let data = Value::Array(payloads);

    let details = find(&data, "videoPrimaryInfoRenderer")
        .or_else(|| find(&data, "videoDetails"))
        .filter(|d| !d.is_null());
    let scope = details.unwrap_or(&data);

    let title = find_text(scope, "title")
        .or(og_title)
        .unwrap_or_default();

    let description = find_text(&data, "shortDescription")
        .or(meta_description)
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let views = find(&data, "videoDetails")
        .and_then(|d| count_at(d, "viewCount"))
        .or_else(|| count_at(scope, "viewCount"))
        .unwrap_or_default();

    let likes = count_at(&data, "likeCount").unwrap_or_default();

    let upload_date = find_text(scope, "dateText")
        .or_else(|| find_text(&data, "publishDate"))
        .or_else(|| find_text(&data, "uploadDate"))
        .unwrap_or_default();

    let channel_id = find(&data, "channelId")
        .and_then(Value::as_str)
        .map(String::from);

    let channel_name = find_text(&data, "ownerChannelName")
        .or_else(|| find_text(&data, "author"))
        .or_else(|| find(&data, "videoOwnerRenderer").and_then(|o| find_text(o, "title")))
        .unwrap_or_default();

    let duration = find_text(&data, "lengthSeconds").unwrap_or_default();

    Ok(WatchDetails {
        title,
        description,
        views,
        likes,
        duration,
        upload_date,
        channel_name,
        channel_id,
    })
}
