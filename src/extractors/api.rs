//! Enumeration through the YouTube Data API.

use std::sync::Arc;

use super::youtube_api::{DataApi, VideoItem};
use super::{transcript_for, watch_url, Count, Enumeration, VideoRecord, MAX_DESCRIPTION_CHARS};
use crate::channel::ChannelUrl;
use crate::pipeline::{RunContext, RunOutcome};
use crate::transcribe::TranscriptResolver;
use crate::utils::truncate_chars;
use crate::{ApiError, ConfigError, PipelineError};

/// Largest page the playlist endpoint returns and largest id batch the videos endpoint accepts
pub const PROVIDER_PAGE_LIMIT: usize = 50;

pub struct ApiEnumerator {
    api: Arc<dyn DataApi>,
    transcripts: Option<Arc<TranscriptResolver>>,
}

impl ApiEnumerator {
    pub fn new(api: Arc<dyn DataApi>, transcripts: Option<Arc<TranscriptResolver>>) -> Self {
        Self { api, transcripts }
    }

    /// Enumerate up to the run's target number of uploads of the channel behind `channel_url`.
    ///
    /// Channel lookup failures are returned as errors. A failed page or detail call stops
    /// pagination and the records collected so far are returned with an `Aborted` outcome.
    pub async fn enumerate(
        &self,
        channel_url: &str,
        ctx: &RunContext,
    ) -> Result<Enumeration, PipelineError> {
        let channel_id = self.resolve_channel(channel_url).await?;
        ctx.success(format!("Channel ID: {}", channel_id));

        let channel = self
            .api
            .get_channel(&channel_id)
            .await?
            .ok_or_else(|| ConfigError::ChannelNotFound(channel_id.clone()))?;
        ctx.success(format!("Channel: {}", channel.snippet.title));

        let uploads = channel.uploads_playlist().ok_or_else(|| {
            PipelineError::Provider(format!("channel {} has no uploads playlist", channel_id))
        })?;

        let mut records = Vec::new();
        let outcome = self
            .collect(uploads, &channel.snippet.title, &channel_id, ctx, &mut records)
            .await;

        Ok(Enumeration { records, outcome })
    }

    async fn resolve_channel(&self, channel_url: &str) -> Result<String, PipelineError> {
        match ChannelUrl::parse(channel_url) {
            Some(ChannelUrl::Id(id)) => Ok(id),
            Some(ChannelUrl::Handle(handle)) => {
                let query = urlencoding::decode(&handle)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or(handle);

                let hits = self.api.search_channels(&query).await?;
                hits.into_iter()
                    .next()
                    .ok_or_else(|| ConfigError::ChannelNotFound(query).into())
            }
            _ => Err(ConfigError::UnsupportedFormat(channel_url.to_string()).into()),
        }
    }

    async fn collect(
        &self,
        uploads: &str,
        channel_name: &str,
        channel_id: &str,
        ctx: &RunContext,
        records: &mut Vec<VideoRecord>,
    ) -> RunOutcome {
        let max = ctx.target();
        let mut page_token: Option<String> = None;

        loop {
            if ctx.cancelled() {
                return RunOutcome::Cancelled;
            }

            let remaining = max.saturating_sub(records.len());
            if remaining == 0 {
                return RunOutcome::Completed;
            }

            let page = match self
                .api
                .list_playlist_items(uploads, remaining.min(PROVIDER_PAGE_LIMIT), page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => return abort(ctx, "Failed to list channel uploads", e),
            };

            if page.items.is_empty() {
                return RunOutcome::Completed;
            }

            let ids: Vec<String> = page
                .items
                .iter()
                .filter_map(|item| item.video_id())
                .take(remaining)
                .map(String::from)
                .collect();

            for batch in ids.chunks(PROVIDER_PAGE_LIMIT) {
                if ctx.cancelled() {
                    return RunOutcome::Cancelled;
                }

                let mut videos = match self.api.get_videos(batch).await {
                    Ok(videos) => videos,
                    Err(e) => return abort(ctx, "Failed to fetch video details", e),
                };
                videos.sort_by_key(|v| batch.iter().position(|id| *id == v.id));

                for video in videos {
                    if ctx.cancelled() {
                        return RunOutcome::Cancelled;
                    }
                    if records.len() >= max {
                        return RunOutcome::Completed;
                    }

                    let transcript =
                        transcript_for(self.transcripts.as_deref(), &video.id, ctx).await;
                    let record = video_record(video, channel_name, channel_id, transcript);

                    ctx.info(format!("Processed: {}", truncate_chars(&record.title, 50)));
                    records.push(record);
                    ctx.progress(records.len(), max);
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return RunOutcome::Completed,
            }
        }
    }
}

fn abort(ctx: &RunContext, what: &str, err: ApiError) -> RunOutcome {
    let detail = format!("{}: {}", what, err);
    ctx.error(detail.clone());
    RunOutcome::Aborted(detail)
}

/// Build a record from a `videos` item
fn video_record(
    video: VideoItem,
    channel_name: &str,
    channel_id: &str,
    transcript: String,
) -> VideoRecord {
    let VideoItem { id, snippet, statistics, content_details } = video;

    let or_default = |value: String, fallback: &str| {
        if value.is_empty() {
            fallback.to_string()
        } else {
            value
        }
    };

    VideoRecord {
        video_url: watch_url(&id),
        video_id: id,
        title: snippet.title,
        description: truncate_chars(&snippet.description, MAX_DESCRIPTION_CHARS),
        views: Count::from_optional(statistics.view_count.as_deref()),
        likes: Count::from_optional(statistics.like_count.as_deref()),
        comments: Some(Count::from_optional(statistics.comment_count.as_deref())),
        duration: content_details.duration,
        upload_date: snippet.published_at,
        channel_name: or_default(snippet.channel_title, channel_name),
        channel_id: or_default(snippet.channel_id, channel_id),
        transcript,
    }
}
