//! YouTube Data API v3 client.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::YoutubeConfig;
use crate::locator::{find, find_all};
use crate::{ApiError, AuthError};

/// The four Data API calls the API strategy needs
#[async_trait]
pub trait DataApi: Send + Sync {
    /// Channel ids matching `query`, best hit first
    async fn search_channels(&self, query: &str) -> Result<Vec<String>, ApiError>;

    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelItem>, ApiError>;

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage, ApiError>;

    /// Details for up to 50 videos
    async fn get_videos(&self, video_ids: &[String]) -> Result<Vec<VideoItem>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    channel_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub id: String,
    #[serde(default)]
    pub snippet: ChannelSnippet,
    #[serde(default)]
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelSnippet {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    #[serde(default)]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

impl ChannelItem {
    /// The playlist holding every upload of the channel
    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .related_playlists
            .uploads
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub content_details: PlaylistItemDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemDetails {
    pub video_id: Option<String>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.content_details
            .video_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
}

/// Counters arrive as decimal strings and are omitted when hidden
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoContentDetails {
    /// ISO-8601 duration, e.g. `PT4M13S`
    #[serde(default)]
    pub duration: String,
}

/// Data API client over reqwest
pub struct HttpDataApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpDataApi {
    pub fn new(config: &YoutubeConfig, api_key: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!("YouTube API request: {} {:?}", endpoint, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DataApi for HttpDataApi {
    async fn search_channels(&self, query: &str) -> Result<Vec<String>, ApiError> {
        let response: ListResponse<SearchItem> = self
            .get(
                "search",
                &[
                    ("part", "snippet".to_string()),
                    ("type", "channel".to_string()),
                    ("maxResults", "5".to_string()),
                    ("q", query.to_string()),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.channel_id)
            .collect())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelItem>, ApiError> {
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[
                    ("part", "snippet,contentDetails".to_string()),
                    ("id", channel_id.to_string()),
                ],
            )
            .await?;

        Ok(response.items.into_iter().next())
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage, ApiError> {
        let mut params = vec![
            ("part", "contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.get("playlistItems", &params).await
    }

    async fn get_videos(&self, video_ids: &[String]) -> Result<Vec<VideoItem>, ApiError> {
        let response: ListResponse<VideoItem> = self
            .get(
                "videos",
                &[
                    ("part", "snippet,statistics,contentDetails".to_string()),
                    ("id", video_ids.join(",")),
                ],
            )
            .await?;

        Ok(response.items)
    }
}

/// Map an error response onto the credential errors callers care about
pub fn classify_error(status: u16, body: &str) -> ApiError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    let reasons: Vec<&str> = find_all(&parsed, "reason")
        .into_iter()
        .filter_map(Value::as_str)
        .collect();
    let message = find(&parsed, "message")
        .and_then(Value::as_str)
        .map(String::from);

    if reasons
        .iter()
        .any(|r| matches!(*r, "quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded"))
    {
        return AuthError::QuotaExceeded.into();
    }

    let invalid_message = message
        .as_deref()
        .is_some_and(|m| m.contains("API key not valid"));
    if reasons.contains(&"keyInvalid") || invalid_message {
        return AuthError::InvalidKey.into();
    }

    ApiError::Http {
        status,
        message: message.unwrap_or_else(|| body.chars().take(200).collect()),
    }
}
