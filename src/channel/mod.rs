//! Channel identifier resolution from user-supplied channel URLs.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;

use crate::fetch::PageFetcher;
use crate::ResolutionError;

/// A user-supplied channel URL and the channel identifier it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReference {
    input: String,
    id: String,
}

impl ChannelReference {
    pub fn new(input: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            id: id.into(),
        }
    }

    /// The URL as the user entered it
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The provider-assigned channel identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The channel's video listing page
    pub fn videos_url(&self) -> String {
        format!("https://www.youtube.com/channel/{}/videos", self.id)
    }
}

/// Recognized channel URL shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUrl {
    /// `/channel/<id>`
    Id(String),
    /// `/c/<name>`
    Custom,
    /// `/@<handle>`
    Handle(String),
}

impl ChannelUrl {
    pub fn parse(url: &str) -> Option<Self> {
        if let Some(id) = segment_after(url, "/channel/") {
            return Some(Self::Id(id));
        }
        if url.contains("/c/") {
            return Some(Self::Custom);
        }
        segment_after(url, "/@").map(Self::Handle)
    }
}

/// The text following the last occurrence of `marker`, up to the next `/` or `?`
pub fn segment_after(url: &str, marker: &str) -> Option<String> {
    let (_, rest) = url.rsplit_once(marker)?;
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    let segment = &rest[..end];
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Resolves channel URLs, fetching the channel page when the URL does not carry the id
pub struct ChannelResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl ChannelResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn resolve(&self, url: &str) -> Result<ChannelReference, ResolutionError> {
        let url = url.trim();
        let id = match ChannelUrl::parse(url) {
            Some(ChannelUrl::Id(id)) => id,
            Some(ChannelUrl::Custom) => self.resolve_from_page(url).await?,
            Some(ChannelUrl::Handle(handle)) => {
                let root = format!("https://www.youtube.com/@{}", handle);
                self.resolve_from_page(&root).await?
            }
            None => return Err(ResolutionError::UnsupportedFormat(url.to_string())),
        };

        tracing::debug!("Resolved {} to channel {}", url, id);
        Ok(ChannelReference::new(url, id))
    }

    async fn resolve_from_page(&self, page_url: &str) -> Result<String, ResolutionError> {
        let body = self
            .fetcher
            .fetch_ok(page_url)
            .await
            .map_err(|e| ResolutionError::FetchFailed(e.to_string()))?;

        channel_id_from_html(&body).ok_or_else(|| ResolutionError::NotFound(page_url.to_string()))
    }
}

/// Search a channel page for its identifier: meta tag, then canonical link, then script payloads
pub fn channel_id_from_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let meta = Selector::parse(r#"meta[itemprop="channelId"]"#).expect("static selector");
    if let Some(id) = document
        .select(&meta)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|id| !id.is_empty())
    {
        return Some(id.to_string());
    }

    let canonical = Selector::parse(r#"link[rel="canonical"]"#).expect("static selector");
    if let Some(id) = document
        .select(&canonical)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| segment_after(href, "/channel/"))
    {
        return Some(id);
    }

    let pattern = Regex::new(r#""channelId"\s*:\s*"([^"]+)""#).expect("static regex");
    let scripts = Selector::parse("script").expect("static selector");
    document
        .select(&scripts)
        .map(|el| el.text().collect::<String>())
        .filter(|body| body.contains("channelId"))
        .find_map(|body| pattern.captures(&body).map(|caps| caps[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    fn build(fetcher: StaticFetcher) -> ChannelResolver {
        ChannelResolver::new(Arc::new(fetcher))
    }

    #[tokio::test]
    async fn test_channel_path_is_taken_verbatim() {
        let resolver = build(StaticFetcher::new());
        for url in [
            "https://www.youtube.com/channel/UCabc123",
            "https://www.youtube.com/channel/UCabc123/videos",
            "https://www.youtube.com/channel/UCabc123?view=0",
            "youtube.com/channel/UCabc123/featured?sub=1",
        ] {
            let channel = resolver.resolve(url).await.unwrap();
            assert_eq!(channel.id(), "UCabc123", "{}", url);
            assert_eq!(channel.input(), url);
        }
    }

    #[test]
    fn test_segment_runs_to_slash_or_query_only() {
        assert_eq!(
            segment_after("https://x/channel/UCab#top/videos", "/channel/"),
            Some("UCab#top".to_string())
        );
        assert_eq!(segment_after("https://x/@name?x=1", "/@"), Some("name".to_string()));
        assert_eq!(segment_after("https://x/channel/", "/channel/"), None);
    }

    #[tokio::test]
    async fn test_custom_url_uses_meta_tag() {
        let url = "https://www.youtube.com/c/SomeName";
        let html = r#"<html><head><meta itemprop="channelId" content="UCmeta"></head></html>"#;
        let resolver = build(StaticFetcher::new().page(url, html));
        assert_eq!(resolver.resolve(url).await.unwrap().id(), "UCmeta");
    }

    #[tokio::test]
    async fn test_handle_is_rewritten_to_root() {
        let html = r#"<html><head><link rel="canonical" href="https://www.youtube.com/channel/UCcanon"></head></html>"#;
        let fetcher = Arc::new(StaticFetcher::new().page("https://www.youtube.com/@handle", html));
        let resolver = ChannelResolver::new(fetcher.clone());

        let channel = resolver
            .resolve("https://www.youtube.com/@handle/videos?view=0")
            .await
            .unwrap();

        assert_eq!(channel.id(), "UCcanon");
        assert_eq!(fetcher.requested(), vec!["https://www.youtube.com/@handle".to_string()]);
    }

    #[test]
    fn test_script_payload_fallback() {
        let html = r#"<html><body>
            <script>var other = 1;</script>
            <script>var ytInitialData = {"header":{"channelId" : "UCscript"}};</script>
        </body></html>"#;
        assert_eq!(channel_id_from_html(html), Some("UCscript".to_string()));
    }

    #[test]
    fn test_meta_wins_over_canonical() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://www.youtube.com/channel/UCcanon">
            <meta itemprop="channelId" content="UCmeta">
        </head></html>"#;
        assert_eq!(channel_id_from_html(html), Some("UCmeta".to_string()));
    }

    #[tokio::test]
    async fn test_page_without_id_is_not_found() {
        let url = "https://www.youtube.com/c/Nobody";
        let resolver = build(StaticFetcher::new().page(url, "<html><body>nothing</body></html>"));
        assert_eq!(
            resolver.resolve(url).await,
            Err(ResolutionError::NotFound(url.to_string()))
        );
    }

    #[tokio::test]
    async fn test_fetch_failures_are_typed() {
        let url = "https://www.youtube.com/c/Broken";
        let resolver = build(StaticFetcher::new().fail(url));
        assert!(matches!(
            resolver.resolve(url).await,
            Err(ResolutionError::FetchFailed(_))
        ));

        // unknown pages are 404s
        let resolver = build(StaticFetcher::new());
        assert!(matches!(
            resolver.resolve("https://www.youtube.com/@missing").await,
            Err(ResolutionError::FetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unrecognized_shape_is_unsupported() {
        let resolver = build(StaticFetcher::new());
        assert_eq!(
            resolver.resolve("https://www.youtube.com/watch?v=abc").await,
            Err(ResolutionError::UnsupportedFormat("https://www.youtube.com/watch?v=abc".to_string()))
        );
    }
}
