use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use crate::config::YoutubeConfig;
use crate::Result;

/// A fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// HTTP status code
    pub status: u16,

    /// Response body decoded as text
    pub body: String,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Synchronous-per-call page retrieval used by the scraping side of the pipeline
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL. Transport failures are errors; HTTP error statuses are returned as pages.
    async fn fetch(&self, url: &str) -> Result<Page>;

    /// Fetch a URL and fail unless the status is 2xx
    async fn fetch_ok(&self, url: &str) -> Result<String> {
        let page = self.fetch(url).await?;
        if !page.is_success() {
            anyhow::bail!("HTTP {} for {}", page.status, url);
        }
        Ok(page.body)
    }
}

/// Page fetcher backed by reqwest with browser-like headers
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &YoutubeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        // skips the EU consent interstitial
        headers.insert(COOKIE, HeaderValue::from_static("CONSENT=YES+1"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(Page { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory fetcher: unknown URLs are 404s, URLs registered with `fail` are transport errors
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, String>,
        failing: Vec<String>,
        requested: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub fn fail(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Page> {
            self.requested.lock().unwrap().push(url.to_string());

            if self.failing.iter().any(|u| u == url) {
                anyhow::bail!("connection reset while fetching {}", url);
            }

            Ok(match self.pages.get(url) {
                Some(body) => Page { status: 200, body: body.clone() },
                None => Page { status: 404, body: String::new() },
            })
        }
    }
}
