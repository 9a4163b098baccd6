/// Watch page retrieval
use crate::config::HttpConfig;
use crate::error::{CollectorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Anything that can turn a video id into an HTML document
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Retrieve the page for one video
    async fn fetch_document(&self, video_id: &str) -> Result<String>;

    /// Where the page for `video_id` comes from, for log lines
    fn location(&self, video_id: &str) -> String;
}

/// Fetches watch pages over HTTP, one GET per video
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    base_url: Url,
}

impl PageFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str());
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
        })
    }

    /// `<base_url>?v=<video_id>`, with the id percent-encoded
    pub fn watch_url(&self, video_id: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("v", video_id);
        url
    }
}

#[async_trait]
impl DocumentSource for PageFetcher {
    async fn fetch_document(&self, video_id: &str) -> Result<String> {
        let url = self.watch_url(video_id);
        info!("📄 Fetching watch page: {}", url);

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(CollectorError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        // Decodes by the response charset; invalid bytes become U+FFFD
        let html = response.text().await?;
        debug!("📄 Downloaded {} characters of HTML content", html.len());
        Ok(html)
    }

    fn location(&self, video_id: &str) -> String {
        self.watch_url(video_id).to_string()
    }
}
