use crate::types::{FetchConfig, FetchedPage, PageFetcher, ResearchError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// `PageFetcher` backed by a shared reqwest client.
pub struct HttpPageFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpPageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    pub async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        let url = Url::parse(url)?;
        let start_time = Instant::now();

        debug!("Fetching page: {}", url);

        let mut response = self.client.get(url.clone()).timeout(timeout).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(ResearchError::ResponseTooLarge {
                    url: url.to_string(),
                    length,
                    limit: self.max_body_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let remaining = self.max_body_bytes - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                warn!("Body of {} cut off at {} bytes", url, self.max_body_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            "Fetched {} -> HTTP {} ({} bytes in {}ms)",
            url,
            status.as_u16(),
            body.len(),
            start_time.elapsed().as_millis()
        );

        Ok(FetchedPage {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> anyhow::Result<FetchedPage> {
        Ok(self.get(url, timeout).await?)
    }
}
