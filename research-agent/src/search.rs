use crate::types::{ResearchConfig, ResearchError, Result, SearchClient, SearchHit};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TAVILY_API_URL: &str = "https://api.tavily.com";

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily web search client.
pub struct TavilyClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: TAVILY_API_URL.to_string(),
        })
    }

    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let client = Self::new(config.tavily_api_key.clone(), config.search_timeout())?;
        Ok(match &config.tavily_base_url {
            Some(base_url) => client.with_base_url(base_url),
            None => client,
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ResearchError::MissingConfig("TAVILY_API_KEY is not set".to_string()))
    }

    pub async fn query(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = TavilySearchRequest {
            api_key: self.api_key()?,
            query,
            max_results,
            search_depth: "basic",
        };

        debug!(query, max_results, "Tavily search request");

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Api {
                service: "Tavily",
                status,
                body,
            });
        }

        let body: TavilySearchResponse = response.json().await?;
        Ok(body
            .results
            .into_iter()
            .take(max_results)
            .map(|result| SearchHit {
                url: result.url,
                snippet: result.content,
            })
            .collect())
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn ensure_ready(&self) -> anyhow::Result<()> {
        self.api_key()?;
        Ok(())
    }

    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.query(query, max_results).await?)
    }
}
