use crate::parser::ContentExtractor;
use crate::pipeline::PipelinePhase;
use crate::traits::ResearchStage;
use crate::utils::url::is_fetchable_url;
use crate::types::{
    ChatMessage, FetchConfig, PageFetcher, ResearchState, ScrapedPage, StageError, StateUpdate,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches each retrieved document and keeps its readable text.
///
/// Individual fetch failures are recorded in the audit log and the document
/// is dropped. The stage itself only reports an error when it was given no
/// documents at all.
pub struct ContentScraper {
    fetcher: Arc<dyn PageFetcher>,
    extractor: ContentExtractor,
    timeout: Duration,
}

impl ContentScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &FetchConfig) -> Self {
        Self {
            fetcher,
            extractor: ContentExtractor::new(config.max_content_chars),
            timeout: config.timeout(),
        }
    }

    async fn scrape(&self, url: &str) -> Result<String, String> {
        if !is_fetchable_url(url) {
            return Err("not an http(s) URL".to_string());
        }

        let page = self
            .fetcher
            .fetch(url, self.timeout)
            .await
            .map_err(|e| e.to_string())?;

        if !page.is_success() {
            return Err(format!("HTTP {}", page.status));
        }

        Ok(self.extractor.extract_page(&page))
    }
}

#[async_trait]
impl ResearchStage for ContentScraper {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Scraping
    }

    async fn run(&self, state: &ResearchState) -> StateUpdate {
        if state.retrieved_docs.is_empty() {
            warn!("No documents to scrape");
            let error = StageError::NoDocuments;
            return StateUpdate {
                scraped_data: Some(Vec::new()),
                messages: vec![error.audit()],
                ..Default::default()
            }
            .with_error(error);
        }

        let mut scraped = Vec::new();
        let mut messages = Vec::new();
        let mut attempted = HashSet::new();

        for document in &state.retrieved_docs {
            // Fetch and dedup on the trimmed URL, but record the document's own.
            let url = document.url.trim();
            if url.is_empty() {
                debug!("Skipping document without a URL");
                continue;
            }
            if !attempted.insert(url.to_string()) {
                debug!("Already scraped {}", url);
                continue;
            }

            match self.scrape(url).await {
                Ok(content) => {
                    let chars = content.chars().count();
                    debug!("Scraped {} ({} characters)", url, chars);
                    messages.push(ChatMessage::assistant(format!(
                        "Scraped {} ({} characters).",
                        url, chars
                    )));
                    scraped.push(ScrapedPage {
                        url: document.url.clone(),
                        content,
                    });
                }
                Err(cause) => {
                    warn!("Failed to scrape {}: {}", url, cause);
                    messages.push(
                        StageError::ScrapeFailed {
                            url: url.to_string(),
                            cause,
                        }
                        .audit(),
                    );
                }
            }
        }

        info!(
            "Scraped {} of {} documents",
            scraped.len(),
            state.retrieved_docs.len()
        );

        StateUpdate {
            scraped_data: Some(scraped),
            messages,
            ..Default::default()
        }
        .clear_error()
    }
}
