use crate::pipeline::PipelinePhase;
use crate::traits::ResearchStage;
use crate::types::{
    ChatMessage, Document, ResearchState, SearchClient, SearchHit, StageError, StateUpdate,
    RESULTS_PER_QUERY,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs every query against the search service and merges the results.
pub struct WebSearcher {
    search: Arc<dyn SearchClient>,
    results_per_query: usize,
}

impl WebSearcher {
    pub fn new(search: Arc<dyn SearchClient>) -> Self {
        Self {
            search,
            results_per_query: RESULTS_PER_QUERY,
        }
    }

    fn failed(error: StageError) -> StateUpdate {
        StateUpdate {
            retrieved_docs: Some(Vec::new()),
            messages: vec![error.audit()],
            ..Default::default()
        }
        .with_error(error)
    }
}

/// Documents deduplicated by URL. A URL keeps the position where it was
/// first seen and the snippet from the last hit that carried it.
#[derive(Default)]
struct DocumentSet {
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
}

impl DocumentSet {
    fn insert(&mut self, hit: SearchHit) {
        let url = hit.url.trim().to_string();
        if url.is_empty() {
            debug!("Dropping search hit without a URL");
            return;
        }

        let document = Document {
            url: url.clone(),
            snippet: hit.snippet,
        };
        match self.positions.get(&url) {
            Some(&index) => self.documents[index] = document,
            None => {
                self.positions.insert(url, self.documents.len());
                self.documents.push(document);
            }
        }
    }

    fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

#[async_trait]
impl ResearchStage for WebSearcher {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::WebSearch
    }

    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let queries = &state.search_queries;
        if queries.is_empty() {
            warn!("No search queries to run");
            return Self::failed(StageError::NoQueries);
        }

        if let Err(e) = self.search.ensure_ready().await {
            warn!("Search service unavailable: {}", e);
            return Self::failed(StageError::SearchServiceFailure(e.to_string()));
        }

        let mut documents = DocumentSet::default();
        let mut messages = Vec::new();
        let mut hits_seen = 0;

        for query in queries {
            match self.search.search(query, self.results_per_query).await {
                Ok(hits) => {
                    debug!("Query '{}' returned {} results", query, hits.len());
                    hits_seen += hits.len();
                    for hit in hits {
                        documents.insert(hit);
                    }
                }
                Err(e) => {
                    warn!("Search failed for query '{}': {}", query, e);
                    messages.push(
                        StageError::QuerySearchFailed {
                            query: query.clone(),
                            cause: e.to_string(),
                        }
                        .audit(),
                    );
                }
            }
        }

        let documents = documents.into_documents();
        info!(
            "Retrieved {} unique documents ({} hits) from {} queries",
            documents.len(),
            hits_seen,
            queries.len()
        );
        messages.push(ChatMessage::assistant(format!(
            "Retrieved {} unique documents from {} search queries.",
            documents.len(),
            queries.len()
        )));

        StateUpdate {
            retrieved_docs: Some(documents),
            messages,
            ..Default::default()
        }
        .clear_error()
    }
}
