use crate::pipeline::PipelinePhase;
use crate::traits::ResearchStage;
use crate::types::{ChatMessage, LlmClient, ResearchState, StageError, StateUpdate, MAX_QUERIES};
use crate::utils::text::parse_list_items;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns the research topic into a handful of web search queries.
pub struct QueryGenerator {
    llm: Arc<dyn LlmClient>,
    max_queries: usize,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_queries: MAX_QUERIES,
        }
    }

    fn prompt(topic: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "You are a research assistant who writes precise, varied web search queries.",
            ),
            ChatMessage::user(format!(
                "Generate 3 to 5 distinct web search queries for researching the topic: \"{}\".\n\
                 Cover different angles of the topic. Return the queries as a numbered list, \
                 one query per line, with no extra commentary.",
                topic
            )),
        ]
    }

    fn failed(error: StageError) -> StateUpdate {
        StateUpdate {
            search_queries: Some(Vec::new()),
            messages: vec![error.audit()],
            ..Default::default()
        }
        .with_error(error)
    }
}

#[async_trait]
impl ResearchStage for QueryGenerator {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::QueryGeneration
    }

    async fn run(&self, state: &ResearchState) -> StateUpdate {
        let topic = state.topic.trim();
        if topic.is_empty() {
            warn!("Refusing to generate queries for an empty topic");
            return Self::failed(StageError::InvalidInput);
        }

        let response = match self.llm.complete(&Self::prompt(topic)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Query generation failed for '{}': {}", topic, e);
                return Self::failed(StageError::LlmFailure(e.to_string()));
            }
        };

        let mut queries = parse_list_items(&response.content);
        queries.truncate(self.max_queries);
        debug!("Parsed queries: {:?}", queries);

        if queries.is_empty() {
            warn!("LLM response for '{}' contained no usable queries", topic);
            return Self::failed(StageError::LlmFailure(
                "the model response contained no search queries".to_string(),
            ));
        }

        info!("Generated {} search queries for '{}'", queries.len(), topic);
        let summary = format!(
            "Generated {} search queries for \"{}\": {}",
            queries.len(),
            topic,
            queries.join("; ")
        );

        StateUpdate {
            search_queries: Some(queries),
            messages: vec![ChatMessage::assistant(summary)],
            ..Default::default()
        }
        .clear_error()
    }
}
