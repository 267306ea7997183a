use crate::pipeline::PipelinePhase;
use crate::traits::ResearchStage;
use crate::types::{ChatMessage, LlmClient, ResearchState, StageError, StateUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ContentSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl ContentSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, content: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "You are a research assistant who writes concise, factual summaries of source material.",
            ),
            ChatMessage::user(format!(
                "Summarize the following content as it relates to the research topic \"{}\".\n\
                 Focus on the key facts, findings and arguments that matter for the topic, \
                 and leave out anything unrelated. Keep the summary under 200 words.\n\n\
                 Content:\n{}",
                topic, content
            )),
        ]
    }
}

#[async_trait]
impl ResearchStage for ContentSummarizer {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Summarization
    }

    async fn run(&self, state: &ResearchState) -> StateUpdate {
        if state.scraped_data.is_empty() {
            warn!("No scraped content to summarize");
            let error = StageError::NoContent;
            return StateUpdate {
                summaries: Some(Vec::new()),
                messages: vec![error.audit()],
                ..Default::default()
            }
            .with_error(error);
        }

        let mut summaries = Vec::new();
        let mut messages = Vec::new();
        let mut has_errors = false;

        for page in &state.scraped_data {
            if page.content.trim().is_empty() {
                debug!("Skipping {}: empty content", page.url);
                messages.push(ChatMessage::assistant(format!(
                    "Skipping summarization for {}: content is empty.",
                    page.url
                )));
                continue;
            }

            match self.llm.complete(&Self::prompt(&state.topic, &page.content)).await {
                Ok(response) => {
                    let summary = response.content.trim();
                    if summary.is_empty() {
                        has_errors = true;
                        warn!("LLM returned an empty summary for {}", page.url);
                        messages.push(StageError::EmptySummary { url: page.url.clone() }.audit());
                    } else {
                        debug!("Summarized {} ({} characters)", page.url, summary.len());
                        summaries.push(summary.to_string());
                    }
                }
                Err(e) => {
                    has_errors = true;
                    warn!("Error summarizing {}: {}", page.url, e);
                    messages.push(
                        StageError::SummaryFailed {
                            url: page.url.clone(),
                            cause: e.to_string(),
                        }
                        .audit(),
                    );
                }
            }
        }

        if summaries.is_empty() {
            let error = StageError::NoSummariesGenerated { had_errors: has_errors };
            warn!("{}", error);
            messages.push(error.audit());
            return StateUpdate {
                summaries: Some(summaries),
                messages,
                ..Default::default()
            }
            .with_error(error);
        }

        info!(
            "Summarized {} of {} scraped documents",
            summaries.len(),
            state.scraped_data.len()
        );
        messages.push(ChatMessage::assistant(format!(
            "Successfully summarized content from {} document(s).",
            summaries.len()
        )));

        StateUpdate {
            summaries: Some(summaries),
            messages,
            ..Default::default()
        }
        .clear_error()
    }
}
