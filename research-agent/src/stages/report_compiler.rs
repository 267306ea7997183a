use crate::pipeline::PipelinePhase;
use crate::traits::ResearchStage;
use crate::types::{ChatMessage, LlmClient, ResearchState, StageError, StateUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// Synthesizes the per-document summaries into the final markdown report.
pub struct ReportCompiler {
    llm: Arc<dyn LlmClient>,
}

impl ReportCompiler {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, summaries: &[String]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(
                "You are a research analyst who writes clear, well-structured reports in markdown.",
            ),
            ChatMessage::user(format!(
                "Write a research report on the topic \"{}\" using the source summaries below.\n\n\
                 Structure the report with:\n\
                 1. An introduction that frames the topic.\n\
                 2. A body that synthesizes the key findings, grouped by theme, noting agreements \
                 and disagreements between sources.\n\
                 3. A conclusion that sums up what is known and what remains open.\n\n\
                 Use markdown headings, paragraphs and bullet points where they help.\n\n\
                 Summaries:\n\n{}",
                topic,
                summaries.join(SUMMARY_SEPARATOR)
            )),
        ]
    }

    fn failed(error: StageError) -> StateUpdate {
        StateUpdate {
            final_report: Some(String::new()),
            messages: vec![error.audit()],
            ..Default::default()
        }
        .with_error(error)
    }
}

#[async_trait]
impl ResearchStage for ReportCompiler {
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::ReportCompilation
    }

    async fn run(&self, state: &ResearchState) -> StateUpdate {
        if state.summaries.is_empty() {
            warn!("No summaries available, skipping report compilation");
            return Self::failed(StageError::NoSummaries);
        }

        let report = match self.llm.complete(&Self::prompt(&state.topic, &state.summaries)).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("Report compilation failed: {}", e);
                return Self::failed(StageError::ReportCompilationFailure(e.to_string()));
            }
        };

        if report.trim().is_empty() {
            warn!("LLM returned an empty report");
            return Self::failed(StageError::ReportCompilationFailure(
                "the model returned an empty report".to_string(),
            ));
        }

        info!(
            "Compiled report ({} characters) from {} summaries",
            report.len(),
            state.summaries.len()
        );
        let audit = format!(
            "Compiled the final report from {} summaries.",
            state.summaries.len()
        );

        StateUpdate {
            final_report: Some(report),
            messages: vec![ChatMessage::assistant(audit)],
            ..Default::default()
        }
        .clear_error()
    }
}
