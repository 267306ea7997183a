use crate::stages::{
    ContentScraper, ContentSummarizer, QueryGenerator, ReportCompiler, WebSearcher,
};
use crate::state::{Checkpoint, CheckpointStore};
use crate::traits::ResearchStage;
use crate::types::{
    FetchConfig, LlmClient, PageFetcher, ResearchError, ResearchState, Result, SearchClient,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Position of a run in the fixed stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    QueryGeneration,
    WebSearch,
    Scraping,
    Summarization,
    ReportCompilation,
    Done,
}

impl PipelinePhase {
    pub const STAGES: [PipelinePhase; 5] = [
        PipelinePhase::QueryGeneration,
        PipelinePhase::WebSearch,
        PipelinePhase::Scraping,
        PipelinePhase::Summarization,
        PipelinePhase::ReportCompilation,
    ];

    /// The phase that follows this one. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            PipelinePhase::QueryGeneration => PipelinePhase::WebSearch,
            PipelinePhase::WebSearch => PipelinePhase::Scraping,
            PipelinePhase::Scraping => PipelinePhase::Summarization,
            PipelinePhase::Summarization => PipelinePhase::ReportCompilation,
            PipelinePhase::ReportCompilation | PipelinePhase::Done => PipelinePhase::Done,
        }
    }

    /// Stable identifier used in progress events and checkpoint rows.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelinePhase::QueryGeneration => "query_generator",
            PipelinePhase::WebSearch => "web_searcher",
            PipelinePhase::Scraping => "content_scraper",
            PipelinePhase::Summarization => "content_summarizer",
            PipelinePhase::ReportCompilation => "report_compiler",
            PipelinePhase::Done => "done",
        }
    }

    pub fn status_text(self) -> &'static str {
        match self {
            PipelinePhase::QueryGeneration => "Generated search queries",
            PipelinePhase::WebSearch => "Searched the web",
            PipelinePhase::Scraping => "Scraped document content",
            PipelinePhase::Summarization => "Summarized content",
            PipelinePhase::ReportCompilation => "Compiled final report",
            PipelinePhase::Done => "Research complete",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted after every completed stage and once more when the run is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub stage: PipelinePhase,
    pub status: String,
    pub state: ResearchState,
}

impl ProgressEvent {
    fn new(run_id: Uuid, stage: PipelinePhase, state: &ResearchState) -> Self {
        Self {
            run_id,
            stage,
            status: stage.status_text().to_string(),
            state: state.clone(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == PipelinePhase::Done
    }
}

/// Drives a research run through the five stages in order.
///
/// Stages never abort the run: each one records its own failures in the
/// state and the driver always moves on to the next phase.
pub struct ResearchPipeline {
    query_generator: QueryGenerator,
    web_searcher: WebSearcher,
    content_scraper: ContentScraper,
    content_summarizer: ContentSummarizer,
    report_compiler: ReportCompiler,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        PipelineBuilder::new(llm, search, fetcher).build()
    }

    pub fn builder(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> PipelineBuilder {
        PipelineBuilder::new(llm, search, fetcher)
    }

    fn stage(&self, phase: PipelinePhase) -> Option<&dyn ResearchStage> {
        match phase {
            PipelinePhase::QueryGeneration => Some(&self.query_generator),
            PipelinePhase::WebSearch => Some(&self.web_searcher),
            PipelinePhase::Scraping => Some(&self.content_scraper),
            PipelinePhase::Summarization => Some(&self.content_summarizer),
            PipelinePhase::ReportCompilation => Some(&self.report_compiler),
            PipelinePhase::Done => None,
        }
    }

    /// Run a fresh research run for `topic` and return the final state.
    pub async fn run<F>(&self, topic: &str, on_progress: F) -> ResearchState
    where
        F: FnMut(ProgressEvent) + Send,
    {
        self.run_with_id(Uuid::new_v4(), topic, on_progress).await
    }

    /// Like [`run`](Self::run), but checkpoints are stored under `run_id`.
    pub async fn run_with_id<F>(
        &self,
        run_id: Uuid,
        topic: &str,
        mut on_progress: F,
    ) -> ResearchState
    where
        F: FnMut(ProgressEvent) + Send,
    {
        info!("Starting research run {} on topic: {}", run_id, topic);
        let state = ResearchState::new(topic);
        self.drive(run_id, PipelinePhase::QueryGeneration, state, |event| {
            on_progress(event);
            ControlFlow::Continue(())
        })
        .await
    }

    /// Run in a background task and stream the progress events.
    ///
    /// Dropping the stream stops the run after the stage in flight.
    pub fn stream(self: Arc<Self>, topic: String) -> UnboundedReceiverStream<ProgressEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let run_id = Uuid::new_v4();
            info!("Starting research run {} on topic: {}", run_id, topic);
            let state = ResearchState::new(&topic);
            self.drive(run_id, PipelinePhase::QueryGeneration, state, |event| {
                match sender.send(event) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                }
            })
            .await;
        });

        UnboundedReceiverStream::new(receiver)
    }

    /// Continue a checkpointed run from the phase after its last completed stage.
    pub async fn resume<F>(&self, run_id: Uuid, mut on_progress: F) -> Result<ResearchState>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let store = self.checkpoints.as_ref().ok_or_else(|| {
            ResearchError::MissingConfig("resuming a run requires a checkpoint store".to_string())
        })?;

        let checkpoint = store
            .load(run_id)
            .await?
            .ok_or(ResearchError::CheckpointNotFound { run_id })?;

        let start = checkpoint.resume_phase();
        info!(
            "Resuming run {} after {} (next: {})",
            run_id, checkpoint.completed, start
        );

        let state = self
            .drive(run_id, start, checkpoint.state, |event| {
                on_progress(event);
                ControlFlow::Continue(())
            })
            .await;
        Ok(state)
    }

    async fn drive<F>(
        &self,
        run_id: Uuid,
        start: PipelinePhase,
        mut state: ResearchState,
        mut on_progress: F,
    ) -> ResearchState
    where
        F: FnMut(ProgressEvent) -> ControlFlow<()> + Send,
    {
        let mut phase = start;

        while let Some(stage) = self.stage(phase) {
            debug_assert_eq!(stage.phase(), phase);
            debug!("Running stage {}", stage.phase());
            let update = stage.run(&state).await;
            state = state.apply(update);

            if state.has_error() {
                warn!("Stage {} reported: {}", phase, state.error_message);
            } else {
                info!("Stage {} finished", phase);
            }

            self.checkpoint(run_id, phase, &state).await;
            if on_progress(ProgressEvent::new(run_id, phase, &state)).is_break() {
                info!("Progress listener gone, stopping run {} after {}", run_id, phase);
                return state;
            }
            phase = phase.next();
        }

        info!("Research run {} complete", run_id);
        let _ = on_progress(ProgressEvent::new(run_id, PipelinePhase::Done, &state));
        state
    }

    async fn checkpoint(&self, run_id: Uuid, completed: PipelinePhase, state: &ResearchState) {
        let Some(store) = &self.checkpoints else {
            return;
        };

        let checkpoint = Checkpoint::new(run_id, completed, state.clone());
        if let Err(e) = store.save(&checkpoint).await {
            warn!(
                "Failed to save checkpoint for run {} after {}: {}",
                run_id, completed, e
            );
        }
    }
}

/// Assembles a pipeline from its service handles.
pub struct PipelineBuilder {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    fetcher: Arc<dyn PageFetcher>,
    fetch_config: FetchConfig,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl PipelineBuilder {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
            fetch_config: FetchConfig::default(),
            checkpoints: None,
        }
    }

    pub fn fetch_config(mut self, config: FetchConfig) -> Self {
        self.fetch_config = config;
        self
    }

    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn build(self) -> ResearchPipeline {
        ResearchPipeline {
            query_generator: QueryGenerator::new(self.llm.clone()),
            web_searcher: WebSearcher::new(self.search),
            content_scraper: ContentScraper::new(self.fetcher, &self.fetch_config),
            content_summarizer: ContentSummarizer::new(self.llm.clone()),
            report_compiler: ReportCompiler::new(self.llm),
            checkpoints: self.checkpoints,
        }
    }
}
