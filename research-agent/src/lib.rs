pub mod types;
pub mod utils;
pub mod parser;
pub mod fetcher;
pub mod llm_adapter;
pub mod search;
pub mod traits;
pub mod stages;
pub mod pipeline;
pub mod state;
pub mod runner;

#[cfg(test)]
mod test_support;

pub use types::*;
pub use fetcher::HttpPageFetcher;
pub use parser::ContentExtractor;
pub use llm_adapter::{build_llm_client, GeminiClient, OpenAiClient};
pub use search::TavilyClient;
pub use traits::ResearchStage;
pub use pipeline::{PipelineBuilder, PipelinePhase, ProgressEvent, ResearchPipeline};
pub use state::{Checkpoint, CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
pub use runner::{resume_agent, run_agent};
