use crate::pipeline::{ProgressEvent, ResearchPipeline};
use crate::types::{ResearchState, Result};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

fn log_progress(event: ProgressEvent) {
    if event.is_done() {
        info!("[{}] {}", event.run_id, event.status);
    } else {
        info!("[{}] {}: {}", event.run_id, event.stage, event.status);
    }
}

async fn finish(state: &ResearchState, output: &Path) -> Result<()> {
    if state.has_error() {
        warn!("Research finished with an error: {}", state.error_message);
    }

    let report = &state.final_report;
    if report.is_empty() {
        warn!("No report was produced; writing an empty file");
    }

    tokio::fs::write(output, report).await?;
    info!("Report written to {}", output.display());
    Ok(())
}

/// Research `topic` and write the final report to `output`.
pub async fn run_agent(
    pipeline: &ResearchPipeline,
    run_id: Uuid,
    topic: &str,
    output: &Path,
) -> Result<ResearchState> {
    info!("Run id: {} (pass it to --resume to continue this run)", run_id);
    let state = pipeline.run_with_id(run_id, topic, log_progress).await;
    finish(&state, output).await?;
    Ok(state)
}

/// Continue a checkpointed run and write its report to `output`.
pub async fn resume_agent(
    pipeline: &ResearchPipeline,
    run_id: Uuid,
    output: &Path,
) -> Result<ResearchState> {
    let state = pipeline.resume(run_id, log_progress).await?;
    finish(&state, output).await?;
    Ok(state)
}
