use crate::pipeline::PipelinePhase;
use crate::types::{ResearchState, StateUpdate};
use async_trait::async_trait;

/// One step of the research pipeline.
///
/// A stage reads the accumulated state and returns a partial update. It
/// never fails: problems are reported through `StateUpdate::error_message`
/// and audit messages so the following stages always get to run.
#[async_trait]
pub trait ResearchStage: Send + Sync {
    /// The pipeline phase this stage implements
    fn phase(&self) -> PipelinePhase;

    async fn run(&self, state: &ResearchState) -> StateUpdate;
}
