use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::pipeline::{StageExecutor, StageName, WorkflowState};

/// Routing checkpoint. Makes no model call; it only records whether any
/// stage moved the run forward since its previous visit.
pub struct CoordinateExecutor;

#[async_trait]
impl StageExecutor for CoordinateExecutor {
    fn stage(&self) -> StageName {
        StageName::Coordinate
    }

    async fn execute(&self, state: &mut WorkflowState, _ctx: &RunContext) -> Result<(), FlaghuntError> {
        let fingerprint = state.fingerprint();
        state.coordinator_stalled = state.coordinator_fingerprint == Some(fingerprint);
        state.coordinator_fingerprint = Some(fingerprint);

        let [pages, vulns, attempts, queued] = fingerprint;
        if state.coordinator_stalled {
            warn!(pages, vulns, attempts, queued, "No progress since the last coordination");
        } else {
            info!(pages, vulns, attempts, queued, "Coordinating");
        }
        let stage = state.stage_mut(StageName::Coordinate);
        stage.log(format!("pages={} vulnerabilities={} attempts={} queued={}", pages, vulns, attempts, queued));
        stage.set_progress(1.0);
        Ok(())
    }
}
