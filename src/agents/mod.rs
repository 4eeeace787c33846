pub mod agent_loop;
pub mod coordinator;
pub mod crawler;
pub mod fuzzer;
pub mod prompts;
pub mod structured;
pub mod summarizer;
pub mod threat_model;

use tracing::warn;

use crate::config::FlaghuntConfig;
use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::models::Challenge;
use crate::pipeline::{WorkflowEngine, WorkflowLimits, WorkflowState};

pub use agent_loop::{AgentLoop, AgentOutcome, Solver, StopReason};
pub use coordinator::CoordinateExecutor;
pub use crawler::CrawlExecutor;
pub use fuzzer::FuzzExecutor;
pub use summarizer::SummarizeExecutor;
pub use threat_model::ThreatModelExecutor;

/// Engine with the five stage executors registered and limits from config.
pub fn standard_engine(config: &FlaghuntConfig) -> WorkflowEngine {
    WorkflowEngine::new(WorkflowLimits::from_config(config), config.workflow.max_steps)
        .with_executor(Box::new(CrawlExecutor))
        .with_executor(Box::new(SummarizeExecutor))
        .with_executor(Box::new(ThreatModelExecutor))
        .with_executor(Box::new(FuzzExecutor))
        .with_executor(Box::new(CoordinateExecutor))
}

/// Workflow mode. Drives `challenge` to a terminal status and returns the
/// final state. The run context is released on every path.
pub async fn run_workflow(challenge: Challenge, ctx: &RunContext) -> Result<WorkflowState, FlaghuntError> {
    if let Err(e) = ctx.log().initialize(&challenge.id).await {
        warn!(error = %e, "Run log unavailable");
    }
    let engine = standard_engine(ctx.config());
    let mut state = WorkflowState::new(challenge);
    let result = engine.run(&mut state, ctx).await;
    ctx.close().await;
    result.map(|()| state)
}
