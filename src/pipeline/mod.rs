pub mod engine;
pub mod events;
pub mod state;
pub mod transitions;

pub use engine::{StageExecutor, WorkflowEngine};
pub use events::WorkflowEvent;
pub use state::{
    AgentStageState, AgentStatus, FrontierEntry, Outcome, Stage, StageName, WorkflowState, WorkflowStatus,
    WorkflowSummary,
};
pub use transitions::{display_name, next_stage, WorkflowLimits, STAGES};
