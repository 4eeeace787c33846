use crate::models::ExploitStatus;
use super::state::{Stage, StageName, WorkflowStatus};

/// Messages sent from the workflow to its observer for real-time display.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// Run started
    RunStarted {
        challenge_id: String,
        url: String,
    },
    /// A stage executor is about to run
    StageStarted {
        stage: StageName,
        iteration: u32,
    },
    /// A stage executor returned
    StageCompleted {
        stage: StageName,
        progress: f64,
    },
    /// A stage executor recorded a stage-local error
    StageFailed {
        stage: StageName,
        error: String,
    },
    /// The driver moved between stages
    Transition {
        from: StageName,
        to: Stage,
    },
    /// A tool was invoked by an agent loop
    ToolInvoked {
        name: String,
    },
    /// One exploitation task was dispatched
    ExploitAttempted {
        task: String,
        status: ExploitStatus,
        indicator_hit: bool,
    },
    /// A flag was extracted
    FlagFound {
        flag: String,
    },
    /// Free-form progress line
    Message {
        text: String,
    },
    /// The driver reached a terminal stage
    RunFinished {
        status: WorkflowStatus,
        flags: Vec<String>,
    },
}

impl std::fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunStarted { challenge_id, url } => write!(f, "Run {} started against {}", challenge_id, url),
            Self::StageStarted { stage, iteration } => write!(f, "Stage {} started (iteration {})", stage, iteration),
            Self::StageCompleted { stage, progress } => {
                write!(f, "Stage {} finished, progress {:.0}%", stage, progress * 100.0)
            }
            Self::StageFailed { stage, error } => write!(f, "Stage {} error: {}", stage, error),
            Self::Transition { from, to } => write!(f, "Transition {} -> {}", from, to),
            Self::ToolInvoked { name } => write!(f, "Tool {}", name),
            Self::ExploitAttempted { task, status, indicator_hit } => {
                write!(f, "Exploit {} -> {:?}", task, status)?;
                if *indicator_hit {
                    f.write_str(" (indicator)")?;
                }
                Ok(())
            }
            Self::FlagFound { flag } => write!(f, "FLAG FOUND: {}", flag),
            Self::Message { text } => f.write_str(text),
            Self::RunFinished { status, flags } => {
                write!(f, "Run finished: {}", status)?;
                if !flags.is_empty() {
                    write!(f, " flags=[{}]", flags.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::Outcome;

    #[test]
    fn test_display_lines() {
        let e = WorkflowEvent::Transition { from: StageName::Fuzz, to: Stage::End(Outcome::Completed) };
        assert_eq!(e.to_string(), "Transition fuzz -> end(completed)");
        let e = WorkflowEvent::StageCompleted { stage: StageName::Crawl, progress: 0.5 };
        assert_eq!(e.to_string(), "Stage crawl finished, progress 50%");
        let e = WorkflowEvent::RunFinished { status: WorkflowStatus::Completed, flags: vec!["flag{a}".into()] };
        assert_eq!(e.to_string(), "Run finished: completed flags=[flag{a}]");
    }
}
