use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Challenge, CrawledPage, ExploitAttempt, Vulnerability};
use crate::queue::ExploitationQueue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initializing,
    Crawling,
    Analyzing,
    Modeling,
    Fuzzing,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Crawling => "crawling",
            Self::Analyzing => "analyzing",
            Self::Modeling => "modeling",
            Self::Fuzzing => "fuzzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    Crawl,
    Summarize,
    ThreatModel,
    Fuzz,
    Coordinate,
}

impl StageName {
    pub const ALL: [StageName; 5] = [
        StageName::Crawl,
        StageName::Summarize,
        StageName::ThreatModel,
        StageName::Fuzz,
        StageName::Coordinate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Summarize => "summarize",
            Self::ThreatModel => "threat-model",
            Self::Fuzz => "fuzz",
            Self::Coordinate => "coordinate",
        }
    }

    /// Overall status while this stage runs. The coordinator leaves it unchanged.
    pub fn status(&self) -> Option<WorkflowStatus> {
        match self {
            Self::Crawl => Some(WorkflowStatus::Crawling),
            Self::Summarize => Some(WorkflowStatus::Analyzing),
            Self::ThreatModel => Some(WorkflowStatus::Modeling),
            Self::Fuzz => Some(WorkflowStatus::Fuzzing),
            Self::Coordinate => None,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed,
}

/// Position of the workflow driver. `End` is absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Run(StageName),
    End(Outcome),
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(name) => write!(f, "{}", name),
            Self::End(Outcome::Completed) => f.write_str("end(completed)"),
            Self::End(Outcome::Failed) => f.write_str("end(failed)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Per-stage bookkeeping, written only by that stage's executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStageState {
    pub status: AgentStatus,
    pub progress: f64,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub iterations: u32,
}

impl AgentStageState {
    pub fn log(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.status = AgentStatus::Failed;
    }

    pub fn set_progress(&mut self, progress: f64) {
        self.progress = progress.clamp(0.0, 1.0);
    }
}

/// URL waiting to be crawled and its link distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

/// The record threaded through every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub challenge: Challenge,
    pub status: WorkflowStatus,
    pub current_stage: Option<StageName>,
    pub completed_stages: Vec<StageName>,
    pub stages: BTreeMap<StageName, AgentStageState>,
    /// Consecutive visits of `current_stage`, maintained by the engine.
    pub stage_streak: u32,
    pub steps: u32,

    pub crawl_plan: Option<serde_json::Value>,
    pub frontier: VecDeque<FrontierEntry>,
    pub visited: BTreeSet<String>,
    pub crawled_pages: Vec<CrawledPage>,
    pub technologies: Vec<String>,
    pub endpoints: Vec<String>,

    pub source_analysis: Option<String>,
    pub threat_model: Option<String>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub exploitation_plan: Option<serde_json::Value>,

    pub queue: ExploitationQueue,
    pub attempts: Vec<ExploitAttempt>,
    pub attempted_payloads: BTreeSet<String>,
    pub flags_found: Vec<String>,
    /// Counters seen by the coordinator on its last visit.
    pub coordinator_fingerprint: Option<[usize; 4]>,
    /// Set when the coordinator sees no change since its last visit.
    pub coordinator_stalled: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            status: WorkflowStatus::Initializing,
            current_stage: None,
            completed_stages: Vec::new(),
            stages: StageName::ALL.iter().map(|s| (*s, AgentStageState::default())).collect(),
            stage_streak: 0,
            steps: 0,
            crawl_plan: None,
            frontier: VecDeque::new(),
            visited: BTreeSet::new(),
            crawled_pages: Vec::new(),
            technologies: Vec::new(),
            endpoints: Vec::new(),
            source_analysis: None,
            threat_model: None,
            vulnerabilities: Vec::new(),
            exploitation_plan: None,
            queue: ExploitationQueue::new(),
            attempts: Vec::new(),
            attempted_payloads: BTreeSet::new(),
            flags_found: Vec::new(),
            coordinator_fingerprint: None,
            coordinator_stalled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn stage(&self, name: StageName) -> &AgentStageState {
        // every StageName is inserted in new(); the fallback only covers
        // states deserialized from older snapshots
        static EMPTY: std::sync::LazyLock<AgentStageState> = std::sync::LazyLock::new(AgentStageState::default);
        self.stages.get(&name).unwrap_or(&EMPTY)
    }

    pub fn stage_mut(&mut self, name: StageName) -> &mut AgentStageState {
        self.stages.entry(name).or_default()
    }

    pub fn progress(&self, name: StageName) -> f64 {
        self.stage(name).progress
    }

    pub fn mark_completed(&mut self, name: StageName) {
        let stage = self.stage_mut(name);
        if stage.status != AgentStatus::Failed {
            stage.status = AgentStatus::Completed;
        }
        if !self.completed_stages.contains(&name) {
            self.completed_stages.push(name);
        }
    }

    /// Record a flag (deduplicated). A recorded flag completes the run.
    pub fn record_flag(&mut self, flag: &str) -> bool {
        if self.flags_found.iter().any(|f| f == flag) {
            return false;
        }
        self.flags_found.push(flag.to_string());
        self.status = WorkflowStatus::Completed;
        true
    }

    pub fn has_flag(&self) -> bool {
        !self.flags_found.is_empty()
    }

    /// Enter the terminal state for `outcome`. A found flag always wins.
    pub fn finish(&mut self, outcome: Outcome) {
        self.status = if self.has_flag() || outcome == Outcome::Completed {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        self.current_stage = None;
        self.finished_at = Some(Utc::now());
    }

    /// Counters that only move when some stage made progress.
    pub fn fingerprint(&self) -> [usize; 4] {
        [
            self.crawled_pages.len(),
            self.vulnerabilities.len(),
            self.attempts.len(),
            self.queue.len(),
        ]
    }

    pub fn summary(&self) -> WorkflowSummary {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        WorkflowSummary {
            challenge_id: self.challenge.id.clone(),
            status: self.status,
            current_stage: self.current_stage,
            completed_stages: self.completed_stages.clone(),
            pages_crawled: self.crawled_pages.len(),
            vulnerabilities_found: self.vulnerabilities.len(),
            exploit_attempts: self.attempts.len(),
            flags_found: self.flags_found.clone(),
            success: self.has_flag(),
            elapsed_secs: (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub challenge_id: String,
    pub status: WorkflowStatus,
    pub current_stage: Option<StageName>,
    pub completed_stages: Vec<StageName>,
    pub pages_crawled: usize,
    pub vulnerabilities_found: usize,
    pub exploit_attempts: usize,
    pub flags_found: Vec<String>,
    pub success: bool,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WorkflowState {
        WorkflowState::new(Challenge::new("http://target/", "test"))
    }

    #[test]
    fn test_new_state_has_every_stage() {
        let s = state();
        assert_eq!(s.status, WorkflowStatus::Initializing);
        assert_eq!(s.stages.len(), 5);
        assert_eq!(s.progress(StageName::Crawl), 0.0);
    }

    #[test]
    fn test_record_flag_completes_and_dedups() {
        let mut s = state();
        s.status = WorkflowStatus::Fuzzing;
        assert!(s.record_flag("flag{x}"));
        assert!(!s.record_flag("flag{x}"));
        assert_eq!(s.flags_found.len(), 1);
        assert_eq!(s.status, WorkflowStatus::Completed);
    }

    #[test]
    fn test_finish_failed_with_flag_is_completed() {
        let mut s = state();
        s.record_flag("flag{y}");
        s.finish(Outcome::Failed);
        assert_eq!(s.status, WorkflowStatus::Completed);
        assert!(s.summary().success);
    }

    #[test]
    fn test_mark_completed_once() {
        let mut s = state();
        s.mark_completed(StageName::Summarize);
        s.mark_completed(StageName::Summarize);
        assert_eq!(s.completed_stages, vec![StageName::Summarize]);
        assert_eq!(s.stage(StageName::Summarize).status, AgentStatus::Completed);
    }

    #[test]
    fn test_summary_serializes() {
        let mut s = state();
        s.finish(Outcome::Failed);
        let json = serde_json::to_value(s.summary()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["success"], false);
        assert_eq!(json["pages_crawled"], 0);
    }
}
