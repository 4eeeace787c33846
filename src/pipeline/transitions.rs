//! Stage graph. Each stage owns one transition function evaluated after its
//! executor returns.

use crate::config::FlaghuntConfig;
use super::state::{Outcome, Stage, StageName, WorkflowState};

/// Counters the transition functions compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowLimits {
    pub max_pages: usize,
    pub max_attempts: usize,
    pub page_floor: usize,
    pub vulnerability_floor: usize,
    pub max_stage_iterations: u32,
}

impl WorkflowLimits {
    pub fn from_config(config: &FlaghuntConfig) -> Self {
        Self {
            max_pages: config.crawler.max_pages,
            max_attempts: config.fuzzer.max_attempts,
            page_floor: config.workflow.page_floor,
            vulnerability_floor: config.workflow.vulnerability_floor,
            max_stage_iterations: config.workflow.max_stage_iterations,
        }
    }
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self::from_config(&FlaghuntConfig::default())
    }
}

pub type TransitionFn = fn(&WorkflowState, &WorkflowLimits) -> Stage;

pub struct StageDefinition {
    pub name: StageName,
    pub display_name: &'static str,
    pub transition: TransitionFn,
}

pub static STAGES: &[StageDefinition] = &[
    StageDefinition { name: StageName::Crawl, display_name: "Crawling", transition: after_crawl },
    StageDefinition { name: StageName::Summarize, display_name: "Source Analysis", transition: after_summarize },
    StageDefinition { name: StageName::ThreatModel, display_name: "Threat Modeling", transition: after_threat_model },
    StageDefinition { name: StageName::Fuzz, display_name: "Fuzzing", transition: after_fuzz },
    StageDefinition { name: StageName::Coordinate, display_name: "Coordination", transition: after_coordinate },
];

pub fn definition(name: StageName) -> Option<&'static StageDefinition> {
    STAGES.iter().find(|d| d.name == name)
}

pub fn display_name(name: StageName) -> &'static str {
    definition(name).map(|d| d.display_name).unwrap_or("Unknown")
}

/// Next stage after `name` ran. A recorded flag ends the run regardless of
/// which stage found it.
pub fn next_stage(name: StageName, state: &WorkflowState, limits: &WorkflowLimits) -> Stage {
    if state.has_flag() {
        return Stage::End(Outcome::Completed);
    }
    match definition(name) {
        Some(def) => (def.transition)(state, limits),
        None => Stage::End(Outcome::Failed),
    }
}

fn after_crawl(state: &WorkflowState, limits: &WorkflowLimits) -> Stage {
    if state.crawled_pages.len() < limits.max_pages && state.progress(StageName::Crawl) < 1.0 {
        Stage::Run(StageName::Crawl)
    } else {
        Stage::Run(StageName::Summarize)
    }
}

fn after_summarize(_state: &WorkflowState, _limits: &WorkflowLimits) -> Stage {
    Stage::Run(StageName::ThreatModel)
}

fn after_threat_model(state: &WorkflowState, limits: &WorkflowLimits) -> Stage {
    let unfinished = state.vulnerabilities.is_empty() || state.progress(StageName::ThreatModel) < 1.0;
    if unfinished && state.stage_streak < limits.max_stage_iterations {
        Stage::Run(StageName::ThreatModel)
    } else {
        Stage::Run(StageName::Fuzz)
    }
}

fn after_fuzz(state: &WorkflowState, limits: &WorkflowLimits) -> Stage {
    if state.attempts.len() < limits.max_attempts && !state.queue.is_empty() {
        Stage::Run(StageName::Fuzz)
    } else if state.queue.is_empty() {
        Stage::Run(StageName::Coordinate)
    } else {
        Stage::End(Outcome::Failed)
    }
}

fn after_coordinate(state: &WorkflowState, limits: &WorkflowLimits) -> Stage {
    if state.coordinator_stalled {
        Stage::End(Outcome::Failed)
    } else if state.crawled_pages.len() < limits.page_floor {
        Stage::Run(StageName::Crawl)
    } else if state.vulnerabilities.len() < limits.vulnerability_floor {
        Stage::Run(StageName::ThreatModel)
    } else if !state.vulnerabilities.is_empty() && state.queue.is_empty() {
        Stage::Run(StageName::Fuzz)
    } else {
        Stage::End(Outcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Challenge, CrawledPage, ExploitAttempt, FuzzTask, Vulnerability};

    fn state() -> WorkflowState {
        WorkflowState::new(Challenge::new("http://t/", ""))
    }

    fn pages(n: usize) -> Vec<CrawledPage> {
        (0..n).map(|i| CrawledPage::new(&format!("http://t/{}", i), 200)).collect()
    }

    fn vulns(n: usize) -> Vec<Vulnerability> {
        (0..n).map(|i| Vulnerability::new("sql_injection", &format!("http://t/{}", i), 0.5)).collect()
    }

    fn task() -> FuzzTask {
        FuzzTask {
            vulnerability_type: "xss".into(),
            location: "http://t/".into(),
            attack_vector: "reflected".into(),
            payload: "<b>".into(),
            confidence: 0.5,
            method: "GET".into(),
            parameters: Default::default(),
        }
    }

    #[test]
    fn test_crawl_stays_until_progress_or_ceiling() {
        let limits = WorkflowLimits::default();
        let mut s = state();
        s.stage_mut(StageName::Crawl).set_progress(0.5);
        assert_eq!(next_stage(StageName::Crawl, &s, &limits), Stage::Run(StageName::Crawl));
        s.stage_mut(StageName::Crawl).set_progress(1.0);
        assert_eq!(next_stage(StageName::Crawl, &s, &limits), Stage::Run(StageName::Summarize));
        s.stage_mut(StageName::Crawl).set_progress(0.2);
        s.crawled_pages = pages(limits.max_pages);
        assert_eq!(next_stage(StageName::Crawl, &s, &limits), Stage::Run(StageName::Summarize));
    }

    #[test]
    fn test_summarize_always_threat_model() {
        assert_eq!(
            next_stage(StageName::Summarize, &state(), &WorkflowLimits::default()),
            Stage::Run(StageName::ThreatModel)
        );
    }

    #[test]
    fn test_threat_model_loop_is_bounded() {
        let limits = WorkflowLimits::default();
        let mut s = state();
        s.stage_mut(StageName::ThreatModel).set_progress(1.0);
        s.stage_streak = 1;
        assert_eq!(next_stage(StageName::ThreatModel, &s, &limits), Stage::Run(StageName::ThreatModel));
        s.stage_streak = limits.max_stage_iterations;
        assert_eq!(next_stage(StageName::ThreatModel, &s, &limits), Stage::Run(StageName::Fuzz));
        s.stage_streak = 1;
        s.vulnerabilities = vulns(1);
        assert_eq!(next_stage(StageName::ThreatModel, &s, &limits), Stage::Run(StageName::Fuzz));
    }

    #[test]
    fn test_fuzz_transitions() {
        let limits = WorkflowLimits { max_attempts: 2, ..Default::default() };
        let mut s = state();
        s.queue.extend(vec![task()]);
        assert_eq!(next_stage(StageName::Fuzz, &s, &limits), Stage::Run(StageName::Fuzz));

        s.attempts = vec![ExploitAttempt::pending(task()), ExploitAttempt::pending(task())];
        assert_eq!(next_stage(StageName::Fuzz, &s, &limits), Stage::End(Outcome::Failed));

        let mut s = state();
        assert_eq!(next_stage(StageName::Fuzz, &s, &limits), Stage::Run(StageName::Coordinate));
        s.queue.extend(vec![task()]);
        s.record_flag("flag{done}");
        assert_eq!(next_stage(StageName::Fuzz, &s, &limits), Stage::End(Outcome::Completed));
    }

    #[test]
    fn test_coordinator_routing() {
        let limits = WorkflowLimits::default();
        let mut s = state();
        assert_eq!(next_stage(StageName::Coordinate, &s, &limits), Stage::Run(StageName::Crawl));

        s.crawled_pages = pages(limits.page_floor);
        assert_eq!(next_stage(StageName::Coordinate, &s, &limits), Stage::Run(StageName::ThreatModel));

        s.vulnerabilities = vulns(limits.vulnerability_floor);
        assert_eq!(next_stage(StageName::Coordinate, &s, &limits), Stage::Run(StageName::Fuzz));

        s.queue.extend(vec![task()]);
        assert_eq!(next_stage(StageName::Coordinate, &s, &limits), Stage::End(Outcome::Failed));
    }

    #[test]
    fn test_coordinator_stall_ends_run() {
        let limits = WorkflowLimits::default();
        let mut s = state();
        s.coordinator_stalled = true;
        assert_eq!(next_stage(StageName::Coordinate, &s, &limits), Stage::End(Outcome::Failed));
    }

    #[test]
    fn test_flag_overrides_every_predicate() {
        let limits = WorkflowLimits::default();
        let mut s = state();
        s.record_flag("flag{early}");
        for def in STAGES {
            assert_eq!(next_stage(def.name, &s, &limits), Stage::End(Outcome::Completed));
        }
    }
}
