use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use super::events::WorkflowEvent;
use super::state::{AgentStatus, Outcome, Stage, StageName, WorkflowState};
use super::transitions::{display_name, next_stage, WorkflowLimits};

/// One stage's handler. An executor writes only its own stage bookkeeping
/// plus the shared collections it produces.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn stage(&self) -> StageName;

    async fn execute(&self, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError>;
}

/// Explicit finite-state driver: run the current stage, apply its transition
/// function, repeat until an `End` stage.
pub struct WorkflowEngine {
    executors: HashMap<StageName, Box<dyn StageExecutor>>,
    limits: WorkflowLimits,
    max_steps: u32,
}

impl WorkflowEngine {
    pub fn new(limits: WorkflowLimits, max_steps: u32) -> Self {
        Self { executors: HashMap::new(), limits, max_steps }
    }

    pub fn with_executor(mut self, executor: Box<dyn StageExecutor>) -> Self {
        self.executors.insert(executor.stage(), executor);
        self
    }

    pub fn limits(&self) -> &WorkflowLimits {
        &self.limits
    }

    /// Drive `state` to a terminal status. Stage-local errors are recorded in
    /// the stage's error log; fatal errors end the run and are returned.
    pub async fn run(&self, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
        info!(challenge = %state.challenge.id, url = %state.challenge.url, "Workflow started");
        ctx.emit(WorkflowEvent::RunStarted {
            challenge_id: state.challenge.id.clone(),
            url: state.challenge.url.clone(),
        })
        .await;

        let mut stage = Stage::Run(StageName::Crawl);
        let outcome = loop {
            let name = match stage {
                Stage::Run(name) => name,
                Stage::End(outcome) => break outcome,
            };
            if state.steps >= self.max_steps {
                warn!(max_steps = self.max_steps, "Step limit reached");
                ctx.emit(WorkflowEvent::Message {
                    text: format!("Step limit of {} reached", self.max_steps),
                })
                .await;
                break Outcome::Failed;
            }

            if let Err(e) = self.step(name, state, ctx).await {
                error!(stage = %name, error = %e, "Fatal error, aborting workflow");
                state.finish(Outcome::Failed);
                self.announce_finish(state, ctx).await;
                return Err(e);
            }

            let next = next_stage(name, state, &self.limits);
            if next != Stage::Run(name) {
                state.mark_completed(name);
            }
            info!(from = %name, to = %next, "Stage transition");
            ctx.emit(WorkflowEvent::Transition { from: name, to: next }).await;
            stage = next;
        };

        state.finish(outcome);
        self.announce_finish(state, ctx).await;
        Ok(())
    }

    async fn step(&self, name: StageName, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
        let executor = self
            .executors
            .get(&name)
            .ok_or_else(|| FlaghuntError::Internal(format!("no executor registered for stage {}", name)))?;

        state.steps += 1;
        state.stage_streak = if state.current_stage == Some(name) { state.stage_streak + 1 } else { 1 };
        state.current_stage = Some(name);
        if let Some(status) = name.status() {
            if !state.status.is_terminal() {
                state.status = status;
            }
        }
        let iteration = {
            let stage = state.stage_mut(name);
            stage.status = AgentStatus::Running;
            stage.iterations += 1;
            stage.iterations
        };

        info!(stage = %name, display = display_name(name), iteration, "Stage started");
        ctx.emit(WorkflowEvent::StageStarted { stage: name, iteration }).await;

        match executor.execute(state, ctx).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                state.stage_mut(name).fail(e.to_string());
                return Err(e);
            }
            Err(e) => {
                warn!(stage = %name, error = %e, "Stage error, no progress this iteration");
                state.stage_mut(name).fail(e.to_string());
                ctx.emit(WorkflowEvent::StageFailed { stage: name, error: e.to_string() }).await;
            }
        }

        let progress = state.progress(name);
        ctx.emit(WorkflowEvent::StageCompleted { stage: name, progress }).await;
        Ok(())
    }

    async fn announce_finish(&self, state: &WorkflowState, ctx: &RunContext) {
        info!(
            status = %state.status,
            flags = state.flags_found.len(),
            steps = state.steps,
            "Workflow finished"
        );
        ctx.emit(WorkflowEvent::RunFinished {
            status: state.status,
            flags: state.flags_found.clone(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::audit::RunLog;
    use crate::config::FlaghuntConfig;
    use crate::llm::testing::ScriptedProvider;
    use crate::models::{Challenge, CrawledPage};
    use crate::pipeline::state::WorkflowStatus;

    type Action = Box<dyn Fn(&mut WorkflowState) -> Result<(), FlaghuntError> + Send + Sync>;

    struct FakeStage {
        name: StageName,
        runs: Arc<AtomicUsize>,
        action: Action,
    }

    #[async_trait]
    impl StageExecutor for FakeStage {
        fn stage(&self) -> StageName {
            self.name
        }

        async fn execute(&self, state: &mut WorkflowState, _ctx: &RunContext) -> Result<(), FlaghuntError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            (self.action)(state)
        }
    }

    fn fake<F>(name: StageName, runs: &Arc<AtomicUsize>, action: F) -> Box<dyn StageExecutor>
    where
        F: Fn(&mut WorkflowState) -> Result<(), FlaghuntError> + Send + Sync + 'static,
    {
        Box::new(FakeStage { name, runs: runs.clone(), action: Box::new(action) })
    }

    fn context() -> RunContext {
        RunContext::new(FlaghuntConfig::default(), Arc::new(ScriptedProvider::replies(vec![])))
    }

    fn engine(runs: &Arc<AtomicUsize>, fuzz: impl Fn(&mut WorkflowState) -> Result<(), FlaghuntError> + Send + Sync + 'static) -> WorkflowEngine {
        WorkflowEngine::new(WorkflowLimits::default(), 50)
            .with_executor(fake(StageName::Crawl, runs, |s| {
                if s.crawled_pages.is_empty() {
                    s.crawled_pages.push(CrawledPage::new("http://t/", 200));
                }
                s.stage_mut(StageName::Crawl).set_progress(1.0);
                Ok(())
            }))
            .with_executor(fake(StageName::Summarize, runs, |_| Ok(())))
            .with_executor(fake(StageName::ThreatModel, runs, |s| {
                s.stage_mut(StageName::ThreatModel).set_progress(1.0);
                Ok(())
            }))
            .with_executor(fake(StageName::Fuzz, runs, fuzz))
            .with_executor(fake(StageName::Coordinate, runs, |s| {
                let fp = s.fingerprint();
                s.coordinator_stalled = s.coordinator_fingerprint == Some(fp);
                s.coordinator_fingerprint = Some(fp);
                Ok(())
            }))
    }

    #[tokio::test]
    async fn test_flag_in_fuzz_completes_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(&runs, |s| {
            s.record_flag("flag{engine}");
            Ok(())
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = context().with_log(RunLog::disabled().with_channel(tx));
        let mut state = WorkflowState::new(Challenge::new("http://t/", ""));

        engine.run(&mut state, &ctx).await.unwrap();

        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.flags_found, vec!["flag{engine}".to_string()]);
        assert_eq!(
            state.completed_stages,
            vec![StageName::Crawl, StageName::Summarize, StageName::ThreatModel, StageName::Fuzz]
        );
        // threat model found nothing, so it ran until its streak bound
        assert_eq!(state.stage(StageName::ThreatModel).iterations, 3);

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        assert!(matches!(events.first(), Some(WorkflowEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(WorkflowEvent::RunFinished { status: WorkflowStatus::Completed, .. })
        ));
    }

    #[tokio::test]
    async fn test_stalled_coordinator_fails_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(&runs, |_| Ok(()));
        let ctx = context();
        let mut state = WorkflowState::new(Challenge::new("http://t/", ""));
        engine.run(&mut state, &ctx).await.unwrap();
        assert_eq!(state.status, WorkflowStatus::Failed);
        assert!(state.steps < 50);
        assert!(state.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_stage_local_error_is_recorded() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(&runs, |_| Err(FlaghuntError::Network("down".into())));
        let ctx = context();
        let mut state = WorkflowState::new(Challenge::new("http://t/", ""));
        engine.run(&mut state, &ctx).await.unwrap();
        let fuzz = state.stage(StageName::Fuzz);
        assert!(!fuzz.errors.is_empty());
        assert_eq!(fuzz.status, AgentStatus::Failed);
        assert_eq!(state.status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(&runs, |_| Err(FlaghuntError::DriverInit("no browser".into())));
        let ctx = context();
        let mut state = WorkflowState::new(Challenge::new("http://t/", ""));
        let result = engine.run(&mut state, &ctx).await;
        assert!(matches!(result, Err(FlaghuntError::DriverInit(_))));
        assert_eq!(state.status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = WorkflowEngine::new(WorkflowLimits::default(), 4)
            .with_executor(fake(StageName::Crawl, &runs, |s| {
                s.stage_mut(StageName::Crawl).set_progress(0.1);
                Ok(())
            }));
        let ctx = context();
        let mut state = WorkflowState::new(Challenge::new("http://t/", ""));
        engine.run(&mut state, &ctx).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(state.status, WorkflowStatus::Failed);
    }
}
