use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::pipeline::{StageExecutor, StageName, WorkflowEvent, WorkflowState};
use crate::queue::{adaptive, ExploitExecutor};

/// 1 − queue / max(max_attempts, queue).
pub fn fuzz_progress(queue_len: usize, max_attempts: usize) -> f64 {
    let denominator = max_attempts.max(queue_len);
    if denominator == 0 {
        return 1.0;
    }
    1.0 - queue_len as f64 / denominator as f64
}

/// Dispatches one queued task per visit.
pub struct FuzzExecutor;

#[async_trait]
impl StageExecutor for FuzzExecutor {
    fn stage(&self) -> StageName {
        StageName::Fuzz
    }

    async fn execute(&self, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
        let fuzzer = &ctx.config().fuzzer;
        if state.attempts.len() >= fuzzer.max_attempts {
            debug!(max_attempts = fuzzer.max_attempts, "Attempt budget spent");
            state.stage_mut(StageName::Fuzz).set_progress(1.0);
            return Ok(());
        }
        let Some(task) = state.queue.pop_next() else {
            state.stage_mut(StageName::Fuzz).set_progress(1.0);
            return Ok(());
        };

        let executor = ExploitExecutor::new(&state.challenge.flag_format)
            .with_timeout(Duration::from_secs(fuzzer.exploit_timeout_secs));
        let http = ctx.http().await?;
        state.attempted_payloads.insert(task.payload.clone());
        let attempt = executor.execute(http.as_ref(), task).await;

        ctx.emit(WorkflowEvent::ExploitAttempted {
            task: attempt.task.label(),
            status: attempt.status,
            indicator_hit: attempt.indicator_hit,
        })
        .await;

        if let Some(flag) = attempt.flag.clone() {
            if state.record_flag(&flag) {
                info!(flag = %flag, "Flag captured");
                ctx.emit(WorkflowEvent::FlagFound { flag: flag.clone() }).await;
            }
        } else {
            let variants = adaptive::expand(&attempt, &mut state.attempted_payloads);
            if !variants.is_empty() {
                debug!(count = variants.len(), "Queued adaptive variants");
                state.queue.extend(variants);
            }
        }

        let stage = state.stage_mut(StageName::Fuzz);
        stage.log(format!("{} -> {:?}", attempt.task.label(), attempt.status));
        if let Some(error) = &attempt.error {
            stage.errors.push(error.clone());
        }
        state.attempts.push(attempt);
        let progress = fuzz_progress(state.queue.len(), fuzzer.max_attempts);
        state.stage_mut(StageName::Fuzz).set_progress(progress);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::FlaghuntConfig;
    use crate::http::testing::ScriptedHttp;
    use crate::http::HttpResponse;
    use crate::llm::testing::ScriptedProvider;
    use crate::models::{Challenge, ExploitStatus, FuzzTask};
    use crate::pipeline::WorkflowStatus;

    fn task(payload: &str, confidence: f64) -> FuzzTask {
        FuzzTask {
            vulnerability_type: "sql_injection".into(),
            location: "http://t/item".into(),
            attack_vector: "param".into(),
            payload: payload.into(),
            confidence,
            method: "GET".into(),
            parameters: [("id".to_string(), "1".to_string())].into_iter().collect(),
        }
    }

    fn context(http: ScriptedHttp) -> RunContext {
        RunContext::new(FlaghuntConfig::default(), Arc::new(ScriptedProvider::replies(vec![])))
            .with_http(Arc::new(http))
    }

    #[test]
    fn test_fuzz_progress() {
        assert_eq!(fuzz_progress(0, 100), 1.0);
        assert_eq!(fuzz_progress(50, 100), 0.5);
        assert_eq!(fuzz_progress(200, 100), 0.0);
        assert_eq!(fuzz_progress(0, 0), 1.0);
    }

    #[tokio::test]
    async fn test_flag_recorded_and_run_completed() {
        let ctx = context(ScriptedHttp::new(|_| Ok(HttpResponse::new(200, "item: flag{found_it}"))));
        let mut state = WorkflowState::new(Challenge::new("http://t/", "x"));
        state.queue.extend([task("'", 0.9)]);

        FuzzExecutor.execute(&mut state, &ctx).await.unwrap();
        assert_eq!(state.flags_found, vec!["flag{found_it}"]);
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.attempts[0].status, ExploitStatus::Success);
        // no expansion once a flag is in hand
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn test_interesting_response_expands_queue() {
        let ctx = context(ScriptedHttp::new(|_| Ok(HttpResponse::new(200, "ok"))));
        let mut state = WorkflowState::new(Challenge::new("http://t/", "x"));
        state.queue.extend([task("' OR 1=1 LIMIT 1--", 0.5)]);

        FuzzExecutor.execute(&mut state, &ctx).await.unwrap();
        assert_eq!(state.attempts.len(), 1);
        assert!(state.attempted_payloads.contains("' OR 1=1 LIMIT 1--"));
        // five SQL variants minus the one already tried
        assert_eq!(state.queue.len(), 4);
        assert!(state.queue.iter().all(|t| t.confidence == adaptive::ADAPTIVE_CONFIDENCE));
        assert!(state.progress(StageName::Fuzz) > 0.9);
    }

    #[tokio::test]
    async fn test_network_error_is_a_failed_attempt() {
        let ctx = context(ScriptedHttp::new(|_| Err(FlaghuntError::Network("refused".into()))));
        let mut state = WorkflowState::new(Challenge::new("http://t/", "x"));
        state.queue.extend([task("'", 0.5), task("\"", 0.4)]);

        FuzzExecutor.execute(&mut state, &ctx).await.unwrap();
        assert_eq!(state.attempts[0].status, ExploitStatus::Failed);
        assert_eq!(state.queue.len(), 1);
        assert_eq!(state.stage(StageName::Fuzz).errors.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_is_a_noop() {
        let ctx = context(ScriptedHttp::new(|_| Ok(HttpResponse::new(200, ""))));
        let mut state = WorkflowState::new(Challenge::new("http://t/", "x"));
        FuzzExecutor.execute(&mut state, &ctx).await.unwrap();
        assert!(state.attempts.is_empty());
        assert_eq!(state.progress(StageName::Fuzz), 1.0);
    }
}
