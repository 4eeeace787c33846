use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::errors::{parse_retry_delay, FlaghuntError};
use super::provider::LLMProvider;
use super::types::{LLMResponse, Message, ToolDefinition};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Wraps a single model call with rate-limit backoff.
///
/// Resource-exhaustion errors are retried after the provider-suggested delay
/// (60s when none can be parsed) until `max_attempts` is reached. Every other
/// error is returned immediately: those are not transient.
pub struct RateLimitedInvoker {
    max_attempts: u32,
}

impl Default for RateLimitedInvoker {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl RateLimitedInvoker {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn invoke(
        &self,
        model: &dyn LLMProvider,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, FlaghuntError> {
        let mut attempt = 0;
        while attempt < self.max_attempts {
            debug!(
                provider = model.provider_name(),
                attempt = attempt + 1,
                max = self.max_attempts,
                "LLM invocation attempt"
            );
            match model.invoke(messages, tools).await {
                Ok(response) => return Ok(response),
                Err(FlaghuntError::RateLimit(text)) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        error!(max = self.max_attempts, "Max retry attempts reached");
                        return Err(FlaghuntError::Invocation(format!(
                            "rate limit persisted after {} attempts: {}",
                            self.max_attempts, text
                        )));
                    }

                    let delay = parse_retry_delay(&text);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        delay_secs = delay,
                        "Rate limit hit, waiting before retry"
                    );
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    info!("Retrying after rate limit delay");
                }
                Err(e) => {
                    let class = e.classify();
                    error!(error_type = class.error_type, error = %e, "Non-rate-limit error occurred");
                    if e.looks_like_ordering_error() {
                        error!("This appears to be a message ordering issue.");
                        error!("Check that tool_calls are followed by tool responses.");
                        error!("Message sequence validation should have caught this.");
                    }
                    return Err(e);
                }
            }
        }

        Err(FlaghuntError::Invocation(format!(
            "Failed to invoke LLM after {} attempts",
            self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use std::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limit_then_succeeds() {
        let provider = ScriptedProvider::new(vec![
            Err(FlaghuntError::RateLimit("429 Please retry in 12.5s".into())),
            Err(FlaghuntError::RateLimit("retry_delay { seconds: 30 }".into())),
            Ok(LLMResponse::text("done")),
        ]);
        let start = tokio::time::Instant::now();
        let resp = RateLimitedInvoker::default()
            .invoke(&provider, &[Message::user("hi")], &[])
            .await
            .unwrap();
        assert_eq!(resp.content, "done");
        assert_eq!(provider.calls(), 3);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs_f64(42.5) && waited < Duration::from_secs(43));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_is_invocation_error() {
        let provider = ScriptedProvider::new(
            (0..5).map(|_| Err(FlaghuntError::RateLimit("quota".into()))).collect(),
        );
        let err = RateLimitedInvoker::new(5)
            .invoke(&provider, &[Message::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FlaghuntError::Invocation(_)));
        assert!(err.is_fatal());
        assert_eq!(provider.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparsable_delay_waits_default() {
        let provider = ScriptedProvider::new(vec![
            Err(FlaghuntError::RateLimit("quota exceeded".into())),
            Ok(LLMResponse::text("ok")),
        ]);
        let start = tokio::time::Instant::now();
        RateLimitedInvoker::default()
            .invoke(&provider, &[Message::user("hi")], &[])
            .await
            .unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(60) && waited < Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(FlaghuntError::LLMApi("gemini 400: function call turn out of order".into())),
            Ok(LLMResponse::text("never")),
        ]);
        let wall = Instant::now();
        let err = RateLimitedInvoker::default()
            .invoke(&provider, &[Message::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FlaghuntError::LLMApi(_)));
        assert_eq!(provider.calls(), 1);
        assert!(wall.elapsed() < Duration::from_secs(1));
    }
}
