use async_trait::async_trait;
use crate::errors::FlaghuntError;
use super::types::{LLMResponse, Message, ToolDefinition};

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// One model turn over a full history, with the given tools bound.
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, FlaghuntError>;

    /// Provider-specific token count, when the provider can compute one locally.
    fn count_tokens(&self, _messages: &[Message]) -> Option<usize> {
        None
    }

    /// Provider name for logging
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;
}

/// Map a non-success HTTP status from a provider into the error taxonomy.
/// Rate-limit bodies are kept verbatim so retry hints survive.
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> FlaghuntError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(500).collect());

    match status {
        429 => FlaghuntError::RateLimit(format!("{} {}: {}", provider, status, body)),
        401 | 403 => FlaghuntError::Authentication(format!("{} rejected credentials: {}", provider, message)),
        _ if message.contains("RESOURCE_EXHAUSTED") => {
            FlaghuntError::RateLimit(format!("{} {}: {}", provider, status, body))
        }
        _ => FlaghuntError::LLMApi(format!("{} {}: {}", provider, status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_rate_limit_keeps_body() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded. Please retry in 12.5s.","status":"RESOURCE_EXHAUSTED"}}"#;
        match status_error("gemini", 429, body) {
            FlaghuntError::RateLimit(text) => assert!(text.contains("Please retry in 12.5s")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_error_bad_request_keeps_code() {
        let body = r#"{"error":{"message":"Please ensure that function call turn comes immediately after a user turn"}}"#;
        let err = status_error("gemini", 400, body);
        assert!(matches!(err, FlaghuntError::LLMApi(_)));
        assert!(err.looks_like_ordering_error());
    }

    #[test]
    fn test_status_error_auth() {
        assert!(matches!(
            status_error("openai", 401, "{}"),
            FlaghuntError::Authentication(_)
        ));
    }
}
