//! Deterministic stand-ins for the model contract, used by unit and
//! integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::FlaghuntError;
use super::provider::LLMProvider;
use super::types::{LLMResponse, Message, ToolDefinition};

/// Replays a fixed script of responses, one per `invoke`, and records the
/// histories it was called with.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<LLMResponse, FlaghuntError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
    token_counter: Option<fn(&[Message]) -> usize>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<LLMResponse, FlaghuntError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            token_counter: None,
        }
    }

    pub fn replies(replies: Vec<LLMResponse>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    pub fn with_token_counter(mut self, counter: fn(&[Message]) -> usize) -> Self {
        self.token_counter = Some(counter);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn invoke(&self, messages: &[Message], _tools: &[ToolDefinition]) -> Result<LLMResponse, FlaghuntError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Err(FlaghuntError::LLMApi("scripted provider exhausted".into())))
    }

    fn count_tokens(&self, messages: &[Message]) -> Option<usize> {
        self.token_counter.map(|count| count(messages))
    }

    fn provider_name(&self) -> &str { "scripted" }
    fn model_name(&self) -> &str { "scripted" }
}
