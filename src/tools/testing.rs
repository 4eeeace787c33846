//! Tool executor stand-in for agent-loop tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::FlaghuntError;
use crate::llm::{ToolCall, ToolDefinition};
use super::{definitions, ToolExecutor};

type Responder = Box<dyn Fn(&ToolCall) -> Result<String, FlaghuntError> + Send + Sync>;

/// Answers every call through a closure and records the calls in order.
pub struct ScriptedTools {
    responder: Responder,
    calls: Mutex<Vec<ToolCall>>,
}

impl ScriptedTools {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ToolCall) -> Result<String, FlaghuntError> + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), calls: Mutex::new(Vec::new()) }
    }

    /// Every call returns the same text.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        definitions::all()
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        (self.responder)(call)
    }
}
