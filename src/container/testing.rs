//! Command runner stand-in for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::FlaghuntError;
use super::exec::CommandRunner;

type Responder = Box<dyn Fn(&str) -> Result<String, FlaghuntError> + Send + Sync>;

/// Records every command and answers through a closure.
pub struct ScriptedRunner {
    responder: Responder,
    commands: Mutex<Vec<(String, u64)>>,
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, FlaghuntError> + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), commands: Mutex::new(Vec::new()) }
    }

    /// Commands seen so far with their timeouts.
    pub fn commands(&self) -> Vec<(String, u64)> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn exec(&self, command: &str, timeout_secs: u64) -> Result<String, FlaghuntError> {
        if let Ok(mut log) = self.commands.lock() {
            log.push((command.to_string(), timeout_secs));
        }
        (self.responder)(command)
    }
}
