pub mod definitions;
pub mod scanners;
pub mod testing;
pub mod toolbox;

use async_trait::async_trait;

use crate::errors::FlaghuntError;
use crate::llm::{ToolCall, ToolDefinition};

pub use toolbox::Toolbox;

/// Executes model-requested tool calls. Every call yields text for a
/// tool-result message; `Err` is reserved for failures that end the run.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, call: &ToolCall) -> Result<String, FlaghuntError>;
}

/// Longest prefix of `text` with at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
