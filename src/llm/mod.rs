pub mod provider;
pub mod anthropic;
pub mod openai;
pub mod gemini;
pub mod router;
pub mod types;
pub mod invoker;
pub mod testing;

pub use provider::LLMProvider;
pub use router::create_provider;
pub use invoker::RateLimitedInvoker;
pub use types::{LLMResponse, Message, Role, ToolCall, ToolDefinition};
