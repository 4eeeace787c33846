pub mod validate;
pub mod trim;
pub mod tokens;

pub use validate::{validate, is_valid};
pub use trim::{ConversationManager, BUDGET_LADDER, DEFAULT_TOKEN_CEILING};
pub use tokens::{estimate_tokens, CharEstimate, ProviderTokenCounter, TokenCounter};
