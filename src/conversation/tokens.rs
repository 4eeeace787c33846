use tracing::debug;

use crate::llm::{LLMProvider, Message};

pub trait TokenCounter: Send + Sync {
    fn count(&self, messages: &[Message]) -> usize;
}

/// Roughly four characters per token over all textual content.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    chars / 4
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimate;

impl TokenCounter for CharEstimate {
    fn count(&self, messages: &[Message]) -> usize {
        estimate_tokens(messages)
    }
}

/// Uses the provider's own counter, falling back to [`estimate_tokens`].
pub struct ProviderTokenCounter<'a> {
    provider: &'a dyn LLMProvider,
}

impl<'a> ProviderTokenCounter<'a> {
    pub fn new(provider: &'a dyn LLMProvider) -> Self {
        Self { provider }
    }
}

impl TokenCounter for ProviderTokenCounter<'_> {
    fn count(&self, messages: &[Message]) -> usize {
        match self.provider.count_tokens(messages) {
            Some(tokens) => tokens,
            None => {
                let estimate = estimate_tokens(messages);
                debug!(estimate, "Provider has no token counter, using character estimate");
                estimate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;

    #[test]
    fn test_estimate_is_chars_over_four() {
        let msgs = vec![Message::user(&"a".repeat(40)), Message::assistant(&"b".repeat(21))];
        assert_eq!(estimate_tokens(&msgs), 15);
    }

    #[test]
    fn test_provider_counter_preferred() {
        let provider = ScriptedProvider::new(vec![]).with_token_counter(|m| m.len() * 1000);
        let counter = ProviderTokenCounter::new(&provider);
        assert_eq!(counter.count(&[Message::user("x"), Message::user("y")]), 2000);
    }

    #[test]
    fn test_provider_counter_falls_back() {
        let provider = ScriptedProvider::new(vec![]);
        let counter = ProviderTokenCounter::new(&provider);
        assert_eq!(counter.count(&[Message::user("abcdefgh")]), 2);
    }
}
