use tracing::{debug, error, warn};

use crate::errors::FlaghuntError;
use crate::llm::{Message, Role};
use super::tokens::TokenCounter;
use super::validate::validate;

pub const DEFAULT_TOKEN_CEILING: usize = 200_000;

/// Fractions of the ceiling tried in order until a cut validates.
pub const BUDGET_LADDER: [f64; 8] = [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3];

/// Token-bounded history with strict tool-call ordering.
pub struct ConversationManager<C: TokenCounter> {
    token_ceiling: usize,
    counter: C,
}

impl<C: TokenCounter> ConversationManager<C> {
    pub fn new(token_ceiling: usize, counter: C) -> Self {
        Self { token_ceiling, counter }
    }

    pub fn token_ceiling(&self) -> usize {
        self.token_ceiling
    }

    pub fn count_tokens(&self, messages: &[Message]) -> usize {
        self.counter.count(messages)
    }

    /// Trim `history` to fit the ceiling without producing an invalid
    /// sequence. Falls back to the untrimmed history when no budget on the
    /// ladder yields a valid cut; an invalid untrimmed history is fatal.
    pub fn trim(&self, history: &[Message]) -> Result<Vec<Message>, FlaghuntError> {
        for (step, fraction) in BUDGET_LADDER.iter().enumerate() {
            let budget = (self.token_ceiling as f64 * fraction) as usize;
            let Some(candidate) = self.cut_to_budget(history, budget) else {
                debug!(budget, "No messages fit within budget");
                continue;
            };

            let (valid, reason) = validate(&candidate);
            if valid {
                if candidate.len() < history.len() {
                    debug!(
                        from = history.len(),
                        to = candidate.len(),
                        budget,
                        "Trimmed conversation history"
                    );
                }
                return Ok(candidate);
            }
            if step == 0 {
                debug!(budget, reason = %reason, "Trimming creates invalid sequence, trying lower budget");
            }
        }

        warn!(messages = history.len(), "Could not find valid trimming, using all messages");
        let (valid, reason) = validate(history);
        if !valid {
            error!(reason = %reason, "Even untrimmed messages are invalid");
            for (i, msg) in history.iter().enumerate() {
                error!("  [{}] {}", i, msg.kind_label());
            }
            return Err(FlaghuntError::SequenceValidation(reason));
        }
        Ok(history.to_vec())
    }

    /// Keep the leading system message plus the longest suffix that fits
    /// `budget`. A suffix never starts inside a tool-result run: results whose
    /// call was cut are dropped with it. `None` when nothing but the system
    /// message would survive.
    fn cut_to_budget(&self, history: &[Message], budget: usize) -> Option<Vec<Message>> {
        if self.counter.count(history) <= budget {
            return Some(history.to_vec());
        }

        let (system, rest) = match history.first() {
            Some(first) if first.role == Role::System => (Some(first), &history[1..]),
            _ => (None, history),
        };

        let assemble = |start: usize| -> Vec<Message> {
            system.into_iter().chain(rest[start..].iter()).cloned().collect()
        };

        let mut start = rest.len();
        while start > 0 && self.counter.count(&assemble(start - 1)) <= budget {
            start -= 1;
        }
        while start < rest.len() && rest[start].is_tool_result() {
            start += 1;
        }

        if start >= rest.len() {
            return None;
        }
        Some(assemble(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::tokens::CharEstimate;
    use crate::conversation::validate::is_valid;
    use crate::llm::ToolCall;
    use serde_json::json;

    fn sized(role: Role, tokens: usize) -> Message {
        let text = "x".repeat(tokens * 4);
        match role {
            Role::System => Message::system(&text),
            Role::User => Message::user(&text),
            _ => Message::assistant(&text),
        }
    }

    fn group(id: &str, tokens: usize) -> Vec<Message> {
        let call = ToolCall::new(id, "navigate", json!({}));
        vec![
            Message::assistant_with_tools("", vec![call.clone()]),
            Message::tool_result(&call, &"r".repeat(tokens * 4)),
        ]
    }

    #[test]
    fn test_under_budget_history_unchanged() {
        let mut history = vec![sized(Role::System, 10), sized(Role::User, 10)];
        history.extend(group("a", 10));
        history.push(sized(Role::Assistant, 10));
        let manager = ConversationManager::new(1_000, CharEstimate);
        assert_eq!(manager.trim(&history).unwrap(), history);
    }

    #[test]
    fn test_keeps_system_and_recent_messages() {
        let history = vec![
            sized(Role::System, 10),
            sized(Role::User, 50),
            sized(Role::Assistant, 50),
            sized(Role::User, 50),
            sized(Role::Assistant, 20),
        ];
        let manager = ConversationManager::new(100, CharEstimate);
        let trimmed = manager.trim(&history).unwrap();
        assert_eq!(trimmed.first(), history.first());
        assert_eq!(trimmed.last(), history.last());
        assert!(trimmed.len() < history.len());
        assert!(manager.count_tokens(&trimmed) <= 100);
    }

    #[test]
    fn test_never_splits_tool_group() {
        // system + user + [call, big result] + user + [call, result]
        let mut history = vec![sized(Role::System, 5), sized(Role::User, 5)];
        history.extend(group("a", 80));
        history.push(sized(Role::User, 5));
        history.extend(group("b", 5));
        history.push(sized(Role::Assistant, 5));

        let manager = ConversationManager::new(60, CharEstimate);
        let trimmed = manager.trim(&history).unwrap();
        assert!(is_valid(&trimmed));
        assert!(!trimmed.iter().any(|m| m.tool_call_id.as_deref() == Some("a")));
        assert_eq!(trimmed.last(), history.last());
    }

    #[test]
    fn test_lower_budget_used_when_first_cut_invalid() {
        // At the full budget the cut starts with a tool call right after the
        // system message, which is invalid; a lower rung drops that group.
        let mut history = vec![sized(Role::System, 1), sized(Role::User, 40)];
        history.extend(group("a", 10));
        history.push(sized(Role::Assistant, 10));

        let manager = ConversationManager::new(25, CharEstimate);
        let trimmed = manager.trim(&history).unwrap();
        assert!(is_valid(&trimmed));
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[1], history[4]);
    }

    #[test]
    fn test_invalid_untrimmed_history_is_fatal() {
        let call = ToolCall::new("x", "navigate", json!({}));
        let history = vec![Message::user("u"), Message::assistant_with_tools("", vec![call])];
        let manager = ConversationManager::new(1_000, CharEstimate);
        let err = manager.trim(&history).unwrap_err();
        assert!(matches!(err, FlaghuntError::SequenceValidation(_)));
    }

    #[test]
    fn test_unfittable_valid_history_returned_untrimmed() {
        let history = vec![sized(Role::System, 500), sized(Role::User, 500)];
        let manager = ConversationManager::new(100, CharEstimate);
        assert_eq!(manager.trim(&history).unwrap(), history);
    }
}
