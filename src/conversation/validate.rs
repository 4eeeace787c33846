use crate::llm::{Message, Role};

/// Check the tool-call/tool-result ordering rules providers enforce.
///
/// Returns `(true, "Valid")` or `(false, reason)` naming the first offending
/// position.
pub fn validate(messages: &[Message]) -> (bool, String) {
    for (i, msg) in messages.iter().enumerate() {
        if msg.has_tool_calls() {
            if i == 0 {
                return (false, format!(
                    "AI message with tool_calls at position {} cannot be first (must follow user or tool message)",
                    i
                ));
            }

            let prev = &messages[i - 1];
            if !matches!(prev.role, Role::User | Role::Tool) {
                return (false, format!(
                    "AI message with tool_calls at position {} must come after a user or tool message (found {})",
                    i,
                    prev.kind_label()
                ));
            }

            match messages.get(i + 1) {
                None => {
                    return (false, format!(
                        "AI message with tool_calls at position {} has no following tool messages",
                        i
                    ));
                }
                Some(next) if !next.is_tool_result() => {
                    return (false, format!(
                        "AI message with tool_calls at position {} not followed by a tool message (found {})",
                        i,
                        next.kind_label()
                    ));
                }
                Some(_) => {}
            }
        }

        if msg.is_tool_result() {
            if i == 0 {
                return (false, format!("Tool message at position {} cannot be first", i));
            }

            let prev = &messages[i - 1];
            if !(prev.is_tool_result() || prev.has_tool_calls()) {
                return (false, format!(
                    "Tool message at position {} not preceded by AI message with tool_calls (found {})",
                    i,
                    prev.kind_label()
                ));
            }
        }
    }

    (true, "Valid".to_string())
}

pub fn is_valid(messages: &[Message]) -> bool {
    validate(messages).0
}
