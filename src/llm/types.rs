use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured function-invocation request emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self { id: id.into(), name: name.into(), arguments }
    }
}

/// One conversation turn. Insertion order is conversation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool-result messages: the id of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on tool-result messages: the tool that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls, ..Self::plain(Role::Assistant, content) }
    }

    pub fn tool_result(call: &ToolCall, content: &str) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool
    }

    /// Short label used in sequence diagnostics, e.g. `assistant (with tool_calls)`.
    pub fn kind_label(&self) -> String {
        if self.has_tool_calls() {
            format!("{} (with tool_calls)", self.role)
        } else {
            self.role.to_string()
        }
    }
}

/// JSON-schema description of a tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Fully populated model reply: text content plus any tool calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model: String,
}

impl LLMResponse {
    pub fn text(content: &str) -> Self {
        Self { content: content.to_string(), ..Default::default() }
    }

    pub fn into_message(self) -> Message {
        if self.tool_calls.is_empty() {
            Message::assistant(&self.content)
        } else {
            Message::assistant_with_tools(&self.content, self.tool_calls)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_links_call() {
        let call = ToolCall::new("call_1", "navigate", json!({"url": "http://t"}));
        let msg = Message::tool_result(&call, "ok");
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("navigate"));
    }

    #[test]
    fn test_into_message_keeps_tool_calls() {
        let resp = LLMResponse {
            tool_calls: vec![ToolCall::new("a", "get_page_state", json!({}))],
            ..LLMResponse::text("")
        };
        let msg = resp.into_message();
        assert!(msg.has_tool_calls());
        assert_eq!(msg.kind_label(), "assistant (with tool_calls)");
    }

    #[test]
    fn test_plain_assistant_has_no_tool_calls() {
        let msg = LLMResponse::text("done").into_message();
        assert!(!msg.has_tool_calls());
        assert_eq!(msg.kind_label(), "assistant");
    }
}
