use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::FlaghuntError;
use super::provider::{status_error, LLMProvider};
use super::types::{LLMResponse, Message, Role, ToolCall, ToolDefinition};

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("claude-sonnet-4-5-20250929").to_string(),
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    /// Returns `(system, messages)`. Tool results travel as `tool_result`
    /// blocks inside a user turn; consecutive results share one turn.
    fn request_messages(messages: &[Message]) -> (String, Vec<Value>) {
        let mut system = Vec::new();
        let mut out: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system.push(msg.content.clone()),
                Role::User => out.push(json!({"role": "user", "content": msg.content})),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": msg.content}));
                    }
                    for call in &msg.tool_calls {
                        blocks.push(json!({"type": "tool_use", "id": call.id, "name": call.name, "input": call.arguments}));
                    }
                    out.push(json!({"role": "assistant", "content": blocks}));
                }
                Role::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.content,
                    });
                    let previous_is_result = out.last().is_some_and(|m| m["content"][0]["type"] == "tool_result");
                    match out.last_mut() {
                        Some(last) if previous_is_result => {
                            if let Some(blocks) = last["content"].as_array_mut() {
                                blocks.push(block);
                            }
                        }
                        _ => out.push(json!({"role": "user", "content": [block]})),
                    }
                }
            }
        }

        (system.join("\n\n"), out)
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse, FlaghuntError> {
        let (system, turns) = Self::request_messages(messages);
        let mut body = json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.parameters}))
                .collect();
            body["tools"] = json!(defs);
        }

        let resp = self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FlaghuntError::Network(format!("Anthropic API request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status.as_u16(), &text));
        }

        let data: Value = resp.json().await
            .map_err(|e| FlaghuntError::LLMApi(format!("Failed to parse Anthropic response: {}", e)))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in data["content"].as_array().cloned().unwrap_or_default() {
            match block["type"].as_str() {
                Some("text") => content.push_str(block["text"].as_str().unwrap_or_default()),
                Some("tool_use") => tool_calls.push(ToolCall::new(
                    block["id"].as_str().unwrap_or_default(),
                    block["name"].as_str().unwrap_or_default(),
                    block["input"].clone(),
                )),
                _ => {}
            }
        }

        Ok(LLMResponse {
            content,
            tool_calls,
            input_tokens: data["usage"]["input_tokens"].as_u64(),
            output_tokens: data["usage"]["output_tokens"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str { "anthropic" }
    fn model_name(&self) -> &str { &self.model }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_results_share_one_user_turn() {
        let a = ToolCall::new("a", "navigate", json!({}));
        let b = ToolCall::new("b", "fetch", json!({}));
        let (system, turns) = AnthropicProvider::request_messages(&[
            Message::system("sys"),
            Message::user("go"),
            Message::assistant_with_tools("", vec![a.clone(), b.clone()]),
            Message::tool_result(&a, "1"),
            Message::tool_result(&b, "2"),
        ]);
        assert_eq!(system, "sys");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(turns[2]["content"][1]["tool_use_id"], "b");
    }
}
