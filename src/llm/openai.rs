use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::FlaghuntError;
use super::provider::{status_error, LLMProvider};
use super::types::{LLMResponse, Message, Role, ToolCall, ToolDefinition};

/// Chat-completions provider. Also serves OpenAI-compatible endpoints
/// (OpenRouter, Ollama, vLLM) through [`OpenAIProvider::with_base_url`].
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    name: String,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self::with_base_url("openai", api_key, model, "https://api.openai.com/v1")
    }

    pub fn with_base_url(name: &str, api_key: &str, model: Option<&str>, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("gpt-4o").to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
        }
    }

    fn request_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                Role::Assistant if !msg.tool_calls.is_empty() => {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|c| json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments.to_string()},
                        }))
                        .collect();
                    json!({"role": "assistant", "content": msg.content, "tool_calls": calls})
                }
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content,
                }),
                role => json!({"role": role.as_str(), "content": msg.content}),
            })
            .collect()
    }

    fn parse_response(&self, data: &Value) -> LLMResponse {
        let message = &data["choices"][0]["message"];
        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| {
                        let raw = c["function"]["arguments"].as_str().unwrap_or("{}");
                        let arguments = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
                        ToolCall::new(
                            c["id"].as_str().unwrap_or_default(),
                            c["function"]["name"].as_str().unwrap_or_default(),
                            arguments,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        LLMResponse {
            content: message["content"].as_str().unwrap_or_default().to_string(),
            tool_calls,
            input_tokens: data["usage"]["prompt_tokens"].as_u64(),
            output_tokens: data["usage"]["completion_tokens"].as_u64(),
            model: self.model.clone(),
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse, FlaghuntError> {
        let mut body = json!({
            "model": self.model,
            "messages": Self::request_messages(messages),
            "max_tokens": 4096,
            "temperature": 0,
        });
        if !tools.is_empty() {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| json!({"type": "function", "function": {
                    "name": t.name, "description": t.description, "parameters": t.parameters,
                }}))
                .collect();
            body["tools"] = json!(defs);
            body["parallel_tool_calls"] = json!(false);
        }

        let mut request = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FlaghuntError::Network(format!("{} request failed: {}", self.name, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(&self.name, status.as_u16(), &text));
        }

        let data: Value = resp.json().await
            .map_err(|e| FlaghuntError::LLMApi(format!("Failed to parse {} response: {}", self.name, e)))?;

        if let Some(error) = data.get("error") {
            return Err(FlaghuntError::LLMApi(error["message"].as_str().unwrap_or("Unknown").to_string()));
        }

        Ok(self.parse_response(&data))
    }

    fn provider_name(&self) -> &str { &self.name }
    fn model_name(&self) -> &str { &self.model }
}
