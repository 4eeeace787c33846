use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use crate::errors::FlaghuntError;
use super::provider::{status_error, LLMProvider};
use super::types::{LLMResponse, Message, Role, ToolCall, ToolDefinition};

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("gemini-2.5-pro").to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    /// Build the `generateContent` request body. Consecutive tool results are
    /// folded into a single user turn holding one `functionResponse` per call.
    fn request_body(messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(json!({"text": msg.content})),
                Role::User => contents.push(json!({"role": "user", "parts": [{"text": msg.content}]})),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(json!({"text": msg.content}));
                    }
                    for call in &msg.tool_calls {
                        parts.push(json!({"functionCall": {"name": call.name, "args": call.arguments}}));
                    }
                    contents.push(json!({"role": "model", "parts": parts}));
                }
                Role::Tool => {
                    let part = json!({"functionResponse": {
                        "name": msg.name.clone().unwrap_or_default(),
                        "response": {"content": msg.content},
                    }});
                    let previous_is_response = contents.last().is_some_and(|c| {
                        c["parts"][0].get("functionResponse").is_some()
                    });
                    match contents.last_mut() {
                        Some(last) if previous_is_response => {
                            if let Some(parts) = last["parts"].as_array_mut() {
                                parts.push(part);
                            }
                        }
                        _ => contents.push(json!({"role": "user", "parts": [part]})),
                    }
                }
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": 0, "maxOutputTokens": 16384 },
        });
        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({"parts": system_parts});
        }
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| json!({"name": t.name, "description": t.description, "parameters": t.parameters}))
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }
        body
    }

    fn parse_response(&self, data: &Value) -> LLMResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        let parts = data["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part["text"].as_str() {
                content.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                let id = call["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                tool_calls.push(ToolCall::new(
                    id,
                    call["name"].as_str().unwrap_or_default(),
                    call["args"].clone(),
                ));
            }
        }

        LLMResponse {
            content,
            tool_calls,
            input_tokens: data["usageMetadata"]["promptTokenCount"].as_u64(),
            output_tokens: data["usageMetadata"]["candidatesTokenCount"].as_u64(),
            model: self.model.clone(),
        }
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn invoke(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse, FlaghuntError> {
        let body = Self::request_body(messages, tools);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let resp = self.client.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlaghuntError::Network(format!("Gemini request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("gemini", status.as_u16(), &text));
        }

        let data: Value = resp.json().await
            .map_err(|e| FlaghuntError::LLMApi(format!("Parse error: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(FlaghuntError::LLMApi(error["message"].as_str().unwrap_or("Unknown").to_string()));
        }

        let response = self.parse_response(&data);
        debug!(
            tool_calls = response.tool_calls.len(),
            content_len = response.content.len(),
            "Gemini response parsed"
        );
        Ok(response)
    }

    fn provider_name(&self) -> &str { "gemini" }
    fn model_name(&self) -> &str { &self.model }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_groups_function_responses() {
        let call_a = ToolCall::new("a", "navigate", json!({"url": "http://t"}));
        let call_b = ToolCall::new("b", "get_page_state", json!({}));
        let messages = vec![
            Message::system("be helpful"),
            Message::user("CTF Challenge: http://t"),
            Message::assistant_with_tools("", vec![call_a.clone(), call_b.clone()]),
            Message::tool_result(&call_a, "page"),
            Message::tool_result(&call_b, "state"),
        ];
        let body = GeminiProvider::request_body(&messages, &[]);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(contents[2]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(contents[2]["parts"][1]["functionResponse"]["name"], "get_page_state");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_with_function_call() {
        let provider = GeminiProvider::new("k", None);
        let data = json!({
            "candidates": [{"content": {"parts": [
                {"text": "Looking"},
                {"functionCall": {"name": "navigate", "args": {"url": "http://t"}}}
            ]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 3}
        });
        let resp = provider.parse_response(&data);
        assert_eq!(resp.content, "Looking");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "navigate");
        assert!(resp.tool_calls[0].id.starts_with("call_"));
        assert_eq!(resp.input_tokens, Some(10));
    }
}
