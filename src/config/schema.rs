use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string", "enum": ["gemini", "google", "openai", "anthropic", "openrouter", "local"] },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string" },
                    "token_ceiling": { "type": "integer", "minimum": 1000 },
                    "max_invoke_attempts": { "type": "integer", "minimum": 1 }
                }
            },
            "crawler": {
                "type": "object",
                "properties": {
                    "max_depth": { "type": "integer", "minimum": 0 },
                    "max_pages": { "type": "integer", "minimum": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "user_agent": { "type": "string" },
                    "batch_size": { "type": "integer", "minimum": 1 }
                }
            },
            "fuzzer": {
                "type": "object",
                "properties": {
                    "max_attempts": { "type": "integer", "minimum": 1 },
                    "exploit_timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "workflow": {
                "type": "object",
                "properties": {
                    "page_floor": { "type": "integer", "minimum": 0 },
                    "vulnerability_floor": { "type": "integer", "minimum": 0 },
                    "max_stage_iterations": { "type": "integer", "minimum": 1 },
                    "max_steps": { "type": "integer", "minimum": 1 }
                }
            },
            "agent": {
                "type": "object",
                "properties": {
                    "max_messages": { "type": "integer", "minimum": 2 },
                    "files_dir": { "type": "string" }
                }
            },
            "tools": {
                "type": "object",
                "properties": {
                    "fetch_timeout_secs": { "type": "integer", "minimum": 1 },
                    "discovery_timeout_secs": { "type": "integer", "minimum": 1 },
                    "scan_timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "container": {
                "type": "object",
                "properties": {
                    "image": { "type": "string" },
                    "name": { "type": "string" },
                    "network_mode": { "type": "string" },
                    "capabilities": { "type": "array", "items": { "type": "string" } }
                }
            },
            "logging": {
                "type": "object",
                "properties": {
                    "level": { "type": "string", "enum": ["trace", "debug", "info", "warn", "error"] },
                    "run_log": { "type": "string" }
                }
            }
        }
    })
});
