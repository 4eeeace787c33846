use std::path::Path;

use tracing::warn;

use crate::errors::FlaghuntError;
use super::schema::CONFIG_SCHEMA;
use super::security::validate_security_patterns;
use super::types::FlaghuntConfig;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<FlaghuntConfig, FlaghuntError> {
    if !path.exists() {
        return Err(FlaghuntError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(FlaghuntError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<FlaghuntConfig, FlaghuntError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(FlaghuntConfig::default());
    }

    validate_security_patterns(&yaml)?;
    validate_schema(&yaml)?;

    let config: FlaghuntConfig = serde_yaml::from_value(yaml)?;
    validate_ranges(&config)?;
    Ok(config)
}

/// Structural check against the JSON schema. Advisory: violations are logged.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), FlaghuntError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| FlaghuntError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| FlaghuntError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Values that would make a run meaningless are rejected outright.
fn validate_ranges(config: &FlaghuntConfig) -> Result<(), FlaghuntError> {
    if config.llm.token_ceiling == 0 {
        return Err(FlaghuntError::Config("llm.token_ceiling must be positive".into()));
    }
    if config.llm.max_invoke_attempts == 0 {
        return Err(FlaghuntError::Config("llm.max_invoke_attempts must be at least 1".into()));
    }
    if config.crawler.max_pages == 0 || config.crawler.batch_size == 0 {
        return Err(FlaghuntError::Config("crawler.max_pages and crawler.batch_size must be at least 1".into()));
    }
    if config.fuzzer.max_attempts == 0 {
        return Err(FlaghuntError::Config("fuzzer.max_attempts must be at least 1".into()));
    }
    if config.workflow.max_steps == 0 || config.workflow.max_stage_iterations == 0 {
        return Err(FlaghuntError::Config(
            "workflow.max_steps and workflow.max_stage_iterations must be at least 1".into(),
        ));
    }
    if config.agent.max_messages < 2 {
        return Err(FlaghuntError::Config("agent.max_messages must be at least 2".into()));
    }
    if config.workflow.page_floor > config.crawler.max_pages {
        warn!(
            page_floor = config.workflow.page_floor,
            max_pages = config.crawler.max_pages,
            "workflow.page_floor exceeds crawler.max_pages; the coordinator will keep re-crawling"
        );
    }
    Ok(())
}
