use crate::errors::FlaghuntError;
use super::provider::LLMProvider;
use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::gemini::GeminiProvider;

/// Environment variable consulted for a provider's API key when none is configured.
pub fn api_key_env_var(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

pub fn create_provider(
    provider_name: &str,
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
) -> Result<Box<dyn LLMProvider>, FlaghuntError> {
    let needs_key = !matches!(provider_name, "local");
    if needs_key && api_key.is_empty() {
        let hint = api_key_env_var(provider_name).unwrap_or("an api_key entry");
        return Err(FlaghuntError::Config(format!(
            "No API key for provider '{}'. Set {} or llm.api_key",
            provider_name, hint
        )));
    }

    match provider_name {
        "gemini" | "google" => Ok(Box::new(GeminiProvider::new(api_key, model))),
        "openai" => Ok(Box::new(OpenAIProvider::new(api_key, model))),
        "anthropic" => Ok(Box::new(AnthropicProvider::new(api_key, model))),
        "openrouter" => Ok(Box::new(OpenAIProvider::with_base_url(
            "openrouter",
            api_key,
            model,
            base_url.unwrap_or("https://openrouter.ai/api/v1"),
        ))),
        "local" => Ok(Box::new(OpenAIProvider::with_base_url(
            "local",
            api_key,
            model,
            base_url.unwrap_or("http://localhost:11434/v1"),
        ))),
        _ => Err(FlaghuntError::Config(format!("Unknown LLM provider: {}", provider_name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_providers() {
        let p = create_provider("gemini", "key", None, None).unwrap();
        assert_eq!(p.provider_name(), "gemini");
        assert_eq!(p.model_name(), "gemini-2.5-pro");

        let p = create_provider("local", "", Some("qwen2.5"), None).unwrap();
        assert_eq!(p.provider_name(), "local");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = create_provider("openai", "", None, None).err().unwrap();
        assert!(matches!(err, FlaghuntError::Config(_)));
    }

    #[test]
    fn test_unknown_provider() {
        assert!(create_provider("nope", "k", None, None).is_err());
    }
}
