use tracing::debug;

use crate::llm::router::api_key_env_var;
use super::types::LLMConfig;

/// Resolve a credential value. A leading `$` names an environment variable.
pub fn resolve_credential(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        match std::env::var(var_name) {
            Ok(resolved) => {
                debug!(var = %var_name, "Resolved credential from environment");
                resolved
            }
            Err(_) => {
                debug!(var = %var_name, "Environment variable not set, using literal");
                value.to_string()
            }
        }
    } else {
        value.to_string()
    }
}

/// API key for the configured provider: explicit value first, then the
/// provider's conventional environment variable.
pub fn resolve_api_key(llm: &LLMConfig) -> Option<String> {
    if let Some(key) = llm.api_key.as_deref().map(resolve_credential) {
        if !key.is_empty() && !key.starts_with('$') {
            return Some(key);
        }
    }
    let var = api_key_env_var(&llm.provider)?;
    std::env::var(var).ok().filter(|k| !k.is_empty())
}

/// Mask secrets (4+ characters) in text before it is displayed.
pub fn redact_credentials(text: &str, secrets: &[&str]) -> String {
    let mut result = text.to_string();
    for secret in secrets {
        if secret.len() >= 4 {
            result = result.replace(secret, "[REDACTED]");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_credential_literal() {
        assert_eq!(resolve_credential("mykey"), "mykey");
    }

    #[test]
    fn test_resolve_credential_env_var() {
        std::env::set_var("TEST_FLAGHUNT_CRED", "secret123");
        assert_eq!(resolve_credential("$TEST_FLAGHUNT_CRED"), "secret123");
        std::env::remove_var("TEST_FLAGHUNT_CRED");
    }

    #[test]
    fn test_resolve_credential_missing_env_var() {
        assert_eq!(resolve_credential("$NONEXISTENT_FLAGHUNT_VAR"), "$NONEXISTENT_FLAGHUNT_VAR");
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        let llm = LLMConfig { api_key: Some("explicit-key".into()), ..Default::default() };
        assert_eq!(resolve_api_key(&llm).as_deref(), Some("explicit-key"));
    }

    #[test]
    fn test_redact_credentials() {
        let redacted = redact_credentials("key=S3cret123 id=ab", &["S3cret123", "ab"]);
        assert_eq!(redacted, "key=[REDACTED] id=ab");
    }
}
