use serde_yaml::Value;

use crate::errors::FlaghuntError;

/// Substrings refused anywhere in a config value. The config names local
/// paths and URLs only, so traversal and script-bearing schemes never belong.
const DANGEROUS_PATTERNS: &[&str] = &["../", "..\\", "<script", "javascript:", "data:", "file:", "vbscript:"];

pub fn validate_security_patterns(value: &Value) -> Result<(), FlaghuntError> {
    check_value(value, "root")
}

fn check_value(value: &Value, path: &str) -> Result<(), FlaghuntError> {
    match value {
        Value::String(s) => {
            let lower = s.to_lowercase();
            match DANGEROUS_PATTERNS.iter().find(|p| lower.contains(*p)) {
                Some(pattern) => Err(FlaghuntError::Config(format!(
                    "Dangerous pattern '{}' found at config path: {}",
                    pattern, path
                ))),
                None => Ok(()),
            }
        }
        Value::Mapping(map) => map.iter().try_for_each(|(k, v)| {
            let key = k.as_str().unwrap_or("unknown");
            check_value(v, &child_path(path, key))
        }),
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .try_for_each(|(i, v)| check_value(v, &format!("{}[{}]", path, i))),
        _ => Ok(()),
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent == "root" {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}
