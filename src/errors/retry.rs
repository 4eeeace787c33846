use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

/// Fallback wait when a rate-limit error carries no usable delay hint.
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 60.0;

static RETRY_DELAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Please retry in ([\d.]+)s",
        r"retry_delay\s*\{\s*seconds:\s*(\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Extract the provider-suggested retry delay (in seconds) from an error
/// message. Patterns are tried in order; the first parsable match wins.
pub fn parse_retry_delay(error_message: &str) -> f64 {
    for pattern in RETRY_DELAY_PATTERNS.iter() {
        let parsed = pattern
            .captures(error_message)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        if let Some(delay) = parsed {
            info!(delay_secs = delay, "Extracted retry delay from error message");
            return delay;
        }
    }

    warn!(
        delay_secs = DEFAULT_RETRY_DELAY_SECS,
        "Could not extract retry delay from error, using default"
    );
    DEFAULT_RETRY_DELAY_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_in_seconds() {
        assert_eq!(parse_retry_delay("429 Please retry in 12.5s."), 12.5);
    }

    #[test]
    fn test_parse_retry_delay_block() {
        let msg = "Resource exhausted. retry_delay { seconds: 30 }";
        assert_eq!(parse_retry_delay(msg), 30.0);
    }

    #[test]
    fn test_parse_multiline_retry_delay_block() {
        let msg = "quota exceeded\nretry_delay {\n  seconds: 7\n}";
        assert_eq!(parse_retry_delay(msg), 7.0);
    }

    #[test]
    fn test_parse_unparsable_uses_default() {
        assert_eq!(parse_retry_delay("quota exceeded"), 60.0);
        assert_eq!(parse_retry_delay(""), DEFAULT_RETRY_DELAY_SECS);
    }

    #[test]
    fn test_first_pattern_wins() {
        let msg = "Please retry in 3s retry_delay { seconds: 30 }";
        assert_eq!(parse_retry_delay(msg), 3.0);
    }
}
