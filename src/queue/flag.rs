use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::warn;

static FALLBACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"CTF\{[^}]+\}",
        r"flag\{[^}]+\}",
        r"FLAG\{[^}]+\}",
        r"[A-Za-z0-9_]+\{[^}]+\}",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Finds flag-shaped tokens using the challenge's flag format first and a
/// few common shapes after that.
#[derive(Debug, Clone)]
pub struct FlagMatcher {
    primary: Option<Regex>,
}

impl FlagMatcher {
    pub fn new(flag_format: &str) -> Self {
        let pattern = Self::pattern_for(flag_format);
        let primary = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(format = flag_format, error = %e, "Unusable flag format, relying on fallback patterns");
                None
            }
        };
        Self { primary }
    }

    /// Translate `flag{*}` into `flag\{[^}]+?\}`: literal text is escaped and
    /// each `*` becomes a lazy run of non-`}` characters.
    pub fn pattern_for(flag_format: &str) -> String {
        flag_format
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^}]+?")
    }

    pub fn find(&self, text: &str) -> Option<String> {
        self.primary
            .iter()
            .chain(FALLBACK_PATTERNS.iter())
            .find_map(|re| re.find(text))
            .map(|m| m.as_str().to_string())
    }
}
