use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FLAG_FORMAT: &str = "flag{*}";

/// A web challenge to solve. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_code: Option<String>,
    /// Pattern such as `flag{*}`; `*` marks the secret part.
    #[serde(default = "default_flag_format")]
    pub flag_format: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_flag_format() -> String {
    DEFAULT_FLAG_FORMAT.to_string()
}

impl Challenge {
    pub fn new(url: &str, description: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            description: description.to_string(),
            source_code: None,
            flag_format: default_flag_format(),
            hint: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_flag_format(mut self, format: &str) -> Self {
        self.flag_format = format.to_string();
        self
    }

    pub fn with_source_code(mut self, source: &str) -> Self {
        self.source_code = Some(source.to_string());
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    /// Human turn handed to the direct solver.
    pub fn prompt_input(&self) -> String {
        let mut input = self.url.clone();
        if !self.description.is_empty() {
            input.push_str(&format!("\nDescription: {}", self.description));
        }
        if let Some(hint) = &self.hint {
            input.push_str(&format!("\nHint: {}", hint));
        }
        input.push_str(&format!("\nFlag format: {}", self.flag_format));
        input
    }
}
