use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a selector string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[default]
    Css,
    Xpath,
}

impl SelectorKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_lowercase().as_str() {
            "" | "css" => Some(Self::Css),
            "xpath" => Some(Self::Xpath),
            _ => None,
        }
    }

    /// Selector in the form the Playwright locator engine expects.
    pub fn qualify(&self, selector: &str) -> String {
        match self {
            Self::Css => selector.to_string(),
            Self::Xpath => format!("xpath={}", selector),
        }
    }
}

/// One request to the resident browser server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowserCommand {
    Navigate { url: String },
    Find { selector: String, limit: usize },
    Click { selector: String },
    Fill { selector: String, value: String },
    Evaluate { js: String },
    Snapshot,
    Cookies,
    ConsoleLogs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub cookies: Vec<BrowserCookie>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FoundElements {
    pub total: usize,
    pub elements: Vec<ElementInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleEntry {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: serde_json::Value,
}

/// `name=value; name=value` as sent in a Cookie header.
pub fn cookie_header(cookies: &[BrowserCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}
