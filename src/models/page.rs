use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One field of an HTML form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Absolute URL the form submits to.
    pub action: String,
    /// Upper-cased HTTP method.
    pub method: String,
    pub fields: Vec<FormField>,
}

impl Form {
    pub fn named_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| !f.name.is_empty())
    }

    pub fn has_field_named(&self, names: &[&str]) -> bool {
        self.named_fields()
            .any(|f| names.iter().any(|n| f.name.eq_ignore_ascii_case(n)))
    }

    pub fn has_file_input(&self) -> bool {
        self.fields.iter().any(|f| f.field_type.eq_ignore_ascii_case("file"))
    }

    /// Field name to default value, for named fields only.
    pub fn default_parameters(&self) -> BTreeMap<String, String> {
        self.named_fields()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }
}

/// Any input-like element on a page, inside a form or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub content: String,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub forms: Vec<Form>,
    pub links: Vec<String>,
    pub inputs: Vec<PageInput>,
    pub cookies: BTreeMap<String, String>,
    pub response_time_ms: u64,
}

impl CrawledPage {
    pub fn new(url: &str, status_code: u16) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            status_code,
            headers: BTreeMap::new(),
            forms: Vec::new(),
            links: Vec::new(),
            inputs: Vec::new(),
            cookies: BTreeMap::new(),
            response_time_ms: 0,
        }
    }
}
