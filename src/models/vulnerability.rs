use serde::{Deserialize, Serialize};

/// A weakness identified during threat modeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(default = "unknown")]
    pub vulnerability_type: String,
    #[serde(default = "unknown")]
    pub location: String,
    #[serde(default)]
    pub description: String,
    /// Exploitability estimate in [0, 1], used only for queue ordering.
    #[serde(default = "default_confidence", deserialize_with = "lenient_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub attack_vectors: Vec<String>,
    #[serde(default)]
    pub payload_suggestions: Vec<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Models emit confidence as a number or a numeric string; clamp to [0, 1].
fn lenient_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw.unwrap_or_else(default_confidence).clamp(0.0, 1.0))
}

impl Vulnerability {
    pub fn new(vulnerability_type: &str, location: &str, confidence: f64) -> Self {
        Self {
            vulnerability_type: vulnerability_type.to_string(),
            location: location.to_string(),
            description: String::new(),
            confidence: confidence.clamp(0.0, 1.0),
            attack_vectors: Vec::new(),
            payload_suggestions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_vectors(mut self, vectors: &[&str]) -> Self {
        self.attack_vectors = vectors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_payloads(mut self, payloads: &[&str]) -> Self {
        self.payload_suggestions = payloads.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let v: Vulnerability = serde_json::from_str(r#"{"description": "x"}"#).unwrap();
        assert_eq!(v.vulnerability_type, "unknown");
        assert_eq!(v.location, "unknown");
        assert_eq!(v.confidence, 0.5);
    }

    #[test]
    fn test_confidence_string_and_clamp() {
        let v: Vulnerability = serde_json::from_str(r#"{"confidence": "0.9"}"#).unwrap();
        assert_eq!(v.confidence, 0.9);
        let v: Vulnerability = serde_json::from_str(r#"{"confidence": 7}"#).unwrap();
        assert_eq!(v.confidence, 1.0);
    }
}
