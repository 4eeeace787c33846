use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A candidate exploitation attempt awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzTask {
    pub vulnerability_type: String,
    pub location: String,
    pub attack_vector: String,
    pub payload: String,
    pub confidence: f64,
    pub method: String,
    pub parameters: BTreeMap<String, String>,
}

impl FuzzTask {
    /// Short identity used in logs and attempt records.
    pub fn label(&self) -> String {
        format!("{} {} [{}] {:?}", self.method, self.location, self.vulnerability_type, self.payload)
    }
}

/// Lifecycle of an exploit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExploitStatus {
    Pending,
    InProgress,
    /// A flag was extracted from the response.
    Success,
    Failed,
    Timeout,
}

/// Recorded execution and outcome of one [`FuzzTask`]. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitAttempt {
    pub id: String,
    pub task: FuzzTask,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    pub status: ExploitStatus,
    pub flag: Option<String>,
    pub error: Option<String>,
    /// Outcome of the type-specific success detector. A hint, not a proof.
    pub indicator_hit: bool,
    pub duration_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ExploitAttempt {
    pub fn pending(task: FuzzTask) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task,
            request: serde_json::Value::Null,
            response: serde_json::Value::Null,
            status: ExploitStatus::Pending,
            flag: None,
            error: None,
            indicator_hit: false,
            duration_ms: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn response_status(&self) -> Option<u16> {
        self.response["status"].as_u64().map(|s| s as u16)
    }
}
