use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{ExploitAttempt, FuzzTask};
use super::decision::VulnType;

/// Confidence assigned to variant tasks so they run ahead of untouched
/// low-confidence work.
pub const ADAPTIVE_CONFIDENCE: f64 = 0.8;

/// A response is worth following up when the request went through and the
/// server answered 200.
pub fn is_interesting(attempt: &ExploitAttempt) -> bool {
    attempt.error.is_none() && attempt.response_status() == Some(200)
}

/// Variant tasks for the same type and location, skipping any payload in
/// `attempted`. Every payload returned is added to `attempted`.
pub fn expand(attempt: &ExploitAttempt, attempted: &mut BTreeSet<String>) -> Vec<FuzzTask> {
    if !is_interesting(attempt) {
        return Vec::new();
    }
    let family = VulnType::from_tag(&attempt.task.vulnerability_type);
    let variants: Vec<FuzzTask> = family
        .variant_payloads()
        .iter()
        .filter(|p| attempted.insert(p.to_string()))
        .map(|p| FuzzTask {
            payload: p.to_string(),
            confidence: ADAPTIVE_CONFIDENCE,
            ..attempt.task.clone()
        })
        .collect();
    if !variants.is_empty() {
        debug!(family = %family, count = variants.len(), location = %attempt.task.location, "Generated adaptive variants");
    }
    variants
}
