pub mod adaptive;
pub mod decision;
pub mod detectors;
pub mod executor;
pub mod flag;

pub use decision::VulnType;
pub use detectors::{DetectorSet, SuccessDetector};
pub use executor::ExploitExecutor;
pub use flag::FlagMatcher;

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::models::{CrawledPage, Form, FuzzTask, Vulnerability};

/// Payloads tried against every named form field when the exploitation plan
/// provides none.
pub const GENERIC_FORM_PAYLOADS: [&str; 3] = ["' OR '1'='1", "admin' --", "' UNION SELECT null--"];

/// Confidence of the per-field generic tasks.
pub const FORM_FIELD_CONFIDENCE: f64 = 0.5;

/// Pending [`FuzzTask`]s ordered by confidence, highest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExploitationQueue {
    tasks: VecDeque<FuzzTask>,
}

impl ExploitationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one task per (attack vector, payload) pair of every vulnerability,
    /// then one generic injection task per named form field and form payload,
    /// then re-sort. Returns how many tasks were added.
    pub fn populate(
        &mut self,
        vulnerabilities: &[Vulnerability],
        pages: &[CrawledPage],
        form_payloads: &[String],
    ) -> usize {
        let before = self.tasks.len();

        for vuln in vulnerabilities {
            let form = form_for_location(pages, &vuln.location);
            let method = form.map(|f| f.method.clone()).unwrap_or_else(|| "GET".to_string());
            let parameters = form.map(Form::default_parameters).unwrap_or_default();
            for vector in &vuln.attack_vectors {
                for payload in &vuln.payload_suggestions {
                    self.tasks.push_back(FuzzTask {
                        vulnerability_type: vuln.vulnerability_type.clone(),
                        location: vuln.location.clone(),
                        attack_vector: vector.clone(),
                        payload: payload.clone(),
                        confidence: vuln.confidence,
                        method: method.clone(),
                        parameters: parameters.clone(),
                    });
                }
            }
        }

        let payloads: Vec<String> = if form_payloads.is_empty() {
            GENERIC_FORM_PAYLOADS.iter().map(|p| p.to_string()).collect()
        } else {
            form_payloads.to_vec()
        };
        let mut seen_fields = BTreeSet::new();
        for form in pages.iter().flat_map(|p| p.forms.iter()) {
            for field in form.named_fields() {
                if !seen_fields.insert((form.action.clone(), form.method.clone(), field.name.clone())) {
                    continue;
                }
                for payload in &payloads {
                    self.tasks.push_back(FuzzTask {
                        vulnerability_type: "sql_injection".to_string(),
                        location: form.action.clone(),
                        attack_vector: "form_sql_injection".to_string(),
                        payload: payload.clone(),
                        confidence: FORM_FIELD_CONFIDENCE,
                        method: form.method.clone(),
                        parameters: [(field.name.clone(), payload.clone())].into_iter().collect(),
                    });
                }
            }
        }

        self.sort();
        self.tasks.len() - before
    }

    /// Stable: ties keep insertion order.
    pub fn sort(&mut self) {
        self.tasks
            .make_contiguous()
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    }

    /// Append without re-sorting.
    pub fn extend(&mut self, tasks: impl IntoIterator<Item = FuzzTask>) {
        self.tasks.extend(tasks);
    }

    /// Remove the head task. Each task leaves the queue exactly once.
    pub fn pop_next(&mut self) -> Option<FuzzTask> {
        self.tasks.pop_front()
    }

    pub fn peek(&self) -> Option<&FuzzTask> {
        self.tasks.front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuzzTask> {
        self.tasks.iter()
    }
}

fn form_for_location<'a>(pages: &'a [CrawledPage], location: &str) -> Option<&'a Form> {
    pages
        .iter()
        .flat_map(|p| p.forms.iter())
        .find(|f| f.action == location)
}
