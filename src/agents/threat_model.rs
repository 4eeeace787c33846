use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::models::{CrawledPage, Vulnerability};
use crate::pipeline::{StageExecutor, StageName, WorkflowEvent, WorkflowState};
use crate::queue::GENERIC_FORM_PAYLOADS;
use super::agent_loop::agent_pass;
use super::prompts;
use super::structured::{ask_json, Reply};

const AUTH_FIELDS: [&str; 4] = ["username", "password", "login", "id"];

/// Guesses from page structure, used when the model's list is unusable.
pub fn default_vulnerabilities(pages: &[CrawledPage]) -> Vec<Vulnerability> {
    let mut vulns = Vec::new();
    for page in pages {
        for form in page.forms.iter().filter(|f| f.has_field_named(&AUTH_FIELDS)) {
            vulns.push(
                Vulnerability::new("sql_injection", &form.action, 0.7)
                    .with_description("Form with authentication fields - potential SQL injection")
                    .with_vectors(&["sql_injection_auth_bypass"])
                    .with_payloads(&["admin' OR '1'='1", "' OR 1=1 --", "admin' --"]),
            );
        }
    }
    for page in pages {
        let upload_form = page.forms.iter().find(|f| f.has_file_input());
        let upload_input = page.inputs.iter().any(|i| i.input_type.eq_ignore_ascii_case("file"));
        let location = match (upload_form, upload_input) {
            (Some(form), _) => form.action.as_str(),
            (None, true) => page.url.as_str(),
            (None, false) => continue,
        };
        vulns.push(
            Vulnerability::new("file_upload", location, 0.6)
                .with_description("File upload functionality detected")
                .with_vectors(&["malicious_file_upload"])
                .with_payloads(&["shell.php", "webshell.jsp"]),
        );
    }
    vulns
}

pub fn default_exploitation_plan() -> Value {
    json!({
        "priority_order": ["sql_injection", "authentication_bypass", "file_upload", "xss"],
        "attack_vectors": {
            "sql_injection": "Test all input fields for SQL injection",
            "authentication_bypass": "Attempt to bypass authentication mechanisms",
            "file_upload": "Upload malicious files if upload functionality exists",
            "xss": "Test for cross-site scripting vulnerabilities"
        },
        "payloads": {
            "sql_injection": GENERIC_FORM_PAYLOADS,
            "auth_bypass": ["admin/admin", "admin/password", "guest/guest"]
        },
        "testing_sequence": [
            "test_sql_injection_in_forms",
            "test_authentication_bypass",
            "test_file_upload_vulnerabilities",
            "test_xss_in_input_fields"
        ],
        "success_indicators": ["flag pattern match", "successful authentication", "file execution"],
        "flag_extraction": ["check_response_content", "check_uploaded_files", "check_database_output"]
    })
}

/// Accepts a bare array or an object carrying a `vulnerabilities` array.
/// Entries that do not decode are skipped.
pub fn vulnerabilities_from(value: Value) -> Option<Vec<Vulnerability>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("vulnerabilities") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Vulnerability>(item).ok())
            .filter(|v| !v.vulnerability_type.is_empty())
            .collect(),
    )
}

/// `payloads.sql_injection` of the plan, or the generic form payloads.
pub fn form_payloads(plan: &Value) -> Vec<String> {
    plan.pointer("/payloads/sql_injection")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|p| p.as_str().map(str::to_string)).collect::<Vec<_>>())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| GENERIC_FORM_PAYLOADS.iter().map(|p| p.to_string()).collect())
}

/// STRIDE narrative, vulnerability list, exploitation plan, then queue
/// population.
pub struct ThreatModelExecutor;

#[async_trait]
impl StageExecutor for ThreatModelExecutor {
    fn stage(&self) -> StageName {
        StageName::ThreatModel
    }

    async fn execute(&self, state: &mut WorkflowState, ctx: &RunContext) -> Result<(), FlaghuntError> {
        let system = prompts::stage_system(
            "threat_model",
            "perform threat modeling to identify security vulnerabilities, analyze attack surfaces, prioritize threats, and generate specific attack vectors for exploitation",
        );
        let challenge = state.challenge.clone();
        let technologies = prompts::or_unknown(&state.technologies);
        let forms = prompts::forms_summary(&state.crawled_pages, false);

        let prompt = prompts::render(
            prompts::THREAT_MODEL,
            &[
                ("ID", &challenge.id),
                ("DESCRIPTION", &challenge.description),
                ("URL", &challenge.url),
                ("FLAG_FORMAT", &challenge.flag_format),
                ("ANALYSIS", state.source_analysis.as_deref().unwrap_or("No source analysis available")),
                ("TECHNOLOGIES", &technologies),
                ("PAGE_COUNT", &state.crawled_pages.len().to_string()),
                ("FORMS", &forms),
            ],
        );
        let narrative = match agent_pass(ctx, &system, &prompt).await? {
            Ok(text) => text,
            Err(message) => {
                state.stage_mut(StageName::ThreatModel).errors.push(message.clone());
                format!("Threat modeling failed: {}", message)
            }
        };
        state.threat_model = Some(narrative.clone());
        state.stage_mut(StageName::ThreatModel).set_progress(0.3);

        let prompt = prompts::render(
            prompts::IDENTIFY_VULNERABILITIES,
            &[
                ("THREAT_MODEL", &narrative),
                ("PAGES", &prompts::pages_summary(&state.crawled_pages, 10)),
                ("FORMS", &prompts::forms_summary(&state.crawled_pages, true)),
                ("TECHNOLOGIES", &technologies),
            ],
        );
        let identified = match ask_json::<Value>(ctx, &system, &prompt).await? {
            Reply::Parsed(value) => vulnerabilities_from(value),
            Reply::Unparsed(_) => None,
            Reply::Failed(message) => {
                state.stage_mut(StageName::ThreatModel).errors.push(message);
                None
            }
        };
        let identified = identified.unwrap_or_else(|| {
            warn!("Using default vulnerabilities");
            default_vulnerabilities(&state.crawled_pages)
        });

        let mut fresh = Vec::new();
        for vuln in identified {
            let known = state
                .vulnerabilities
                .iter()
                .any(|v| v.vulnerability_type == vuln.vulnerability_type && v.location == vuln.location);
            if !known {
                state.vulnerabilities.push(vuln.clone());
                fresh.push(vuln);
            }
        }
        state.stage_mut(StageName::ThreatModel).set_progress(0.6);

        let prompt = prompts::render(
            prompts::EXPLOITATION_PLAN,
            &[
                ("ID", &challenge.id),
                ("FLAG_FORMAT", &challenge.flag_format),
                ("VULNERABILITIES", &prompts::vulnerabilities_summary(&state.vulnerabilities)),
            ],
        );
        let plan = match ask_json::<Value>(ctx, &system, &prompt).await? {
            Reply::Parsed(plan) if plan.is_object() => plan,
            _ => default_exploitation_plan(),
        };

        // form-field tasks are generated on the first pass only
        let pages: &[CrawledPage] = if state.exploitation_plan.is_none() { &state.crawled_pages } else { &[] };
        let added = state.queue.populate(&fresh, pages, &form_payloads(&plan));
        state.exploitation_plan = Some(plan);

        let stage = state.stage_mut(StageName::ThreatModel);
        stage.set_progress(1.0);
        stage.log(format!("Identified {} new vulnerabilities, queued {} tasks", fresh.len(), added));
        info!(vulnerabilities = state.vulnerabilities.len(), queued = added, "Threat modeling completed");
        ctx.emit(WorkflowEvent::Message {
            text: format!(
                "{} vulnerabilities, {} exploitation tasks queued",
                state.vulnerabilities.len(),
                state.queue.len()
            ),
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::FlaghuntConfig;
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::LLMResponse;
    use crate::models::{Challenge, Form, FormField, PageInput};

    fn field(name: &str, ty: &str) -> FormField {
        FormField { name: name.into(), field_type: ty.into(), value: String::new(), required: false }
    }

    fn login_page() -> CrawledPage {
        let mut page = CrawledPage::new("http://t/login", 200);
        page.forms.push(Form {
            action: "http://t/auth".into(),
            method: "POST".into(),
            fields: vec![field("username", "text"), field("password", "password")],
        });
        page
    }

    #[test]
    fn test_default_vulnerabilities() {
        let mut upload = CrawledPage::new("http://t/upload", 200);
        upload.inputs.push(PageInput {
            name: "doc".into(),
            input_type: "file".into(),
            id: String::new(),
            placeholder: String::new(),
            value: String::new(),
        });
        let vulns = default_vulnerabilities(&[login_page(), upload]);
        assert_eq!(vulns.len(), 2);
        assert_eq!(vulns[0].vulnerability_type, "sql_injection");
        assert_eq!(vulns[0].location, "http://t/auth");
        assert_eq!(vulns[0].confidence, 0.7);
        assert_eq!(vulns[1].vulnerability_type, "file_upload");
        assert_eq!(vulns[1].location, "http://t/upload");
        assert_eq!(vulns[1].payload_suggestions, vec!["shell.php", "webshell.jsp"]);
    }

    #[test]
    fn test_vulnerabilities_from_shapes() {
        let array = json!([{"vulnerability_type": "xss", "location": "http://t/s", "confidence": 0.4}]);
        assert_eq!(vulnerabilities_from(array).unwrap().len(), 1);
        let wrapped = json!({"vulnerabilities": [{"vulnerability_type": "lfi", "location": "http://t/f"}, 7]});
        assert_eq!(vulnerabilities_from(wrapped).unwrap()[0].vulnerability_type, "lfi");
        assert!(vulnerabilities_from(json!({"other": 1})).is_none());
        assert!(vulnerabilities_from(json!("text")).is_none());
    }

    #[test]
    fn test_form_payloads_fallback() {
        assert_eq!(form_payloads(&json!({})).len(), GENERIC_FORM_PAYLOADS.len());
        assert_eq!(form_payloads(&json!({"payloads": {"sql_injection": ["x"]}})), vec!["x"]);
    }

    #[tokio::test]
    async fn test_threat_model_populates_queue() {
        let provider = Arc::new(ScriptedProvider::replies(vec![
            LLMResponse::text("STRIDE: spoofing via login form"),
            LLMResponse::text(
                "```json\n[{\"vulnerability_type\": \"sql_injection\", \"location\": \"http://t/auth\", \
                 \"confidence\": 0.9, \"attack_vectors\": [\"auth_bypass\"], \"payload_suggestions\": [\"admin' --\"]}]\n```",
            ),
            LLMResponse::text(r#"{"payloads": {"sql_injection": ["' OR 1=1--"]}}"#),
        ]));
        let ctx = RunContext::new(FlaghuntConfig::default(), provider);
        let mut state = WorkflowState::new(Challenge::new("http://t/", "x"));
        state.crawled_pages.push(login_page());

        ThreatModelExecutor.execute(&mut state, &ctx).await.unwrap();
        assert_eq!(state.threat_model.as_deref(), Some("STRIDE: spoofing via login form"));
        assert_eq!(state.vulnerabilities.len(), 1);
        // one vulnerability task plus one form task per named field
        assert_eq!(state.queue.len(), 3);
        let first = state.queue.peek().unwrap();
        assert_eq!(first.confidence, 0.9);
        assert_eq!(first.method, "POST");
        assert_eq!(state.progress(StageName::ThreatModel), 1.0);
    }

    #[tokio::test]
    async fn test_threat_model_falls_back_to_defaults() {
        let provider = Arc::new(ScriptedProvider::replies(vec![
            LLMResponse::text("narrative"),
            LLMResponse::text("I could not find anything"),
            LLMResponse::text("no plan"),
        ]));
        let ctx = RunContext::new(FlaghuntConfig::default(), provider);
        let mut state = WorkflowState::new(Challenge::new("http://t/", "x"));
        state.crawled_pages.push(login_page());

        ThreatModelExecutor.execute(&mut state, &ctx).await.unwrap();
        assert_eq!(state.vulnerabilities.len(), 1);
        assert_eq!(state.vulnerabilities[0].confidence, 0.7);
        assert_eq!(state.exploitation_plan.as_ref().unwrap()["priority_order"][0], "sql_injection");
        // 3 default payloads, then 2 fields x 3 generic payloads
        assert_eq!(state.queue.len(), 9);
    }
}
