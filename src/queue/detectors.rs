//! Per-family success heuristics. These are noisy hints recorded on each
//! attempt, never proof of exploitation; any family's detector can be
//! replaced through [`DetectorSet::with_detector`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::http::HttpResponse;
use crate::models::FuzzTask;
use super::decision::VulnType;
use super::executor::upload_file_for;

pub trait SuccessDetector: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, task: &FuzzTask, response: &HttpResponse) -> bool;
}

/// Matches when the lower-cased body contains any keyword.
pub struct KeywordDetector {
    name: String,
    keywords: Vec<String>,
}

impl KeywordDetector {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn sql_errors() -> Self {
        Self::new("sql_error_keywords", &[
            "mysql_fetch",
            "ora-01756",
            "microsoft ole db",
            "odbc sql server driver",
            "sqlite_master",
            "syntax error",
            "sql error",
            "database error",
            "welcome",
            "dashboard",
            "admin panel",
        ])
    }

    fn matches(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.keywords.iter().any(|k| body.contains(k.as_str()))
    }
}

impl SuccessDetector for KeywordDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, _task: &FuzzTask, response: &HttpResponse) -> bool {
        self.matches(&response.body)
    }
}

/// Redirect into a privileged area, or a logged-in page without failure text.
pub struct AuthBypassDetector;

const AUTH_REDIRECT_TARGETS: [&str; 4] = ["dashboard", "admin", "home", "profile"];
const AUTH_SUCCESS: [&str; 5] = ["welcome", "dashboard", "logout", "admin panel", "profile"];
const AUTH_FAILURE: [&str; 4] = ["login failed", "invalid", "error", "denied"];

impl SuccessDetector for AuthBypassDetector {
    fn name(&self) -> &str {
        "auth_redirect_or_keywords"
    }

    fn detect(&self, _task: &FuzzTask, response: &HttpResponse) -> bool {
        if matches!(response.status, 301..=303) {
            let location = response.header("location").unwrap_or_default().to_lowercase();
            if AUTH_REDIRECT_TARGETS.iter().any(|t| location.contains(t)) {
                return true;
            }
        }
        let body = response.body.to_lowercase();
        AUTH_SUCCESS.iter().any(|k| body.contains(k)) && !AUTH_FAILURE.iter().any(|k| body.contains(k))
    }
}

/// Upload acknowledged, or the uploaded filename echoed back.
pub struct UploadAckDetector;

impl SuccessDetector for UploadAckDetector {
    fn name(&self) -> &str {
        "upload_acknowledged"
    }

    fn detect(&self, task: &FuzzTask, response: &HttpResponse) -> bool {
        let body = response.body.to_lowercase();
        let filename = upload_file_for(&task.payload).filename.to_lowercase();
        ["uploaded successfully", "file uploaded", "upload complete", "saved to"]
            .iter()
            .any(|k| body.contains(k))
            || body.contains(&filename)
    }
}

/// Payload reflected verbatim in the response.
pub struct ReflectionDetector;

impl SuccessDetector for ReflectionDetector {
    fn name(&self) -> &str {
        "payload_reflected"
    }

    fn detect(&self, task: &FuzzTask, response: &HttpResponse) -> bool {
        !task.payload.is_empty() && response.body.contains(&task.payload)
    }
}

/// Output shaped like the command the payload ran.
pub struct CommandOutputDetector;

impl SuccessDetector for CommandOutputDetector {
    fn name(&self) -> &str {
        "command_output"
    }

    fn detect(&self, task: &FuzzTask, response: &HttpResponse) -> bool {
        let payload = task.payload.to_lowercase();
        let body = response.body.to_lowercase();
        if payload.contains("whoami") {
            ["root", "www-data", "apache", "nginx"].iter().any(|u| body.contains(u))
        } else if payload.contains("id") {
            body.contains("uid=")
        } else if payload.contains("ls") {
            [".txt", ".php", ".html", ".js"].iter().any(|ext| body.contains(ext))
        } else {
            false
        }
    }
}

pub struct StatusDetector {
    pub status: u16,
}

impl SuccessDetector for StatusDetector {
    fn name(&self) -> &str {
        "status_code"
    }

    fn detect(&self, _task: &FuzzTask, response: &HttpResponse) -> bool {
        response.status == self.status
    }
}

/// Named detector per executor family.
#[derive(Clone)]
pub struct DetectorSet {
    detectors: HashMap<VulnType, Arc<dyn SuccessDetector>>,
}

impl Default for DetectorSet {
    fn default() -> Self {
        let mut detectors: HashMap<VulnType, Arc<dyn SuccessDetector>> = HashMap::new();
        detectors.insert(VulnType::SqlInjection, Arc::new(KeywordDetector::sql_errors()));
        detectors.insert(VulnType::AuthBypass, Arc::new(AuthBypassDetector));
        detectors.insert(VulnType::FileUpload, Arc::new(UploadAckDetector));
        detectors.insert(VulnType::Xss, Arc::new(ReflectionDetector));
        detectors.insert(VulnType::CommandInjection, Arc::new(CommandOutputDetector));
        detectors.insert(VulnType::Generic, Arc::new(StatusDetector { status: 200 }));
        Self { detectors }
    }
}

impl DetectorSet {
    pub fn with_detector(mut self, family: VulnType, detector: Arc<dyn SuccessDetector>) -> Self {
        self.detectors.insert(family, detector);
        self
    }

    pub fn name_for(&self, family: VulnType) -> Option<&str> {
        self.detectors.get(&family).map(|d| d.name())
    }

    pub fn detect(&self, family: VulnType, task: &FuzzTask, response: &HttpResponse) -> bool {
        self.detectors
            .get(&family)
            .is_some_and(|d| d.detect(task, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn task(ty: &str, payload: &str) -> FuzzTask {
        FuzzTask {
            vulnerability_type: ty.into(),
            location: "http://t/".into(),
            attack_vector: "v".into(),
            payload: payload.into(),
            confidence: 0.5,
            method: "GET".into(),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn test_sql_keywords() {
        let d = KeywordDetector::sql_errors();
        assert!(d.detect(&task("sql", "'"), &HttpResponse::new(500, "You have an SQL Error near")));
        assert!(!d.detect(&task("sql", "'"), &HttpResponse::new(200, "plain page")));
    }

    #[test]
    fn test_auth_redirect() {
        let d = AuthBypassDetector;
        let t = task("auth", "admin' --");
        let redirect = HttpResponse::new(302, "").with_header("Location", "/Dashboard");
        assert!(d.detect(&t, &redirect));
        let bad_redirect = HttpResponse::new(302, "").with_header("Location", "/login?e=1");
        assert!(!d.detect(&t, &bad_redirect));
    }

    #[test]
    fn test_auth_keywords_require_no_failure_text() {
        let d = AuthBypassDetector;
        let t = task("auth", "x");
        assert!(d.detect(&t, &HttpResponse::new(200, "Welcome back! <a>Logout</a>")));
        assert!(!d.detect(&t, &HttpResponse::new(200, "Welcome. Invalid password")));
    }

    #[test]
    fn test_upload_ack_matches_filename() {
        let d = UploadAckDetector;
        assert!(d.detect(&task("upload", "shell.php"), &HttpResponse::new(200, "stored shell.php")));
        assert!(d.detect(&task("upload", "x.bin"), &HttpResponse::new(200, "File uploaded")));
        assert!(!d.detect(&task("upload", "shell.php"), &HttpResponse::new(200, "nope")));
    }

    #[test]
    fn test_reflection() {
        let d = ReflectionDetector;
        let payload = "<script>alert(1)</script>";
        assert!(d.detect(&task("xss", payload), &HttpResponse::new(200, &format!("q={}", payload))));
        assert!(!d.detect(&task("xss", payload), &HttpResponse::new(200, "&lt;script&gt;")));
    }

    #[test]
    fn test_command_output() {
        let d = CommandOutputDetector;
        assert!(d.detect(&task("cmd", "; whoami"), &HttpResponse::new(200, "www-data")));
        assert!(d.detect(&task("cmd", "; id"), &HttpResponse::new(200, "uid=33(www-data)")));
        assert!(d.detect(&task("cmd", "; ls"), &HttpResponse::new(200, "index.php\nflag.txt")));
        assert!(!d.detect(&task("cmd", "; cat"), &HttpResponse::new(200, "uid=0")));
    }

    struct Always(bool);

    impl SuccessDetector for Always {
        fn name(&self) -> &str {
            "always"
        }
        fn detect(&self, _task: &FuzzTask, _response: &HttpResponse) -> bool {
            self.0
        }
    }

    #[test]
    fn test_detector_replaceable() {
        let set = DetectorSet::default().with_detector(VulnType::Generic, Arc::new(Always(false)));
        assert_eq!(set.name_for(VulnType::Generic), Some("always"));
        assert!(!set.detect(VulnType::Generic, &task("x", "p"), &HttpResponse::new(200, "")));
        assert_eq!(set.name_for(VulnType::Xss), Some("payload_reflected"));
    }
}
