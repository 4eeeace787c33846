use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

/// Multipart file part.
#[derive(Debug, Clone, Serialize)]
pub struct UploadFile {
    pub field: String,
    pub filename: String,
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub enum RequestBody {
    None,
    /// `application/x-www-form-urlencoded`
    Form(BTreeMap<String, String>),
    Raw(String),
    Multipart {
        fields: BTreeMap<String, String>,
        file: UploadFile,
    },
}

/// Transport-neutral description of one outgoing request.
#[derive(Debug, Clone, Serialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: RequestBody,
    pub follow_redirects: bool,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: RequestBody::None,
            follow_redirects: true,
            timeout: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Send `params` as query string for GET-like methods, as a form body otherwise.
    pub fn with_params(self, params: BTreeMap<String, String>) -> Self {
        if matches!(self.method.as_str(), "GET" | "HEAD" | "DELETE") {
            self.with_query(params)
        } else {
            self.with_body(RequestBody::Form(params))
        }
    }

    pub fn snapshot(&self) -> Value {
        let params = match &self.body {
            RequestBody::Form(form) => json!(form),
            RequestBody::Multipart { fields, file } => json!({
                "fields": fields,
                "file": {"field": file.field, "filename": file.filename},
            }),
            RequestBody::Raw(raw) => json!(raw),
            RequestBody::None => json!(self.query),
        };
        json!({"method": self.method, "url": self.url, "params": params})
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub body: String,
    pub elapsed_ms: u64,
}

impl HttpResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self { status, body: body.to_string(), ..Default::default() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    pub fn snapshot(&self) -> Value {
        json!({
            "status": self.status,
            "url": self.url,
            "headers": self.headers,
            "body": self.body.chars().take(1000).collect::<String>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_params_routes_by_method() {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "1".to_string());

        let get = HttpRequest::get("http://t/item").with_params(params.clone());
        assert_eq!(get.query.len(), 1);
        assert!(matches!(get.body, RequestBody::None));

        let post = HttpRequest::new("post", "http://t/login").with_params(params);
        assert_eq!(post.method, "POST");
        assert!(matches!(post.body, RequestBody::Form(_)));
        assert_eq!(post.snapshot()["params"]["id"], "1");
    }

    #[test]
    fn test_response_header_lookup_case_insensitive() {
        let resp = HttpResponse::new(302, "").with_header("Location", "/dashboard");
        assert_eq!(resp.header("location"), Some("/dashboard"));
        assert!(resp.is_redirect());
    }
}
