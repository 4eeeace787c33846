use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use tracing::debug;

use crate::errors::FlaghuntError;
use super::types::{HttpRequest, HttpResponse, RequestBody};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// HTTP collaborator used by the crawler, the fetch tool and the exploit
/// executors.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FlaghuntError>;

    /// Cookies the session would send to `url`, as `name=value; ...`.
    fn cookie_header(&self, _url: &str) -> Option<String> {
        None
    }

    /// Merge cookies (e.g. from the browser) into the session.
    fn add_cookies(&self, _url: &str, _cookies: &BTreeMap<String, String>) {}
}

/// reqwest-backed session sharing one cookie jar across all requests.
pub struct HttpSession {
    follow: Client,
    no_follow: Client,
    jar: Arc<Jar>,
    user_agent: String,
    default_timeout: Duration,
}

impl HttpSession {
    pub fn new(user_agent: &str, default_timeout: Duration) -> Result<Self, FlaghuntError> {
        let jar = Arc::new(Jar::default());
        let build = |policy: Policy| {
            Client::builder()
                .cookie_provider(jar.clone())
                .redirect(policy)
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| FlaghuntError::DriverInit(format!("Failed to build HTTP client: {}", e)))
        };

        Ok(Self {
            follow: build(Policy::limited(10))?,
            no_follow: build(Policy::none())?,
            jar,
            user_agent: user_agent.to_string(),
            default_timeout,
        })
    }
}

#[async_trait]
impl HttpClient for HttpSession {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FlaghuntError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FlaghuntError::InvalidTarget(format!("Invalid HTTP method: {}", request.method)))?;
        let client = if request.follow_redirects { &self.follow } else { &self.no_follow };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout.unwrap_or(self.default_timeout));
        if !request.headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent")) {
            builder = builder.header("User-Agent", &self.user_agent);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::None => builder,
            RequestBody::Form(form) => builder.form(&form),
            RequestBody::Raw(raw) => builder.body(raw),
            RequestBody::Multipart { fields, file } => {
                let part = reqwest::multipart::Part::text(file.content)
                    .file_name(file.filename)
                    .mime_str(&file.content_type)
                    .map_err(|e| FlaghuntError::ExploitRequest(format!("Invalid content type: {}", e)))?;
                let mut form = reqwest::multipart::Form::new().part(file.field, part);
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                builder.multipart(form)
            }
        };

        let started = Instant::now();
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let mut headers = BTreeMap::new();
        for (name, value) in resp.headers() {
            headers.insert(name.as_str().to_lowercase(), value.to_str().unwrap_or_default().to_string());
        }
        let cookies = resp
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let body = resp.text().await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        debug!(status, url = %url, bytes = body.len(), elapsed_ms, "HTTP response");
        Ok(HttpResponse { status, url, headers, cookies, body, elapsed_ms })
    }

    fn cookie_header(&self, url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let value = self.jar.cookies(&parsed)?;
        value.to_str().ok().map(str::to_string)
    }

    fn add_cookies(&self, url: &str, cookies: &BTreeMap<String, String>) {
        let Ok(parsed) = url::Url::parse(url) else { return };
        for (name, value) in cookies {
            self.jar.add_cookie_str(&format!("{}={}", name, value), &parsed);
        }
    }
}
