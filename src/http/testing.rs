//! Deterministic HTTP stand-in for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::FlaghuntError;
use super::client::HttpClient;
use super::types::{HttpRequest, HttpResponse};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, FlaghuntError> + Send + Sync>;

/// Answers each request through a handler closure and records every request.
pub struct ScriptedHttp {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
    cookies: Mutex<BTreeMap<String, String>>,
}

impl ScriptedHttp {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, FlaghuntError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            cookies: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fixed pages keyed by exact URL (query string excluded); anything else is a 404.
    pub fn pages(pages: Vec<(&str, HttpResponse)>) -> Self {
        let table: BTreeMap<String, HttpResponse> = pages
            .into_iter()
            .map(|(url, resp)| (url.to_string(), resp))
            .collect();
        Self::new(move |req| {
            Ok(table
                .get(&req.url)
                .cloned()
                .map(|mut r| {
                    r.url = req.url.clone();
                    r
                })
                .unwrap_or_else(|| HttpResponse::new(404, "Not Found")))
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FlaghuntError> {
        let result = (self.handler)(&request);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
        result
    }

    fn cookie_header(&self, _url: &str) -> Option<String> {
        let cookies = self.cookies.lock().ok()?;
        if cookies.is_empty() {
            return None;
        }
        Some(cookies.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("; "))
    }

    fn add_cookies(&self, _url: &str, cookies: &BTreeMap<String, String>) {
        if let Ok(mut jar) = self.cookies.lock() {
            jar.extend(cookies.clone());
        }
    }
}
