use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::browser::{BrowserCookie, ConsoleEntry, SelectorKind};
use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::http::{HttpRequest, RequestBody};
use crate::llm::{ToolCall, ToolDefinition};
use crate::pipeline::WorkflowEvent;
use super::definitions::{self, *};
use super::scanners;
use super::{truncate_chars, ToolExecutor};

const NAVIGATE_SOURCE_LIMIT: usize = 100_000;
const FETCH_BODY_LIMIT: usize = 10_000;
const FILE_CONTENT_LIMIT: usize = 100_000;
const MAX_ELEMENTS: usize = 10;

const CONSOLE_CAPTURE_JS: &str = r#"if (!window.consoleCapture) {
  window.consoleCapture = [];
  for (const level of ['log', 'error', 'warn', 'info']) {
    const original = console[level];
    console[level] = function(...args) {
      window.consoleCapture.push({level: level.toUpperCase(), message: args.join(' '), timestamp: Date.now()});
      original.apply(console, args);
    };
  }
}
return window.consoleCapture || [];"#;

/// The eleven tools of the agent loop, backed by the run context's browser,
/// HTTP session and tool container.
///
/// Tool failures come back as text so the model can adapt. Only fatal errors
/// (e.g. the browser driver could not start) are returned as `Err`.
pub struct Toolbox<'a> {
    ctx: &'a RunContext,
}

impl<'a> Toolbox<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    async fn navigate(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(url) = arg(call, "url") else { return Ok(missing("url")) };
        info!(url = %url, "Navigating");
        let browser = self.ctx.browser().await?;
        match browser.navigate(url).await {
            Ok(page) => Ok(format!(
                "\nURL: {}\nTitle: {}\nCookies: {}\nPage Source (first {} chars): {}\n",
                page.url,
                page.title,
                cookies_text(&page.cookies),
                NAVIGATE_SOURCE_LIMIT,
                truncate_chars(&page.html, NAVIGATE_SOURCE_LIMIT),
            )),
            Err(e) => recover(e, |e| format!("Error navigating to URL: {}", e)),
        }
    }

    async fn find_elements(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(selector) = arg(call, "selector") else { return Ok(missing("selector")) };
        let kind = match selector_kind(call) {
            Ok(kind) => kind,
            Err(text) => return Ok(text),
        };
        let browser = self.ctx.browser().await?;
        match browser.find(selector, kind, MAX_ELEMENTS).await {
            Ok(found) if found.total == 0 || found.elements.is_empty() => {
                Ok(format!("No elements found with selector: {}", selector))
            }
            Ok(found) => {
                let mut out = format!("Found {} elements:\n", found.total);
                for (i, el) in found.elements.iter().take(MAX_ELEMENTS).enumerate() {
                    out.push_str(&format!(
                        "\nElement {}:\n  Tag: {}\n  Text: {}\n  Attributes: {}\n",
                        i + 1,
                        el.tag,
                        truncate_chars(&el.text, 200),
                        serde_json::to_string(&el.attributes).unwrap_or_default(),
                    ));
                }
                Ok(out)
            }
            Err(e) => recover(e, |e| format!("Error finding elements: {}", e)),
        }
    }

    async fn click_element(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(selector) = arg(call, "selector") else { return Ok(missing("selector")) };
        let kind = match selector_kind(call) {
            Ok(kind) => kind,
            Err(text) => return Ok(text),
        };
        let browser = self.ctx.browser().await?;
        match browser.click(selector, kind).await {
            Ok(url) => Ok(format!("Successfully clicked element. Current URL: {}", url)),
            Err(e) if is_wait_failure(&e) => Ok(format!("Element not found or not clickable: {}", selector)),
            Err(e) => recover(e, |e| format!("Error clicking element: {}", e)),
        }
    }

    async fn fill_field(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(selector) = arg(call, "selector") else { return Ok(missing("selector")) };
        let Some(value) = arg(call, "value") else { return Ok(missing("value")) };
        let kind = match selector_kind(call) {
            Ok(kind) => kind,
            Err(text) => return Ok(text),
        };
        let browser = self.ctx.browser().await?;
        match browser.fill(selector, kind, value).await {
            Ok(()) => Ok(format!("Successfully filled form field with value: {}", value)),
            Err(e) if is_wait_failure(&e) => Ok(format!("Form field not found: {}", selector)),
            Err(e) => recover(e, |e| format!("Error filling form field: {}", e)),
        }
    }

    async fn run_script(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(code) = arg(call, "code") else { return Ok(missing("code")) };
        debug!(chars = code.len(), "Executing JavaScript");
        let browser = self.ctx.browser().await?;
        match browser.evaluate(code).await {
            Ok(result) => Ok(format!("JavaScript executed successfully. Result: {}", value_text(&result))),
            Err(e) => recover(e, |e| format!("Error executing JavaScript: {}", e)),
        }
    }

    async fn get_page_state(&self) -> Result<String, FlaghuntError> {
        let browser = self.ctx.browser().await?;
        match browser.snapshot().await {
            Ok(page) => {
                let rule = "-".repeat(50);
                Ok(format!(
                    "\nCurrent URL: {}\nTitle: {}\nCookies: {}\n\n\nFULL HTML SOURCE:\n{}\n{}\n{}\n",
                    page.url,
                    page.title,
                    cookies_text(&page.cookies),
                    rule,
                    page.html,
                    rule,
                ))
            }
            Err(e) => recover(e, |e| format!("Error getting page info: {}", e)),
        }
    }

    async fn fetch(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(url) = arg(call, "url") else { return Ok(missing("url")) };
        let method = arg(call, "method").filter(|m| !m.trim().is_empty()).unwrap_or("GET");
        info!(url = %url, method = %method, "Fetching contents");

        let http = match self.ctx.http().await {
            Ok(http) => http,
            Err(e) => return recover(e, |e| format!("Error fetching contents: {}", e)),
        };
        if let Some(cookies) = self.browser_cookies().await {
            let jar: BTreeMap<String, String> = cookies.into_iter().map(|c| (c.name, c.value)).collect();
            debug!(count = jar.len(), "Using browser session cookies");
            http.add_cookies(url, &jar);
        }

        let mut request = HttpRequest::new(method, url)
            .with_timeout(Duration::from_secs(self.ctx.config().tools.fetch_timeout_secs));
        if let Some(headers) = call.arguments.get("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                request = request.with_header(name, &value_text(value));
            }
        }
        if let Some(body) = arg(call, "body") {
            request = request.with_body(RequestBody::Raw(body.to_string()));
        }

        let cookies_used = http.cookie_header(url).unwrap_or_default();
        match http.send(request).await {
            Ok(resp) => Ok(format!(
                "\nStatus Code: {}\nURL: {}\nRequest Cookies Used: {}\nResponse Cookies: {}\nResponse Headers: {}\n\nContent (first {} characters):\n{}\n",
                resp.status,
                resp.url,
                cookies_used,
                serde_json::to_string(&resp.cookies).unwrap_or_default(),
                serde_json::to_string(&resp.headers).unwrap_or_default(),
                FETCH_BODY_LIMIT,
                truncate_chars(&resp.body, FETCH_BODY_LIMIT),
            )),
            Err(e) => recover(e, |e| format!("Error fetching contents: {}", e)),
        }
    }

    async fn get_console_logs(&self) -> Result<String, FlaghuntError> {
        let browser = self.ctx.browser().await?;
        let primary = match browser.console_logs().await {
            Ok(entries) if entries.is_empty() => return Ok("No console logs found.".into()),
            Ok(entries) => return Ok(console_text("console log entries", &entries)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        warn!(error = %primary, "Console log capture failed, trying script fallback");
        match browser.evaluate(CONSOLE_CAPTURE_JS).await {
            Ok(value) => {
                let entries: Vec<ConsoleEntry> = serde_json::from_value(value).unwrap_or_default();
                if entries.is_empty() {
                    Ok(format!(
                        "No console logs available. Console logging has been enabled for future messages. Error accessing browser logs: {}",
                        primary
                    ))
                } else {
                    Ok(console_text("captured console messages", &entries))
                }
            }
            Err(e) => recover(e, |e| format!("Error getting console logs: {}. Fallback error: {}", primary, e)),
        }
    }

    async fn read_local_file(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(path) = arg(call, "path") else { return Ok(missing("path")) };
        info!(path = %path, "Reading local file");
        Ok(read_confined(&self.ctx.config().agent.files_dir, path).await)
    }

    async fn run_content_discovery(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(url) = arg(call, "url") else { return Ok(missing("url")) };
        let Some(wordlist) = arg(call, "wordlist") else { return Ok(missing("wordlist")) };
        let options = arg(call, "options").unwrap_or_default();
        let timeout = self.ctx.config().tools.discovery_timeout_secs;

        let runner = match self.ctx.runner().await {
            Ok(runner) => runner,
            Err(e) => return recover(e, |e| format!("An unexpected error occurred: {}", e)),
        };
        let cookies = self.session_cookie_header(url).await;
        let command = scanners::ffuf_command(url, wordlist, cookies.as_deref(), options);
        info!(command = %command, "Running content discovery");
        match runner.exec(&command, timeout).await {
            Ok(output) => Ok(scanners::missing_binary("ffuf", &output)
                .unwrap_or_else(|| scanners::summarize_ffuf(&output, wordlist))),
            Err(e) => recover(e, |e| scanners::scanner_error("ffuf", e, timeout)),
        }
    }

    async fn run_injection_scan(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        let Some(url) = arg(call, "url") else { return Ok(missing("url")) };
        let options = arg(call, "options").unwrap_or_default();
        let timeout = self.ctx.config().tools.scan_timeout_secs;

        let runner = match self.ctx.runner().await {
            Ok(runner) => runner,
            Err(e) => return recover(e, |e| format!("An unexpected error occurred: {}", e)),
        };
        let cookies = self.session_cookie_header(url).await;
        let command = scanners::sqlmap_command(url, cookies.as_deref(), options);
        info!(command = %command, "Running injection scan");
        match runner.exec(&command, timeout).await {
            Ok(output) => Ok(scanners::missing_binary("sqlmap", &output)
                .unwrap_or_else(|| scanners::summarize_sqlmap(&output, url))),
            Err(e) => recover(e, |e| scanners::scanner_error("sqlmap", e, timeout)),
        }
    }

    /// Cookies of a browser session that has already started.
    async fn browser_cookies(&self) -> Option<Vec<BrowserCookie>> {
        let browser = self.ctx.active_browser()?;
        if !browser.is_started().await {
            return None;
        }
        match browser.cookies().await {
            Ok(cookies) => Some(cookies),
            Err(e) => {
                warn!(error = %e, "Could not read browser cookies");
                None
            }
        }
    }

    /// Browser cookies when a browser is running, else the HTTP session's.
    async fn session_cookie_header(&self, url: &str) -> Option<String> {
        if let Some(cookies) = self.browser_cookies().await {
            return Some(crate::browser::actions::cookie_header(&cookies));
        }
        let http = self.ctx.http().await.ok()?;
        http.cookie_header(url)
    }
}

#[async_trait]
impl ToolExecutor for Toolbox<'_> {
    fn definitions(&self) -> Vec<ToolDefinition> {
        definitions::all()
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, FlaghuntError> {
        self.ctx.emit(WorkflowEvent::ToolInvoked { name: call.name.clone() }).await;
        let started = Instant::now();
        let result = match call.name.as_str() {
            NAVIGATE => self.navigate(call).await,
            FIND_ELEMENTS => self.find_elements(call).await,
            CLICK_ELEMENT => self.click_element(call).await,
            FILL_FIELD => self.fill_field(call).await,
            RUN_SCRIPT => self.run_script(call).await,
            GET_PAGE_STATE => self.get_page_state().await,
            FETCH => self.fetch(call).await,
            GET_CONSOLE_LOGS => self.get_console_logs().await,
            READ_LOCAL_FILE => self.read_local_file(call).await,
            RUN_CONTENT_DISCOVERY => self.run_content_discovery(call).await,
            RUN_INJECTION_SCAN => self.run_injection_scan(call).await,
            other => Ok(format!("Error: unknown tool '{}'", other)),
        };
        debug!(tool = %call.name, elapsed_ms = started.elapsed().as_millis() as u64, "Tool finished");
        result
    }
}

fn arg<'v>(call: &'v ToolCall, key: &str) -> Option<&'v str> {
    call.arguments.get(key).and_then(Value::as_str)
}

fn missing(key: &str) -> String {
    format!("Error: missing required argument '{}'", key)
}

fn selector_kind(call: &ToolCall) -> Result<SelectorKind, String> {
    let raw = arg(call, "selector_type").unwrap_or("css");
    SelectorKind::parse(raw).ok_or_else(|| format!("Invalid selector type: {}. Use 'css' or 'xpath'", raw))
}

/// Fatal errors propagate; anything else becomes the tool's text result.
fn recover(error: FlaghuntError, render: impl FnOnce(&FlaghuntError) -> String) -> Result<String, FlaghuntError> {
    if error.is_fatal() {
        Err(error)
    } else {
        Ok(render(&error))
    }
}

/// Playwright reports a missing or hidden element as a wait timeout.
fn is_wait_failure(error: &FlaghuntError) -> bool {
    matches!(error, FlaghuntError::Browser(msg) if msg.contains("Timeout") || msg.contains("waiting for"))
}

fn cookies_text(cookies: &[BrowserCookie]) -> String {
    serde_json::to_string(cookies).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn console_text(label: &str, entries: &[ConsoleEntry]) -> String {
    let mut out = format!("Found {} {}:\n\n", entries.len(), label);
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "Entry {}:\n  Level: {}\n  Message: {}\n  Timestamp: {}\n\n",
            i + 1,
            entry.level,
            entry.message,
            value_text(&entry.timestamp),
        ));
    }
    out
}

/// Lexical normalization: resolves `.` and `..` without touching the
/// file system.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Read a file that must live under `base`. Relative paths are tried against
/// the working directory first, then against `base` itself.
async fn read_confined(base: &Path, requested: &str) -> String {
    const DENIED: &str = "Error: Access denied. You can only read files in the 'files/' directory.";

    let base_abs = normalize(base);
    let requested_path = Path::new(requested);
    let mut candidates = vec![normalize(requested_path)];
    if requested_path.is_relative() {
        candidates.push(normalize(&base_abs.join(requested_path)));
    }
    let Some(target) = candidates.into_iter().find(|c| c.starts_with(&base_abs)) else {
        warn!(path = %requested, "Rejected file read outside the files directory");
        return DENIED.into();
    };

    if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
        return format!("Error: File not found: {}", requested);
    }
    // symlinks must not lead out of the directory either
    if let (Ok(real_target), Ok(real_base)) = (
        tokio::fs::canonicalize(&target).await,
        tokio::fs::canonicalize(&base_abs).await,
    ) {
        if !real_target.starts_with(&real_base) {
            return DENIED.into();
        }
    }

    match tokio::fs::read(&target).await {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes);
            if content.chars().count() > FILE_CONTENT_LIMIT {
                format!(
                    "File content (first {} chars):\n{}\n...(truncated)",
                    FILE_CONTENT_LIMIT,
                    truncate_chars(&content, FILE_CONTENT_LIMIT)
                )
            } else {
                content.into_owned()
            }
        }
        Err(e) => format!("Error reading file: {}", e),
    }
}
