//! Run-scoped collaborators. One [`RunContext`] is built per run and passed
//! by reference to every stage and tool. Sessions are acquired on first use
//! and released once by [`RunContext::close`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::audit::RunLog;
use crate::browser::BrowserSession;
use crate::config::FlaghuntConfig;
use crate::container::{CommandRunner, ContainerManager};
use crate::errors::FlaghuntError;
use crate::http::{HttpClient, HttpSession};
use crate::llm::{LLMProvider, LLMResponse, Message, RateLimitedInvoker, ToolDefinition};
use crate::pipeline::WorkflowEvent;

pub struct RunContext {
    config: FlaghuntConfig,
    run_id: String,
    llm: Arc<dyn LLMProvider>,
    invoker: RateLimitedInvoker,
    log: RunLog,
    http: OnceCell<Arc<dyn HttpClient>>,
    runner: OnceCell<Arc<dyn CommandRunner>>,
    browser: OnceCell<BrowserSession>,
    closed: AtomicBool,
}

impl RunContext {
    pub fn new(config: FlaghuntConfig, llm: Arc<dyn LLMProvider>) -> Self {
        let invoker = RateLimitedInvoker::new(config.llm.max_invoke_attempts);
        Self {
            config,
            run_id: uuid::Uuid::new_v4().to_string(),
            llm,
            invoker,
            log: RunLog::disabled(),
            http: OnceCell::new(),
            runner: OnceCell::new(),
            browser: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = run_id.to_string();
        self
    }

    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = log;
        self
    }

    /// Use a ready-made HTTP collaborator instead of building a session.
    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = OnceCell::new_with(Some(http));
        self
    }

    /// Use a ready-made command runner instead of the tool container.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = OnceCell::new_with(Some(runner));
        self
    }

    pub fn config(&self) -> &FlaghuntConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn llm(&self) -> &dyn LLMProvider {
        self.llm.as_ref()
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub async fn emit(&self, event: WorkflowEvent) {
        self.log.record(event).await;
    }

    /// One model call through the rate-limited invoker.
    pub async fn invoke(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LLMResponse, FlaghuntError> {
        self.invoker.invoke(self.llm.as_ref(), messages, tools).await
    }

    pub async fn http(&self) -> Result<Arc<dyn HttpClient>, FlaghuntError> {
        self.ensure_open()?;
        let http = self
            .http
            .get_or_try_init(|| async {
                let crawler = &self.config.crawler;
                debug!(user_agent = %crawler.user_agent, "Creating HTTP session");
                let session = HttpSession::new(&crawler.user_agent, Duration::from_secs(crawler.timeout_secs))?;
                Ok::<_, FlaghuntError>(Arc::new(session) as Arc<dyn HttpClient>)
            })
            .await?;
        Ok(http.clone())
    }

    pub async fn runner(&self) -> Result<Arc<dyn CommandRunner>, FlaghuntError> {
        self.ensure_open()?;
        let runner = self
            .runner
            .get_or_try_init(|| async {
                let manager = ContainerManager::new(&self.config.container)?;
                manager.ensure_running().await?;
                Ok::<_, FlaghuntError>(Arc::new(manager) as Arc<dyn CommandRunner>)
            })
            .await?;
        Ok(runner.clone())
    }

    /// The browser session, created on first use. Any failure to obtain the
    /// tool container surfaces as a driver-initialization error.
    pub async fn browser(&self) -> Result<&BrowserSession, FlaghuntError> {
        self.ensure_open()?;
        self.browser
            .get_or_try_init(|| async {
                let runner = self.runner().await.map_err(|e| match e {
                    FlaghuntError::DriverInit(_) => e,
                    other => FlaghuntError::DriverInit(format!("Browser unavailable: {}", other)),
                })?;
                Ok::<_, FlaghuntError>(BrowserSession::new(runner, &self.run_id, &self.config.crawler.user_agent))
            })
            .await
    }

    /// The browser session if one has already been acquired.
    pub fn active_browser(&self) -> Option<&BrowserSession> {
        self.browser.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Release run-scoped sessions. Only the first call does anything.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(browser) = self.browser.get() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Failed to close browser session");
            }
        }
        info!(run_id = %self.run_id, "Run context released");
    }

    fn ensure_open(&self) -> Result<(), FlaghuntError> {
        if self.is_closed() {
            return Err(FlaghuntError::Internal("run context already released".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testing::ScriptedRunner;
    use crate::http::testing::ScriptedHttp;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::llm::testing::ScriptedProvider;

    fn context() -> RunContext {
        RunContext::new(FlaghuntConfig::default(), Arc::new(ScriptedProvider::replies(vec![])))
            .with_run_id("run1")
    }

    #[tokio::test]
    async fn test_injected_http_is_used() {
        let http = Arc::new(ScriptedHttp::new(|_| Ok(HttpResponse::new(204, ""))));
        let ctx = context().with_http(http.clone());
        let client = ctx.http().await.unwrap();
        let resp = client.send(HttpRequest::get("http://t/")).await.unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(http.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_browser_is_lazy_and_close_is_idempotent() {
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(String::new())));
        let ctx = context().with_runner(runner.clone());
        assert!(ctx.active_browser().is_none());
        ctx.browser().await.unwrap();
        assert!(ctx.active_browser().is_some());
        // never started, so closing sends nothing to the container
        ctx.close().await;
        ctx.close().await;
        assert!(runner.commands().is_empty());
        assert!(ctx.is_closed());
    }

    #[tokio::test]
    async fn test_closed_context_refuses_sessions() {
        let ctx = context().with_http(Arc::new(ScriptedHttp::new(|_| Ok(HttpResponse::new(200, "")))));
        ctx.close().await;
        assert!(matches!(ctx.http().await, Err(FlaghuntError::Internal(_))));
    }
}
