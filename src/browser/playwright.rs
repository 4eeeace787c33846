use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::container::CommandRunner;
use crate::errors::FlaghuntError;
use super::actions::{
    BrowserCommand, BrowserCookie, ConsoleEntry, FoundElements, PageSnapshot, SelectorKind,
};

const WORK_DIR: &str = "/tmp/pw";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(45);
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Resident Node.js server keeping one Chromium page alive. Commands arrive as
/// JSON in a pending file; replies are `{"ok": ...}` or `{"error": "..."}`
/// written atomically to a result file.
const SERVER_SCRIPT: &str = r#"const fs = require('fs');
const pw = require('playwright');

const PENDING = '/tmp/pw/pending___SID__';
const RESULT = '/tmp/pw/result___SID__';
const READY = '/tmp/pw/ready___SID__';

(async () => {
  const browser = await pw.chromium.launch({headless: true, args: ['--no-sandbox', '--disable-dev-shm-usage']});
  const context = await browser.newContext({ignoreHTTPSErrors: true, userAgent: '__UA__'});
  const page = await context.newPage();
  const consoleEntries = [];
  page.on('console', m => consoleEntries.push({level: m.type().toUpperCase(), message: m.text(), timestamp: Date.now()}));
  page.on('pageerror', e => consoleEntries.push({level: 'ERROR', message: e.message, timestamp: Date.now()}));
  const snapshot = async () => ({url: page.url(), title: await page.title(), html: await page.content(), cookies: await context.cookies()});

  fs.writeFileSync(READY, 'ready');

  while (true) {
    if (fs.existsSync(PENDING)) {
      const raw = fs.readFileSync(PENDING, 'utf-8').trim();
      fs.unlinkSync(PENDING);
      if (raw === 'QUIT') {
        await browser.close();
        process.exit(0);
      }
      let reply;
      try {
        const cmd = JSON.parse(raw);
        let result = null;
        switch (cmd.action) {
          case 'navigate':
            await page.goto(cmd.url, {waitUntil: 'domcontentloaded', timeout: 30000});
            await page.waitForTimeout(2000);
            result = await snapshot();
            break;
          case 'find': {
            const loc = page.locator(cmd.selector);
            const total = await loc.count();
            const elements = [];
            for (let i = 0; i < Math.min(total, cmd.limit); i++) {
              elements.push(await loc.nth(i).evaluate(el => ({
                tag: el.tagName.toLowerCase(),
                text: (el.innerText || '').slice(0, 200),
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
              })));
            }
            result = {total, elements};
            break;
          }
          case 'click':
            await page.locator(cmd.selector).first().click({timeout: 10000});
            await page.waitForTimeout(1000);
            result = page.url();
            break;
          case 'fill':
            await page.locator(cmd.selector).first().fill(cmd.value, {timeout: 10000});
            result = 'filled';
            break;
          case 'evaluate': {
            const src = cmd.js.includes('return') ? `(() => { ${cmd.js} })()` : cmd.js;
            const r = await page.evaluate(src);
            result = r === undefined ? null : r;
            break;
          }
          case 'snapshot':
            result = await snapshot();
            break;
          case 'cookies':
            result = await context.cookies();
            break;
          case 'console_logs':
            result = consoleEntries.splice(0);
            break;
          default:
            throw new Error('unknown action ' + cmd.action);
        }
        reply = {ok: result};
      } catch (e) {
        reply = {error: e.message};
      }
      fs.writeFileSync(RESULT + '.tmp', JSON.stringify(reply));
      fs.renameSync(RESULT + '.tmp', RESULT);
    }
    await new Promise(r => setTimeout(r, 100));
  }
})();
"#;

/// Browser-automation session driven inside the tool container. The server
/// is started on first use; cookies and DOM state persist across commands.
pub struct BrowserSession {
    runner: Arc<dyn CommandRunner>,
    session_id: String,
    user_agent: String,
    initialized: Mutex<bool>,
}

impl BrowserSession {
    pub fn new(runner: Arc<dyn CommandRunner>, session_id: &str, user_agent: &str) -> Self {
        Self {
            runner,
            session_id: session_id.to_string(),
            user_agent: user_agent.to_string(),
            initialized: Mutex::new(false),
        }
    }

    fn path(&self, kind: &str) -> String {
        format!("{}/{}_{}", WORK_DIR, kind, self.session_id)
    }

    fn server_script(&self) -> String {
        SERVER_SCRIPT
            .replace("__SID__", &self.session_id)
            .replace("__UA__", &self.user_agent.replace('\'', "\\'"))
    }

    async fn ensure_initialized(&self) -> Result<(), FlaghuntError> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        let script_path = format!("{}/server_{}.js", WORK_DIR, self.session_id);
        let write_cmd = format!(
            "mkdir -p {dir} && cat > {path} <<'FLAGHUNT_EOF'\n{script}\nFLAGHUNT_EOF",
            dir = WORK_DIR,
            path = script_path,
            script = self.server_script(),
        );
        self.runner
            .exec(&write_cmd, 10)
            .await
            .map_err(|e| FlaghuntError::DriverInit(format!("Failed to install browser server: {}", e)))?;

        let start_cmd = format!(
            "cd {} && rm -f {} && nohup node {} > {} 2>&1 &",
            WORK_DIR,
            self.path("ready"),
            script_path,
            self.path("log"),
        );
        self.runner
            .exec(&start_cmd, 15)
            .await
            .map_err(|e| FlaghuntError::DriverInit(format!("Failed to start browser server: {}", e)))?;

        let ready_cmd = format!("test -f {} && echo ready", self.path("ready"));
        let started = Instant::now();
        loop {
            if let Ok(out) = self.runner.exec(&ready_cmd, 5).await {
                if out.trim() == "ready" {
                    break;
                }
            }
            if started.elapsed() > STARTUP_TIMEOUT {
                return Err(FlaghuntError::DriverInit(format!(
                    "Browser server did not become ready within {}s",
                    STARTUP_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        info!(session = %self.session_id, "Browser session started");
        *initialized = true;
        Ok(())
    }

    async fn send(&self, command: &BrowserCommand) -> Result<Value, FlaghuntError> {
        self.ensure_initialized().await?;

        let payload = serde_json::to_string(command)?;
        debug!(command = %payload.chars().take(200).collect::<String>(), "Browser command");
        let write_cmd = format!(
            "cat > {} <<'FLAGHUNT_EOF'\n{}\nFLAGHUNT_EOF",
            self.path("pending"),
            payload
        );
        self.runner.exec(&write_cmd, 5).await?;

        let result_path = self.path("result");
        let read_cmd = format!("cat {p} 2>/dev/null && rm -f {p}", p = result_path);
        let started = Instant::now();
        loop {
            if started.elapsed() > COMMAND_TIMEOUT {
                return Err(FlaghuntError::Timeout("Browser command timed out".into()));
            }
            match self.runner.exec(&read_cmd, 5).await {
                Ok(out) if !out.trim().is_empty() => return parse_reply(&out),
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    async fn send_as<T: DeserializeOwned>(&self, command: &BrowserCommand) -> Result<T, FlaghuntError> {
        let value = self.send(command).await?;
        serde_json::from_value(value).map_err(|e| FlaghuntError::Browser(format!("Unexpected browser reply: {}", e)))
    }

    pub async fn navigate(&self, url: &str) -> Result<PageSnapshot, FlaghuntError> {
        self.send_as(&BrowserCommand::Navigate { url: url.to_string() }).await
    }

    pub async fn find(&self, selector: &str, kind: SelectorKind, limit: usize) -> Result<FoundElements, FlaghuntError> {
        self.send_as(&BrowserCommand::Find { selector: kind.qualify(selector), limit }).await
    }

    /// Click the first match and return the URL afterwards.
    pub async fn click(&self, selector: &str, kind: SelectorKind) -> Result<String, FlaghuntError> {
        self.send_as(&BrowserCommand::Click { selector: kind.qualify(selector) }).await
    }

    pub async fn fill(&self, selector: &str, kind: SelectorKind, value: &str) -> Result<(), FlaghuntError> {
        self.send(&BrowserCommand::Fill { selector: kind.qualify(selector), value: value.to_string() })
            .await
            .map(|_| ())
    }

    pub async fn evaluate(&self, js: &str) -> Result<Value, FlaghuntError> {
        self.send(&BrowserCommand::Evaluate { js: js.to_string() }).await
    }

    pub async fn snapshot(&self) -> Result<PageSnapshot, FlaghuntError> {
        self.send_as(&BrowserCommand::Snapshot).await
    }

    pub async fn cookies(&self) -> Result<Vec<BrowserCookie>, FlaghuntError> {
        self.send_as(&BrowserCommand::Cookies).await
    }

    /// Drains the console entries captured since the last call.
    pub async fn console_logs(&self) -> Result<Vec<ConsoleEntry>, FlaghuntError> {
        self.send_as(&BrowserCommand::ConsoleLogs).await
    }

    pub async fn is_started(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Stop the server. A session that never started is left alone.
    pub async fn close(&self) -> Result<(), FlaghuntError> {
        let mut initialized = self.initialized.lock().await;
        if !*initialized {
            return Ok(());
        }
        let quit = format!("echo QUIT > {}", self.path("pending"));
        let result = self.runner.exec(&quit, 5).await.map(|_| ());
        *initialized = false;
        info!(session = %self.session_id, "Browser session closed");
        result
    }
}

fn parse_reply(raw: &str) -> Result<Value, FlaghuntError> {
    let reply: Value = serde_json::from_str(raw.trim())
        .map_err(|e| FlaghuntError::Browser(format!("Malformed browser reply: {}", e)))?;
    if let Some(err) = reply.get("error").and_then(Value::as_str) {
        return Err(FlaghuntError::Browser(err.to_string()));
    }
    Ok(reply.get("ok").cloned().unwrap_or(Value::Null))
}
