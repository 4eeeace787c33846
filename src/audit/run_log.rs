use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::FlaghuntError;
use crate::pipeline::WorkflowEvent;

/// Append-only log of a run. Every event becomes one `[HH:MM:SS] message`
/// line in the log file and is forwarded to the observer channel, if any.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    path: Option<PathBuf>,
    tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()), tx: None }
    }

    /// A log that writes nowhere. Events still reach a channel added later.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn initialize(&self, challenge_id: &str) -> Result<(), FlaghuntError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let header = format!(
            "# flaghunt run log\n# Challenge: {}\n# Started: {}\n\n",
            challenge_id,
            Utc::now().to_rfc3339()
        );
        self.append(&header).await
    }

    /// Record an event. A failed file write is logged and otherwise ignored:
    /// the log must never abort a run.
    pub async fn record(&self, event: WorkflowEvent) {
        if self.path.is_some() {
            let line = format!("[{}] {}\n", Utc::now().format("%H:%M:%S"), event);
            if let Err(e) = self.append(&line).await {
                warn!(error = %e, "Failed to write run log");
            }
        }
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }

    async fn append(&self, text: &str) -> Result<(), FlaghuntError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
