use std::time::Duration;

use async_trait::async_trait;
use bollard::exec::{CreateExecOptions, StartExecResults};
use futures::StreamExt;
use tracing::debug;

use crate::errors::FlaghuntError;
use super::manager::ContainerManager;

/// Runs a shell command somewhere the scanning utilities live and returns
/// combined stdout and stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn exec(&self, command: &str, timeout_secs: u64) -> Result<String, FlaghuntError>;
}

fn preview(command: &str, max: usize) -> String {
    command.chars().take(max).collect()
}

#[async_trait]
impl CommandRunner for ContainerManager {
    async fn exec(&self, command: &str, timeout_secs: u64) -> Result<String, FlaghuntError> {
        debug!(command = %preview(command, 200), timeout_secs, "Executing in tool container");

        let exec = self
            .docker()
            .create_exec(
                self.container_name(),
                CreateExecOptions {
                    cmd: Some(vec!["bash", "-c", command]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| FlaghuntError::Container(format!("Failed to create exec: {}", e)))?;

        tokio::time::timeout(Duration::from_secs(timeout_secs), self.collect_exec_output(&exec.id))
            .await
            .map_err(|_| {
                FlaghuntError::Timeout(format!(
                    "Command timed out after {}s: {}",
                    timeout_secs,
                    preview(command, 100)
                ))
            })?
            .map_err(|e| FlaghuntError::Container(format!("Exec failed: {}", e)))
    }
}

impl ContainerManager {
    async fn collect_exec_output(&self, exec_id: &str) -> Result<String, bollard::errors::Error> {
        let mut collected = String::new();
        if let StartExecResults::Attached { mut output, .. } = self.docker().start_exec(exec_id, None).await? {
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(chunk) => collected.push_str(&chunk.to_string()),
                    Err(e) => {
                        collected.push_str(&format!("\n[exec error: {}]", e));
                        break;
                    }
                }
            }
        }
        Ok(collected)
    }
}
