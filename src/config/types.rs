use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::http::DEFAULT_USER_AGENT;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FlaghuntConfig {
    pub llm: LLMConfig,
    pub crawler: CrawlerConfig,
    pub fuzzer: FuzzerConfig,
    pub workflow: WorkflowConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub container: ContainerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: String,
    pub model: Option<String>,
    /// Literal key or `$VAR` reference.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub token_ceiling: usize,
    pub max_invoke_attempts: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            token_ceiling: 200_000,
            max_invoke_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub max_depth: u32,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub batch_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_pages: 50,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FuzzerConfig {
    pub max_attempts: usize,
    pub exploit_timeout_secs: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self { max_attempts: 100, exploit_timeout_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub page_floor: usize,
    pub vulnerability_floor: usize,
    pub max_stage_iterations: u32,
    pub max_steps: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            page_floor: 10,
            vulnerability_floor: 3,
            max_stage_iterations: 3,
            max_steps: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_messages: usize,
    pub files_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_messages: 40, files_dir: PathBuf::from("files") }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub fetch_timeout_secs: u64,
    pub discovery_timeout_secs: u64,
    pub scan_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 10,
            discovery_timeout_secs: 300,
            scan_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContainerConfig {
    pub image: Option<String>,
    pub name: Option<String>,
    pub network_mode: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: Some("flaghunt-kali:latest".to_string()),
            name: Some("flaghunt-kali".to_string()),
            network_mode: Some("host".to_string()),
            capabilities: Some(vec!["NET_RAW".to_string(), "NET_ADMIN".to_string()]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Run log path; defaults to `./flaghunt-runs/<challenge-id>.log`.
    pub run_log: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), run_log: None }
    }
}

impl LoggingConfig {
    pub fn run_log_path(&self, challenge_id: &str) -> PathBuf {
        self.run_log
            .clone()
            .unwrap_or_else(|| PathBuf::from("flaghunt-runs").join(format!("{}.log", challenge_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlaghuntConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.token_ceiling, 200_000);
        assert_eq!(config.llm.max_invoke_attempts, 5);
        assert_eq!(config.crawler.max_pages, 50);
        assert_eq!(config.crawler.batch_size, 10);
        assert_eq!(config.fuzzer.max_attempts, 100);
        assert_eq!(config.workflow.page_floor, 10);
        assert_eq!(config.workflow.vulnerability_floor, 3);
        assert_eq!(config.agent.max_messages, 40);
        assert_eq!(config.tools.fetch_timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: FlaghuntConfig = serde_yaml::from_str("fuzzer:\n  max_attempts: 7\n").unwrap();
        assert_eq!(config.fuzzer.max_attempts, 7);
        assert_eq!(config.fuzzer.exploit_timeout_secs, 60);
        assert_eq!(config.crawler.max_pages, 50);
    }

    #[test]
    fn test_container_config_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.image.as_deref(), Some("flaghunt-kali:latest"));
        assert_eq!(config.name.as_deref(), Some("flaghunt-kali"));
        assert!(config.capabilities.unwrap_or_default().contains(&"NET_RAW".to_string()));
    }

    #[test]
    fn test_run_log_path_default() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.run_log_path("abc"), PathBuf::from("flaghunt-runs/abc.log"));
    }
}
