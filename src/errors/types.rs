use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlaghuntError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    /// Provider reported resource exhaustion. The payload keeps the raw
    /// provider text so the retry delay can be parsed from it.
    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Model invocation failed: {0}")]
    Invocation(String),

    #[error("Invalid message sequence: {0}")]
    SequenceValidation(String),

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Exploit request error: {0}")]
    ExploitRequest(String),

    #[error("Session initialization failed: {0}")]
    DriverInit(String),

    #[error("Container error: {0}")]
    Container(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for FlaghuntError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FlaghuntError::Timeout(e.to_string())
        } else {
            FlaghuntError::Network(e.to_string())
        }
    }
}
