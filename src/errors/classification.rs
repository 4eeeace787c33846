use super::types::FlaghuntError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
    /// Fatal errors unwind the whole run; everything else stays stage-local.
    pub fatal: bool,
}

impl ErrorClassification {
    const fn new(error_type: &'static str, retryable: bool, fatal: bool) -> Self {
        Self { error_type, retryable, fatal }
    }
}

impl FlaghuntError {
    /// Classify this error to determine its type, whether it can be retried
    /// and whether it must abort the run.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            FlaghuntError::RateLimit(_) => ErrorClassification::new("RateLimitError", true, false),
            FlaghuntError::Network(_) => ErrorClassification::new("NetworkError", true, false),
            FlaghuntError::Timeout(_) => ErrorClassification::new("TimeoutError", true, false),
            FlaghuntError::LLMApi(_) => ErrorClassification::new("LLMApiError", false, false),

            // Fatal errors
            FlaghuntError::Invocation(_) => ErrorClassification::new("InvocationError", false, true),
            FlaghuntError::SequenceValidation(_) => {
                ErrorClassification::new("SequenceValidationError", false, true)
            }
            FlaghuntError::DriverInit(_) => ErrorClassification::new("DriverInitError", false, true),
            FlaghuntError::Authentication(_) => {
                ErrorClassification::new("AuthenticationError", false, true)
            }
            FlaghuntError::Config(_) => ErrorClassification::new("ConfigError", false, true),

            // Stage-local errors
            FlaghuntError::ToolExecution(_) => ErrorClassification::new("ToolExecutionError", false, false),
            FlaghuntError::ExploitRequest(_) => {
                ErrorClassification::new("ExploitRequestError", false, false)
            }
            FlaghuntError::InvalidTarget(_) => {
                ErrorClassification::new("InvalidTargetError", false, false)
            }
            FlaghuntError::Container(_) => ErrorClassification::new("ContainerError", true, false),
            FlaghuntError::Browser(_) => ErrorClassification::new("BrowserError", true, false),
            FlaghuntError::Io(_) => ErrorClassification::new("IoError", false, false),
            FlaghuntError::Json(_) => ErrorClassification::new("JsonError", false, false),
            FlaghuntError::Yaml(_) => ErrorClassification::new("YamlError", false, false),
            FlaghuntError::Docker(_) => ErrorClassification::new("DockerError", true, false),
            FlaghuntError::Internal(_) => ErrorClassification::new("InternalError", false, false),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.classify().fatal
    }

    /// Heuristic for provider rejections caused by a malformed
    /// tool-call/tool-result ordering rather than a transient fault.
    pub fn looks_like_ordering_error(&self) -> bool {
        let text = self.to_string();
        let lower = text.to_lowercase();
        text.contains("400") && (lower.contains("function call turn") || lower.contains("tool"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = FlaghuntError::RateLimit("Resource has been exhausted".into());
        let class = err.classify();
        assert!(class.retryable);
        assert!(!class.fatal);
        assert_eq!(class.error_type, "RateLimitError");
    }

    #[test]
    fn test_fatal_categories() {
        assert!(FlaghuntError::Invocation("exhausted".into()).is_fatal());
        assert!(FlaghuntError::SequenceValidation("bad".into()).is_fatal());
        assert!(FlaghuntError::DriverInit("no docker".into()).is_fatal());
        assert!(FlaghuntError::Config("invalid".into()).is_fatal());
    }

    #[test]
    fn test_stage_local_errors_not_fatal() {
        assert!(!FlaghuntError::Network("connection refused".into()).is_fatal());
        assert!(!FlaghuntError::ExploitRequest("reset".into()).is_fatal());
        assert!(!FlaghuntError::ToolExecution("no element".into()).is_fatal());
        assert!(!FlaghuntError::LLMApi("bad json".into()).is_fatal());
    }

    #[test]
    fn test_ordering_error_heuristic() {
        let err = FlaghuntError::LLMApi(
            "400 Please ensure that function call turn comes immediately after a user turn".into(),
        );
        assert!(err.looks_like_ordering_error());

        let err = FlaghuntError::LLMApi("400 tool_use ids were found without tool_result".into());
        assert!(err.looks_like_ordering_error());

        let err = FlaghuntError::LLMApi("500 internal".into());
        assert!(!err.looks_like_ordering_error());

        let err = FlaghuntError::LLMApi("tool missing".into());
        assert!(!err.looks_like_ordering_error());
    }
}
