pub mod commands;
pub mod render;
pub mod solve;
pub mod workflow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::audit::RunLog;
use crate::config::{parse_config, resolve_api_key, FlaghuntConfig};
use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::llm::create_provider;
use crate::models::Challenge;

pub use commands::{ChallengeArgs, Cli, Commands, ValidateArgs, WorkflowArgs};

/// File values over defaults, then command-line values over file values.
pub async fn load_config(path: Option<&str>, args: &ChallengeArgs) -> Result<FlaghuntConfig, FlaghuntError> {
    let mut config = match path {
        Some(path) => parse_config(Path::new(path)).await?,
        None => FlaghuntConfig::default(),
    };
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(key) = &args.api_key {
        config.llm.api_key = Some(key.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.llm.base_url = Some(base_url.clone());
    }
    if let Some(run_log) = &args.run_log {
        config.logging.run_log = Some(PathBuf::from(run_log));
    }
    Ok(config)
}

/// Challenge from the command line. Only absolute http(s) URLs are accepted.
pub async fn build_challenge(args: &ChallengeArgs) -> Result<Challenge, FlaghuntError> {
    let parsed = Url::parse(&args.url)
        .map_err(|e| FlaghuntError::InvalidTarget(format!("{}: {}", args.url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FlaghuntError::InvalidTarget(format!("{}: only http and https targets are supported", args.url)));
    }

    let mut challenge = Challenge::new(&args.url, &args.description).with_flag_format(&args.flag_format);
    if let Some(id) = &args.id {
        challenge = challenge.with_id(id);
    }
    if let Some(hint) = &args.hint {
        challenge = challenge.with_hint(hint);
    }
    if let Some(source) = &args.source {
        let code = tokio::fs::read_to_string(source)
            .await
            .map_err(|e| FlaghuntError::Config(format!("Cannot read source file {}: {}", source, e)))?;
        challenge = challenge.with_source_code(&code);
    }
    Ok(challenge)
}

/// Provider, run log and context for one challenge.
pub fn build_context(config: FlaghuntConfig, challenge: &Challenge) -> Result<RunContext, FlaghuntError> {
    let api_key = resolve_api_key(&config.llm).unwrap_or_default();
    let provider = create_provider(
        &config.llm.provider,
        &api_key,
        config.llm.model.as_deref(),
        config.llm.base_url.as_deref(),
    )?;
    debug!(provider = provider.provider_name(), model = provider.model_name(), "LLM provider ready");
    let log = RunLog::new(config.logging.run_log_path(&challenge.id));
    Ok(RunContext::new(config, Arc::from(provider))
        .with_run_id(&challenge.id)
        .with_log(log))
}

pub async fn handle_validate(args: ValidateArgs) -> Result<(), FlaghuntError> {
    let config = parse_config(Path::new(&args.path)).await?;
    println!("Configuration is valid: {}", args.path);
    println!("  provider: {}", config.llm.provider);
    println!("  max pages: {}, max attempts: {}", config.crawler.max_pages, config.fuzzer.max_attempts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(url: &str) -> ChallengeArgs {
        let cli = Cli::parse_from(["flaghunt", "solve", url, "--hint", "look at cookies", "--model", "m1"]);
        match cli.command {
            Commands::Solve(args) => args,
            _ => panic!("expected solve"),
        }
    }

    #[tokio::test]
    async fn test_build_challenge_rejects_bad_targets() {
        let err = build_challenge(&args("not a url")).await.unwrap_err();
        assert!(matches!(err, FlaghuntError::InvalidTarget(_)));
        let err = build_challenge(&args("ftp://t/")).await.unwrap_err();
        assert!(matches!(err, FlaghuntError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn test_build_challenge_and_overrides() {
        let a = args("http://target:8080/");
        let challenge = build_challenge(&a).await.unwrap();
        assert_eq!(challenge.hint.as_deref(), Some("look at cookies"));
        assert_eq!(challenge.flag_format, "flag{*}");

        let config = load_config(None, &a).await.unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("m1"));
        assert_eq!(config.llm.provider, "gemini");
    }

    #[test]
    fn test_workflow_flags_parse() {
        let cli = Cli::parse_from(["flaghunt", "-vv", "workflow", "http://t/", "--json", "--max-pages", "5"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Workflow(w) => {
                assert!(w.json);
                assert_eq!(w.max_pages, Some(5));
                assert_eq!(w.challenge.url, "http://t/");
            }
            _ => panic!("expected workflow"),
        }
    }
}
