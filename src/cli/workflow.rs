use tokio::sync::mpsc;
use tracing::info;

use crate::agents::run_workflow;
use crate::errors::FlaghuntError;
use super::commands::WorkflowArgs;
use super::render::{render_event, render_summary};
use super::{build_challenge, build_context, load_config};

/// Runs the workflow on a spawned task and renders its events here until
/// the task drops its sender.
pub async fn handle_workflow(config_path: Option<&str>, args: WorkflowArgs, quiet: bool) -> Result<(), FlaghuntError> {
    let mut config = load_config(config_path, &args.challenge).await?;
    if let Some(max_pages) = args.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.fuzzer.max_attempts = max_attempts;
    }
    let challenge = build_challenge(&args.challenge).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let ctx = build_context(config, &challenge)?;
    let log = ctx.log().clone().with_channel(tx);
    let ctx = ctx.with_log(log);
    info!(challenge = %challenge.id, "Starting workflow");

    let handle = tokio::spawn(async move { run_workflow(challenge, &ctx).await });

    let live = !quiet && !args.json;
    while let Some(event) = rx.recv().await {
        if live {
            println!("{}", render_event(&event));
        }
    }

    let state = handle
        .await
        .map_err(|e| FlaghuntError::Internal(format!("workflow task failed: {}", e)))??;
    let summary = state.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n{}", render_summary(&summary));
    }
    Ok(())
}
