use console::style;
use tracing::{info, warn};

use crate::agents::Solver;
use crate::errors::FlaghuntError;
use crate::queue::FlagMatcher;
use super::commands::ChallengeArgs;
use super::{build_challenge, build_context, load_config};

pub async fn handle_solve(config_path: Option<&str>, args: ChallengeArgs, quiet: bool) -> Result<(), FlaghuntError> {
    let config = load_config(config_path, &args).await?;
    let challenge = build_challenge(&args).await?;
    let ctx = build_context(config, &challenge)?;
    if let Err(e) = ctx.log().initialize(&challenge.id).await {
        warn!(error = %e, "Run log unavailable");
    }

    info!(challenge = %challenge.id, url = %challenge.url, "Solving challenge");
    if !quiet {
        println!(
            "{} Solving {} ({})",
            style("▶").green().bold(),
            style(&challenge.url).white().bold(),
            style(&challenge.id).cyan(),
        );
    }

    let solver = Solver::new(ctx);
    let answer = solver.solve(&challenge.prompt_input()).await?;

    println!("{}", answer);
    match FlagMatcher::new(&challenge.flag_format).find(&answer) {
        Some(flag) => println!("\n{} {}", style("⚑ FLAG:").green().bold(), style(flag).white().bold()),
        None if !quiet => println!("\n{}", style("No flag in the final answer").yellow()),
        None => {}
    }
    Ok(())
}
