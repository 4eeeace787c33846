use std::path::Path;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use flaghunt::cli::{self, Commands};
use flaghunt::config::parse_config;
use flaghunt::errors::FlaghuntError;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    // RUST_LOG wins, then -v flags, then the config file's logging level
    let log_level = match cli.verbose {
        0 => configured_level(cli.config.as_deref()).await,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        git = option_env!("GIT_HASH").unwrap_or("unknown"),
        "flaghunt starting"
    );

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Solve(args) => cli::solve::handle_solve(config_path, args, cli.quiet).await,
        Commands::Workflow(args) => cli::workflow::handle_workflow(config_path, args, cli.quiet).await,
        Commands::Validate(args) => cli::handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

async fn configured_level(path: Option<&str>) -> String {
    match path {
        Some(path) => parse_config(Path::new(path))
            .await
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
        None => "info".to_string(),
    }
}

fn exit_code(e: &FlaghuntError) -> i32 {
    match e {
        FlaghuntError::Config(_) => 2,
        FlaghuntError::Container(_) | FlaghuntError::DriverInit(_) => 3,
        FlaghuntError::Authentication(_) => 4,
        FlaghuntError::InvalidTarget(_) => 5,
        FlaghuntError::SequenceValidation(_) => 6,
        FlaghuntError::Invocation(_) => 7,
        _ => 1,
    }
}
