use clap::{Args, Parser, Subcommand};

pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "flaghunt", version, long_version = LONG_VERSION, about = "Autonomous LLM-driven web CTF solver")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Solve a challenge with a single tool-using agent loop
    Solve(ChallengeArgs),
    /// Run the staged crawl / analyze / threat-model / fuzz workflow
    Workflow(WorkflowArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ChallengeArgs {
    /// Target challenge URL
    pub url: String,

    /// Challenge description
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Hint shown with the challenge
    #[arg(long)]
    pub hint: Option<String>,

    /// Flag format, `*` marks the variable part
    #[arg(long, default_value = "flag{*}")]
    pub flag_format: String,

    /// File holding the challenge source code
    #[arg(long)]
    pub source: Option<String>,

    /// Custom challenge identifier
    #[arg(long)]
    pub id: Option<String>,

    /// LLM provider: gemini, openai, anthropic, openrouter, local
    #[arg(long)]
    pub provider: Option<String>,

    /// LLM model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API key (or use env vars)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Endpoint for OpenAI-compatible providers
    #[arg(long)]
    pub base_url: Option<String>,

    /// Run log file (default: ./flaghunt-runs/<id>.log)
    #[arg(long)]
    pub run_log: Option<String>,
}

#[derive(Args, Clone)]
pub struct WorkflowArgs {
    #[command(flatten)]
    pub challenge: ChallengeArgs,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum crawled pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum exploitation attempts
    #[arg(long)]
    pub max_attempts: Option<usize>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub path: String,
}
