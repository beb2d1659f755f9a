//! Fintrack - command-line client for the fintrack API
//!
//! Main entry point for the fintrack CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod commands;
mod logging;

use commands::{accounts, auth, config, goals, subscriptions};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Fintrack - accounts, subscriptions and saving goals from the command line
#[derive(Parser)]
#[command(name = "fintrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// API server URL (default: http://localhost:8000)
    #[arg(long, global = true, env = "FINTRACK_API_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign up, sign out and inspect the session
    Auth(auth::AuthArgs),

    /// List linked bank accounts
    Accounts(accounts::AccountsArgs),

    /// List or record subscriptions for an account
    Subscriptions(subscriptions::SubscriptionsArgs),

    /// List saving goals
    Goals(goals::GoalsArgs),

    /// Show or edit configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = fintrack_config::load_config(None)?;
    let mut config = loaded.config;
    if let Some(server) = cli.server {
        config.api.base_url = Some(server);
    }

    let _guard = logging::init(cli.verbose, &config);
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!(sources = ?loaded.sources, base_url = config.api.base_url(), "Configuration loaded");

    let ctx = commands::Context {
        config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Accounts(args) => accounts::run(args, &ctx).await,
        Commands::Subscriptions(args) => subscriptions::run(args, &ctx).await,
        Commands::Goals(args) => goals::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
