//! Config command - inspect and edit the user configuration.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::Style;
use fintrack_config::FintrackConfig;

use super::{Context, print_json};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and the files it came from
    Show,

    /// Show the user configuration file path
    Path,

    /// Store the API server in the user configuration file
    SetServer {
        /// API base URL
        url: String,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(),
        ConfigCommand::SetServer { url, timeout } => cmd_set_server(ctx, url, timeout),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        return print_json(&ctx.config);
    }

    let dim = Style::new().dim();
    let loaded = fintrack_config::load_config(None)?;
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("{}", dim.apply_to("# No config files loaded (using defaults)"));
    } else {
        for source in &sources {
            println!("{}", dim.apply_to(format!("# {}", source.display())));
        }
    }
    println!();
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}

fn cmd_path() -> Result<()> {
    let path = fintrack_config::user_config_path()
        .context("Could not determine config directory")?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_set_server(ctx: &Context, url: String, timeout: Option<u64>) -> Result<()> {
    let path = fintrack_config::user_config_path()
        .context("Could not determine config directory")?;

    // Only the user layer is rewritten; project and env layers stay untouched.
    let mut config = if path.exists() {
        fintrack_config::load_config_file(&path)?
    } else {
        FintrackConfig::new()
    };
    config.api.base_url = Some(url.trim_end_matches('/').to_string());
    if timeout.is_some() {
        config.api.timeout_secs = timeout;
    }
    // Round-trip through validation before anything is written.
    FintrackConfig::from_toml(&config.to_toml()?)?;
    fintrack_config::save_config(&config, &path)?;

    if ctx.json_output {
        return print_json(&config.api);
    }
    let green = Style::new().green();
    println!(
        "{} API server set to {} in {}",
        green.apply_to("✓"),
        config.api.base_url(),
        path.display()
    );
    Ok(())
}
