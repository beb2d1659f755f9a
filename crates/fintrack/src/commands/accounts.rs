//! Accounts command - linked bank accounts.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::{Style, style};
use fintrack_cache::Fetched;
use fintrack_client::NewAccount;
use serde_json::Value;

use super::{Context, describe_outcome, field, print_json, show_list};

/// Arguments for the accounts command.
#[derive(Args, Debug)]
pub struct AccountsArgs {
    /// Re-fetch every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    #[command(subcommand)]
    pub command: Option<AccountsCommand>,
}

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// Register a bank account
    Add {
        /// Account name
        #[arg(long)]
        name: String,

        /// Bank or provider
        #[arg(long)]
        institution: String,

        /// ISO currency code
        #[arg(long, default_value = "EUR")]
        currency: String,

        /// Account kind (e.g. checking, savings)
        #[arg(long, default_value = "checking")]
        kind: String,
    },
}

/// Run the accounts command.
pub async fn run(args: AccountsArgs, ctx: &Context) -> Result<()> {
    let app = ctx.app().await?;

    match args.command {
        None => show_list(ctx, args.watch, || app.accounts(), render).await,
        Some(AccountsCommand::Add {
            name,
            institution,
            currency,
            kind,
        }) => {
            let user = app
                .session
                .user()
                .context("Not logged in. Run 'fintrack auth sign-in' first.")?;
            let created = app
                .add_account(NewAccount {
                    user_id: user.id,
                    name: name.clone(),
                    institution,
                    currency,
                    kind,
                })
                .await?;

            if ctx.json_output {
                print_json(&created)
            } else {
                let green = Style::new().green();
                println!("{} Account added: {}", green.apply_to("✓"), name);
                Ok(())
            }
        }
    }
}

fn render(ctx: &Context, fetched: &Fetched<Value>) -> Result<()> {
    if ctx.json_output {
        return print_json(&fetched.data);
    }

    let dim = Style::new().dim();
    let rows = fetched.data.as_array().map(Vec::as_slice).unwrap_or_default();

    println!();
    println!("{}", style("Accounts").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    if rows.is_empty() {
        println!("  {}", dim.apply_to("No accounts linked"));
    }
    for row in rows {
        println!(
            "  {} {}  {} {}",
            dim.apply_to(format!("#{}", field(row, &["id"]))),
            field(row, &["name"]),
            dim.apply_to(field(row, &["institution"])),
            dim.apply_to(field(row, &["currency"])),
        );
    }
    if ctx.verbose {
        println!();
        println!("  {}", dim.apply_to(describe_outcome(fetched.outcome)));
    }
    println!();
    Ok(())
}
