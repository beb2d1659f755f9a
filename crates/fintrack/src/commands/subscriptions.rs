//! Subscriptions command - recurring payments per account.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use fintrack_cache::Fetched;
use fintrack_client::NewSubscription;
use serde_json::Value;

use super::{Context, describe_outcome, field, print_json, show_list};

/// Arguments for the subscriptions command.
#[derive(Args, Debug)]
pub struct SubscriptionsArgs {
    #[command(subcommand)]
    pub command: SubscriptionsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SubscriptionsCommand {
    /// List subscriptions recorded against an account
    List {
        /// Account ID
        #[arg(long)]
        account: i64,

        /// Re-fetch every N seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Record a subscription against an account
    Add {
        /// Account ID
        #[arg(long)]
        account: i64,

        /// Merchant name
        #[arg(long)]
        merchant: String,

        /// Amount in minor units (cents)
        #[arg(long)]
        amount_minor: i64,

        /// ISO currency code
        #[arg(long, default_value = "EUR")]
        currency: String,

        /// First payment date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        start_date: Option<String>,

        /// Recurrence unit
        #[arg(long, default_value = "month")]
        unit: String,

        /// Recur every N units
        #[arg(long, default_value = "1")]
        every_n: u32,

        /// Record as inactive
        #[arg(long)]
        inactive: bool,
    },
}

/// Run the subscriptions command.
pub async fn run(args: SubscriptionsArgs, ctx: &Context) -> Result<()> {
    let app = ctx.app().await?;

    match args.command {
        SubscriptionsCommand::List { account, watch } => {
            show_list(ctx, watch, || app.subscriptions(account), render).await
        }
        SubscriptionsCommand::Add {
            account,
            merchant,
            amount_minor,
            currency,
            start_date,
            unit,
            every_n,
            inactive,
        } => {
            let start_date = start_date
                .unwrap_or_else(|| chrono::Local::now().date_naive().format("%Y-%m-%d").to_string());

            let created = app
                .add_subscription(
                    account,
                    NewSubscription {
                        merchant: merchant.clone(),
                        amount_minor,
                        currency,
                        start_date,
                        unit,
                        every_n,
                        active: !inactive,
                        auto_detected: false,
                    },
                )
                .await?;

            if ctx.json_output {
                print_json(&created)
            } else {
                let green = Style::new().green();
                println!("{} Subscription added: {}", green.apply_to("✓"), merchant);
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
    println!("{}", style("Subscriptions").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    if rows.is_empty() {
        println!("  {}", dim.apply_to("No subscriptions"));
    }
    for row in rows {
        println!(
            "  {}  {} {}  {}",
            field(row, &["merchant"]),
            format_minor(&field(row, &["amount_minor"])),
            field(row, &["currency"]),
            dim.apply_to(format!(
                "every {} {}",
                field(row, &["every_n"]),
                field(row, &["unit"])
            )),
        );
    }
    if ctx.verbose {
        println!();
        println!("  {}", dim.apply_to(describe_outcome(fetched.outcome)));
    }
    println!();
    Ok(())
}

/// `1299` -> `12.99`. Non-numeric input is returned unchanged.
pub fn format_minor(minor: &str) -> String {
    match minor.parse::<i64>() {
        Ok(v) => {
            let sign = if v < 0 { "-" } else { "" };
            let v = v.unsigned_abs();
            format!("{}{}.{:02}", sign, v / 100, v % 100)
        }
        Err(_) => minor.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minor() {
        assert_eq!(format_minor("1299"), "12.99");
        assert_eq!(format_minor("5"), "0.05");
        assert_eq!(format_minor("-250"), "-2.50");
        assert_eq!(format_minor(""), "");
    }
}
