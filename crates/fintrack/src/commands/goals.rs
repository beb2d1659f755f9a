//! Goals command - saving goals and their progress.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use serde_json::Value;

use super::subscriptions::format_minor;
use super::{Context, describe_outcome, field, print_json, show_list};

/// Arguments for the goals command.
#[derive(Args, Debug)]
pub struct GoalsArgs {
    /// Re-fetch every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,
}

/// A saving goal with amounts in minor units, whichever shape the server
/// used for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub id: Value,
    pub name: String,
    pub contributed_minor: i64,
    pub target_minor: i64,
    pub currency: String,
}

impl Goal {
    pub fn from_value(raw: &Value) -> Self {
        let id = ["id", "goal_id", "goalId"]
            .iter()
            .filter_map(|k| raw.get(*k))
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null);

        let currency = match field(raw, &["currency", "currency_code", "currencySymbol"]) {
            c if c.trim().is_empty() => "EUR".to_string(),
            c => c.trim().to_string(),
        };

        Self {
            id,
            name: field(raw, &["name", "label", "title"]),
            contributed_minor: minor_amount(
                raw,
                &["contributed_minor", "contributedMinor", "current_minor"],
                &["currentAmount", "current_amount"],
            ),
            target_minor: minor_amount(
                raw,
                &["target_minor", "targetMinor", "goal_minor"],
                &["targetAmount", "target_amount"],
            ),
            currency,
        }
    }

    /// Progress towards the target, 0-100.
    pub fn percent(&self) -> u32 {
        if self.target_minor <= 0 {
            return 0;
        }
        let pct = i128::from(self.contributed_minor.max(0)) * 100 / i128::from(self.target_minor);
        pct.min(100) as u32
    }
}

/// Integer minor-unit fields win; otherwise a major-unit float is scaled.
fn minor_amount(raw: &Value, minor_keys: &[&str], major_keys: &[&str]) -> i64 {
    minor_keys
        .iter()
        .filter_map(|k| raw.get(*k))
        .find_map(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .or_else(|| {
            major_keys
                .iter()
                .filter_map(|k| raw.get(*k))
                .find_map(Value::as_f64)
                .map(|major| (major * 100.0).round() as i64)
        })
        .unwrap_or(0)
}

/// Run the goals command.
pub async fn run(args: GoalsArgs, ctx: &Context) -> Result<()> {
    let app = ctx.app().await?;
    show_list(ctx, args.watch, || app.saving_goals(), render).await
}

fn render(ctx: &Context, fetched: &fintrack_cache::Fetched<Value>) -> Result<()> {
    let goals: Vec<Goal> = fetched
        .data
        .as_array()
        .map(|rows| rows.iter().map(Goal::from_value).collect())
        .unwrap_or_default();

    if ctx.json_output {
        return print_json(&goals);
    }

    let dim = Style::new().dim();
    let green = Style::new().green();

    println!();
    println!("{}", style("Saving goals").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    if goals.is_empty() {
        println!("  {}", dim.apply_to("No saving goals"));
    }
    for goal in &goals {
        let pct = goal.percent();
        let line = format!(
            "  {}  {} / {} {}",
            goal.name,
            format_minor(&goal.contributed_minor.to_string()),
            format_minor(&goal.target_minor.to_string()),
            goal.currency,
        );
        if pct >= 100 {
            println!("{}  {}", line, green.apply_to("100%"));
        } else {
            println!("{}  {}", line, dim.apply_to(format!("{}%", pct)));
        }
    }
    if ctx.verbose {
        println!();
        println!("  {}", dim.apply_to(describe_outcome(fetched.outcome)));
    }
    println!();
    Ok(())
}
