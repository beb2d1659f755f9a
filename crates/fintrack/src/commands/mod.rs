//! CLI command handlers.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod goals;
pub mod subscriptions;

use std::time::Duration;

use anyhow::Result;
use console::Style;
use fintrack_cache::{FetchOutcome, Fetched};
use fintrack_config::FintrackConfig;
use serde::Serialize;
use serde_json::Value;

use crate::app::App;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration (files, env and CLI flags merged).
    pub config: FintrackConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the API client and restore the stored session.
    pub async fn app(&self) -> Result<App> {
        App::open(&self.config).await
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Describe how a cached read was served, for verbose output.
pub fn describe_outcome(outcome: FetchOutcome) -> &'static str {
    match outcome {
        FetchOutcome::Hit => "cached",
        FetchOutcome::HitRevalidating => "cached, refreshing",
        FetchOutcome::Refreshed => "fetched",
        FetchOutcome::StaleServed => "stale, server unreachable",
    }
}

/// First present field among `names`, rendered without JSON quotes.
pub fn field(record: &Value, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| record.get(*name))
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

/// Render a list read, or re-render it every `watch` interval until Ctrl-C.
pub async fn show_list<L, Fut, R>(
    ctx: &Context,
    watch: Option<u64>,
    mut load: L,
    render: R,
) -> Result<()>
where
    L: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Fetched<Value>>>,
    R: Fn(&Context, &Fetched<Value>) -> Result<()>,
{
    let Some(secs) = watch else {
        let fetched = load().await?;
        return render(ctx, &fetched);
    };

    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match load().await {
                    Ok(fetched) => render(ctx, &fetched)?,
                    Err(e) => print_error(&e),
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Print an error line to stderr.
pub fn print_error(error: &anyhow::Error) {
    let red = Style::new().red();
    eprintln!("{} {}", red.apply_to("✗"), error);
}
