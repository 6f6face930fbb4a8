//! `foreman usage`: query the usage window the scheduler gates on.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::commands::CommandContext;
use crate::cli::output::progress::create_spinner;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, UsageReport};

#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Skip the cache and query the endpoint now
    #[arg(short, long)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct UsageOutput {
    #[serde(flatten)]
    pub report: UsageReport,
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}%"))
}

impl CommandOutput for UsageOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let verdict = if r.allowed {
            console::style("allowed").green().bold()
        } else {
            console::style("blocked").red().bold()
        };
        let mut lines = vec![format!("Usage: {verdict}")];
        if let Some(account) = &r.account {
            lines.push(format!("  Account: {account}"));
        }
        let resets = |at: Option<chrono::DateTime<chrono::Utc>>| {
            at.map(|t| format!(" (resets {})", t.format("%Y-%m-%d %H:%M UTC"))).unwrap_or_default()
        };
        lines.push(format!("  5-hour:  {}{}", percent(r.five_hour_used_percent), resets(r.five_hour_resets_at)));
        lines.push(format!("  Weekly:  {}{}", percent(r.weekly_used_percent), resets(r.weekly_resets_at)));
        for model in &r.per_model {
            lines.push(format!("  {}: {:.1}%", model.model, model.used_percent));
        }
        if let Some(error) = r.error.as_deref().filter(|e| !e.is_empty()) {
            lines.push(format!("  Reason:  {error}"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: UsageArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;

    let spinner = create_spinner("Checking usage...", json_mode);
    let report = ctx.scheduler.usage_report(args.refresh).await;
    spinner.finish_and_clear();

    let report = report.context("Failed to read usage settings")?;
    output(&UsageOutput { report }, json_mode);
    Ok(())
}
