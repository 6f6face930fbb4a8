//! `foreman daemon`: run the scheduler in the foreground until Ctrl-C.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::commands::CommandContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::Scheduler;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Run a single scheduling pass, wait for the admitted tasks, then exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Serialize)]
pub struct OnceOutput {
    pub recovered: usize,
    pub admitted: Vec<uuid::Uuid>,
    pub usage_blocked: bool,
}

impl CommandOutput for OnceOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Ran {} task(s)", self.admitted.len());
        if self.recovered > 0 {
            out.push_str(&format!("; recovered {} interrupted task(s)", self.recovered));
        }
        if self.usage_blocked {
            out.push_str("; admission blocked by usage limits");
        }
        out
    }
}

pub async fn execute(args: DaemonArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;
    let mut scheduler = Scheduler::new(ctx.scheduler);

    if args.once {
        let recovered = scheduler.recover().await.context("Failed to recover interrupted tasks")?;
        let report = scheduler.tick().await.context("Scheduler pass failed")?;
        scheduler.wait_for_runs().await;
        let out = OnceOutput { recovered, admitted: report.admitted, usage_blocked: report.usage_blocked };
        output(&out, json_mode);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, stopping scheduler");
                signal_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
    });

    tracing::info!(database = %config.database.path, "daemon starting");
    scheduler.run(shutdown).await.context("Scheduler stopped with an error")?;
    tracing::info!("daemon stopped");
    Ok(())
}
