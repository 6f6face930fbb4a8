//! `foreman tree`: the whole queue at a glance.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::commands::CommandContext;
use crate::cli::output::tree::render_project_tree;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, ProjectTree};
use crate::services::next_eligible_task;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeOutput {
    #[serde(flatten)]
    pub tree: ProjectTree,
    /// Task the scheduler would admit next, ignoring the gates
    pub next_task_id: Option<uuid::Uuid>,
}

impl CommandOutput for TreeOutput {
    fn to_human(&self) -> String {
        let mut out = render_project_tree(&self.tree);
        if let Some(next) = self.next_task_id {
            out.push_str(&format!("\n\nNext up: {next}"));
        }
        out
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;
    let tree = ctx.scheduler.load_tree().await.context("Failed to load project tree")?;
    let next_task_id = next_eligible_task(&tree).map(|task| task.id);
    output(&TreeOutput { tree, next_task_id }, json_mode);
    Ok(())
}
