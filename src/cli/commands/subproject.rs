//! Subproject CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::project::absolute_path;
use crate::cli::commands::{parse_metadata, CommandContext};
use crate::cli::id_resolver::{resolve_project_id, resolve_subproject_id, resolve_subproject_ids};
use crate::cli::output::{output, CommandOutput, MessageOutput, TableFormatter};
use crate::domain::models::{Config, Subproject};

#[derive(Args, Debug)]
pub struct SubprojectArgs {
    #[command(subcommand)]
    pub command: SubprojectCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubprojectCommands {
    /// Add a subproject under a project
    Add {
        /// Parent project ID (or unique prefix)
        project: String,
        name: String,
        /// Working directory tasks run in
        path: String,
        #[arg(long)]
        paused: bool,
        #[arg(long)]
        metadata: Option<String>,
    },
    /// List subprojects, optionally of one project
    List {
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Delete a subproject and its tasks
    Rm { id: String },
    /// Stop scheduling the subproject's tasks
    Pause { id: String },
    /// Resume scheduling the subproject's tasks
    Resume { id: String },
    /// Set the full subproject order within a project
    Reorder {
        project: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct SubprojectOutput {
    #[serde(flatten)]
    pub subproject: Subproject,
}

impl CommandOutput for SubprojectOutput {
    fn to_human(&self) -> String {
        let s = &self.subproject;
        format!(
            "Subproject {} ({})\n  Project:  {}\n  Path:     {}\n  Priority: {}\n  State:    {}",
            s.name,
            s.id,
            s.project_id,
            s.path,
            s.priority,
            if s.paused { "paused" } else { "active" }
        )
    }
}

#[derive(Debug, Serialize)]
pub struct SubprojectListOutput {
    pub subprojects: Vec<Subproject>,
    pub total: usize,
}

impl CommandOutput for SubprojectListOutput {
    fn to_human(&self) -> String {
        if self.subprojects.is_empty() {
            return "No subprojects found.".to_string();
        }
        format!("{}\n\n{} subproject(s)", TableFormatter::new().format_subprojects(&self.subprojects), self.total)
    }
}

pub async fn execute(args: SubprojectArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;
    let service = ctx.scheduler.project_service();

    match args.command {
        SubprojectCommands::Add { project, name, path, paused, metadata } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let mut subproject = Subproject::new(project_id, name, absolute_path(&path)?);
            subproject.metadata = parse_metadata(metadata.as_deref())?;
            if paused {
                subproject = subproject.paused();
            }
            let subproject = service.create_subproject(subproject).await.context("Failed to create subproject")?;
            output(&SubprojectOutput { subproject }, json_mode);
        }

        SubprojectCommands::List { project } => {
            let project_id = match project {
                Some(prefix) => Some(resolve_project_id(&ctx.pool, &prefix).await?),
                None => None,
            };
            let subprojects = service.list_subprojects(project_id).await.context("Failed to list subprojects")?;
            output(&SubprojectListOutput { total: subprojects.len(), subprojects }, json_mode);
        }

        SubprojectCommands::Rm { id } => {
            let subproject_id = resolve_subproject_id(&ctx.pool, &id).await?;
            service.delete_subproject(subproject_id).await.context("Failed to delete subproject")?;
            output(&MessageOutput::ok(format!("Subproject {subproject_id} deleted")), json_mode);
        }

        SubprojectCommands::Pause { id } => {
            let subproject_id = resolve_subproject_id(&ctx.pool, &id).await?;
            let subproject = service.set_subproject_paused(subproject_id, true).await?;
            output(&SubprojectOutput { subproject }, json_mode);
        }

        SubprojectCommands::Resume { id } => {
            let subproject_id = resolve_subproject_id(&ctx.pool, &id).await?;
            let subproject = service.set_subproject_paused(subproject_id, false).await?;
            output(&SubprojectOutput { subproject }, json_mode);
        }

        SubprojectCommands::Reorder { project, ids } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let ordered = resolve_subproject_ids(&ctx.pool, &ids).await?;
            service
                .reorder_subprojects(project_id, &ordered)
                .await
                .context("Failed to reorder subprojects")?;
            output(&MessageOutput::ok(format!("Reordered {} subproject(s)", ordered.len())), json_mode);
        }
    }

    Ok(())
}
