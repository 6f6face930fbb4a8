//! Project CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{parse_metadata, CommandContext};
use crate::cli::id_resolver::{resolve_project_id, resolve_project_ids};
use crate::cli::output::{output, CommandOutput, MessageOutput, TableFormatter};
use crate::domain::models::{Config, Project, ScopeUpdate};

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Register a project directory
    Add {
        name: String,
        /// Working directory tasks run in
        path: String,
        /// Create the project paused
        #[arg(long)]
        paused: bool,
        #[arg(long)]
        metadata: Option<String>,
    },
    /// List projects in queue order
    List,
    /// Change a project's name, path, metadata or visibility
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        path: Option<String>,
        #[arg(long)]
        metadata: Option<String>,
        /// Show the project on the main view
        #[arg(long)]
        show_on_main: Option<bool>,
    },
    /// Delete a project with its subprojects and tasks
    Rm { id: String },
    /// Stop scheduling the project's tasks
    Pause { id: String },
    /// Resume scheduling the project's tasks
    Resume { id: String },
    /// Set the full project order, highest priority first
    Reorder {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct ProjectOutput {
    #[serde(flatten)]
    pub project: Project,
}

impl CommandOutput for ProjectOutput {
    fn to_human(&self) -> String {
        let p = &self.project;
        format!(
            "Project {} ({})\n  Path:     {}\n  Priority: {}\n  State:    {}",
            p.name,
            p.id,
            p.path,
            p.priority,
            if p.paused { "paused" } else { "active" }
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListOutput {
    pub projects: Vec<Project>,
    pub total: usize,
}

impl CommandOutput for ProjectListOutput {
    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects found.".to_string();
        }
        format!("{}\n\n{} project(s)", TableFormatter::new().format_projects(&self.projects), self.total)
    }
}

/// Store project paths absolute so tasks run in the same place from any cwd.
pub(crate) fn absolute_path(path: &str) -> Result<String> {
    let absolute = std::path::absolute(path).with_context(|| format!("Invalid path: {path}"))?;
    Ok(absolute.to_string_lossy().into_owned())
}

pub async fn execute(args: ProjectArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;
    let service = ctx.scheduler.project_service();

    match args.command {
        ProjectCommands::Add { name, path, paused, metadata } => {
            let mut project = Project::new(name, absolute_path(&path)?);
            if let Some(metadata) = parse_metadata(metadata.as_deref())? {
                project = project.with_metadata(metadata);
            }
            if paused {
                project = project.paused();
            }
            let project = service.create_project(project).await.context("Failed to create project")?;
            output(&ProjectOutput { project }, json_mode);
        }

        ProjectCommands::List => {
            let projects = service.list_projects().await.context("Failed to list projects")?;
            output(&ProjectListOutput { total: projects.len(), projects }, json_mode);
        }

        ProjectCommands::Update { id, name, path, metadata, show_on_main } => {
            let project_id = resolve_project_id(&ctx.pool, &id).await?;
            let update = ScopeUpdate {
                name,
                path: path.as_deref().map(absolute_path).transpose()?,
                metadata: parse_metadata(metadata.as_deref())?,
                show_on_main,
            };
            if update == ScopeUpdate::default() {
                bail!("Nothing to update; pass at least one field");
            }
            let project = service.update_project(project_id, &update).await.context("Failed to update project")?;
            output(&ProjectOutput { project }, json_mode);
        }

        ProjectCommands::Rm { id } => {
            let project_id = resolve_project_id(&ctx.pool, &id).await?;
            service.delete_project(project_id).await.context("Failed to delete project")?;
            output(&MessageOutput::ok(format!("Project {project_id} deleted")), json_mode);
        }

        ProjectCommands::Pause { id } => {
            let project_id = resolve_project_id(&ctx.pool, &id).await?;
            let project = service.set_project_paused(project_id, true).await?;
            output(&ProjectOutput { project }, json_mode);
        }

        ProjectCommands::Resume { id } => {
            let project_id = resolve_project_id(&ctx.pool, &id).await?;
            let project = service.set_project_paused(project_id, false).await?;
            output(&ProjectOutput { project }, json_mode);
        }

        ProjectCommands::Reorder { ids } => {
            let ordered = resolve_project_ids(&ctx.pool, &ids).await?;
            service.reorder_projects(&ordered).await.context("Failed to reorder projects")?;
            output(&MessageOutput::ok(format!("Reordered {} project(s)", ordered.len())), json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_keeps_absolute_input() {
        assert_eq!(absolute_path("/srv/api").unwrap(), "/srv/api");
        assert!(absolute_path("relative/dir").unwrap().starts_with('/'));
    }

    #[test]
    fn test_project_output_json_is_flat() {
        let out = ProjectOutput { project: Project::new("api", "/srv/api") };
        let json = out.to_json();
        assert_eq!(json["name"], "api");
        assert_eq!(json["paused"], false);
    }
}
