//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::daemon::DaemonArgs;
use crate::cli::commands::project::ProjectArgs;
use crate::cli::commands::settings::SettingsArgs;
use crate::cli::commands::subproject::SubprojectArgs;
use crate::cli::commands::task::TaskArgs;
use crate::cli::commands::usage::UsageArgs;

#[derive(Parser, Debug)]
#[command(name = "foreman")]
#[command(about = "Foreman - per-project task queue for agent CLIs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .foreman/
    #[arg(short, long, global = true, env = "FOREMAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show info-level logs for one-shot commands
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler in the foreground
    Daemon(DaemonArgs),

    /// Show projects, subprojects and tasks in queue order
    Tree,

    /// Project management commands
    Project(ProjectArgs),

    /// Subproject management commands
    Subproject(SubprojectArgs),

    /// Task management commands
    Task(TaskArgs),

    /// Read and override runtime settings
    Settings(SettingsArgs),

    /// Show the current usage window
    Usage(UsageArgs),
}

impl Commands {
    /// Long-running commands log at the configured level; one-shot commands stay quiet.
    pub fn is_daemon(&self) -> bool {
        matches!(self, Self::Daemon(_))
    }
}
