//! Foreman - per-project task queue for agent CLIs
//!
//! Foreman keeps an ordered queue of prompts per project and subproject and
//! runs them through an external agent CLI (such as `codex exec`) in the
//! project's directory, honouring pause flags, a parallelism limit and the
//! account's usage window.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and ports
//! - **Adapters** (`adapters`): SQLite repositories, the process runner and usage sources
//! - **Service Layer** (`services`): ready queue, gates, action surface and the scheduler
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use foreman::services::{Scheduler, SchedulerContext};
//! use std::sync::Arc;
//!
//! let ctx = Arc::new(SchedulerContext::new(pool, &config));
//! Scheduler::new(ctx).run(shutdown_token).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, Project, Subproject, Task, TaskAction, TaskScope, TaskStatus};
pub use domain::ports::{AgentRunner, ProjectRepository, SettingsRepository, TaskRepository, UsageSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Scheduler, SchedulerContext, TaskService};
