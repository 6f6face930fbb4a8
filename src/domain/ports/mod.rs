//! Port trait definitions (Hexagonal Architecture)
//!
//! Adapters implement these traits so the scheduler and services stay
//! independent of SQLite, the usage endpoint and the agent CLI:
//! - ProjectRepository / TaskRepository / SettingsRepository: entity store
//! - UsageSource: account usage lookups
//! - AgentRunner: spawning and supervising agent processes

pub mod agent_runner;
pub mod project_repository;
pub mod settings_repository;
pub mod task_repository;
pub mod usage_source;

pub use agent_runner::{AgentInvocation, AgentRunner, RunOutcome};
pub use project_repository::ProjectRepository;
pub use settings_repository::SettingsRepository;
pub use task_repository::{TaskFilter, TaskRepository};
pub use usage_source::{UsageRequest, UsageSource};
