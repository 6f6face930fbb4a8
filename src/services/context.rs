//! Explicit handle to every component the scheduler and the action surface
//! share. Built once per process and passed around behind an `Arc`.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::runners::CliRunner;
use crate::adapters::sqlite::{SqliteProjectRepository, SqliteSettingsRepository, SqliteTaskRepository};
use crate::adapters::usage::ChatGptUsageSource;
use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, ProjectTree, SchedulerConfig, UsageConfig, UsageReport};
use crate::domain::ports::{AgentRunner, ProjectRepository, TaskFilter, TaskRepository, UsageSource};

use super::change_notifier::ChangeNotifier;
use super::concurrency_gate::ConcurrencyGate;
use super::context_assembler::ContextAssembler;
use super::process_registry::ProcessRegistry;
use super::project_service::ProjectService;
use super::settings_service::SettingsService;
use super::task_service::TaskService;
use super::usage_gate::UsageGate;

pub struct SchedulerContext {
    pub tasks: Arc<dyn TaskRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub settings: Arc<SettingsService>,
    pub usage: Arc<UsageGate>,
    pub gate: ConcurrencyGate,
    pub registry: Arc<ProcessRegistry>,
    pub notifier: ChangeNotifier,
    pub runner: Arc<dyn AgentRunner>,
    pub assembler: ContextAssembler,
    pub config: SchedulerConfig,
}

impl SchedulerContext {
    /// Production wiring: the agent CLI runner and the ChatGPT usage endpoint.
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let runner = Arc::new(CliRunner::new(Duration::from_millis(config.scheduler.stop_grace_period_ms)));
        let usage_source = Arc::new(ChatGptUsageSource::new(&config.usage));
        Self::with_adapters(pool, config.scheduler.clone(), &config.usage, runner, usage_source)
    }

    /// Wire the SQLite store with the given runner and usage source.
    pub fn with_adapters(
        pool: SqlitePool,
        config: SchedulerConfig,
        usage_config: &UsageConfig,
        runner: Arc<dyn AgentRunner>,
        usage_source: Arc<dyn UsageSource>,
    ) -> Self {
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let projects: Arc<dyn ProjectRepository> = Arc::new(SqliteProjectRepository::new(pool.clone()));
        let notifier = ChangeNotifier::new(config.notifier_capacity);
        let usage = Arc::new(UsageGate::from_config(usage_source, usage_config));
        let settings = Arc::new(SettingsService::new(
            Arc::new(SqliteSettingsRepository::new(pool)),
            Arc::clone(&usage),
            notifier.clone(),
        ));

        Self {
            assembler: ContextAssembler::new(Arc::clone(&tasks)),
            tasks,
            projects,
            settings,
            usage,
            gate: ConcurrencyGate::new(),
            registry: Arc::new(ProcessRegistry::new()),
            notifier,
            runner,
            config,
        }
    }

    pub fn task_service(&self) -> TaskService {
        TaskService::new(
            Arc::clone(&self.tasks),
            Arc::clone(&self.projects),
            Arc::clone(&self.settings),
            Arc::clone(&self.registry),
            self.notifier.clone(),
        )
    }

    pub fn project_service(&self) -> ProjectService {
        ProjectService::new(
            Arc::clone(&self.projects),
            Arc::clone(&self.tasks),
            Arc::clone(&self.registry),
            self.notifier.clone(),
        )
    }

    /// Read the whole project tree in one pass.
    pub async fn load_tree(&self) -> DomainResult<ProjectTree> {
        let projects = self.projects.list_projects().await?;
        let subprojects = self.projects.list_subprojects(None).await?;
        let tasks = self.tasks.list(&TaskFilter::default()).await?;
        Ok(ProjectTree::assemble(projects, subprojects, tasks))
    }

    /// Usage under the current settings; `force` bypasses the cache.
    pub async fn usage_report(&self, force: bool) -> DomainResult<UsageReport> {
        let settings = self.settings.scheduler_settings().await?;
        Ok(self.usage.check_allowed(&settings.usage, force).await)
    }
}
