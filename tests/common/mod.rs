//! Common test utilities for integration tests
//!
//! Shared fixtures for building a scheduler over an in-memory database with
//! a mock runner and a fixed usage source.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use foreman::adapters::runners::{MockBehavior, MockRunner};
use foreman::adapters::sqlite::create_migrated_test_pool;
use foreman::adapters::usage::FixedUsageSource;
use foreman::domain::models::{Project, SchedulerConfig, Subproject, Task, UsageConfig};
use foreman::services::{Scheduler, SchedulerContext};

/// A scheduler wired to test doubles, plus handles to the doubles.
pub struct Harness {
    pub scheduler: Scheduler,
    pub ctx: Arc<SchedulerContext>,
    pub runner: Arc<MockRunner>,
    pub usage: Arc<FixedUsageSource>,
}

impl Harness {
    pub async fn new(behavior: MockBehavior) -> Self {
        Self::with_usage(behavior, FixedUsageSource::allowing()).await
    }

    pub async fn with_usage(behavior: MockBehavior, usage: FixedUsageSource) -> Self {
        let pool = create_migrated_test_pool().await.expect("test pool");
        let runner = Arc::new(MockRunner::with_default_behavior(behavior));
        let usage = Arc::new(usage);
        let ctx = Arc::new(SchedulerContext::with_adapters(
            pool,
            SchedulerConfig::default(),
            &UsageConfig::default(),
            runner.clone(),
            usage.clone(),
        ));
        Self { scheduler: Scheduler::new(Arc::clone(&ctx)), ctx, runner, usage }
    }

    pub async fn project(&self, name: &str) -> Project {
        self.ctx
            .project_service()
            .create_project(Project::new(name, format!("/tmp/{name}")))
            .await
            .expect("create project")
    }

    pub async fn subproject(&self, project: &Project, name: &str) -> Subproject {
        self.ctx
            .project_service()
            .create_subproject(Subproject::new(project.id, name, format!("{}/{name}", project.path)))
            .await
            .expect("create subproject")
    }

    pub async fn task(&self, project: &Project, text: &str) -> Task {
        self.ctx.task_service().create(Task::new(project.id, text)).await.expect("create task")
    }

    pub async fn reload(&self, task: &Task) -> Task {
        self.ctx.task_service().get(task.id).await.expect("task exists")
    }
}

/// Poll `predicate` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
