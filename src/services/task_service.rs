//! Task service: CRUD, ordering and the action surface.
//!
//! Every mutation fires the change notifier. Stop and remove against a
//! running task are recorded on the row first and then signalled to the live
//! run if this process owns it; a daemon in another process picks the request
//! up on its next tick.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PendingAction, Task, TaskAction, TaskResponse, TaskScope, TaskStatus, TaskUpdate};
use crate::domain::ports::{ProjectRepository, TaskFilter, TaskRepository};

use super::change_notifier::{ChangeKind, ChangeNotifier};
use super::process_registry::{CancelReason, ProcessRegistry};
use super::settings_service::SettingsService;

/// Result of applying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// State changed immediately
    Applied,
    /// Nothing to do in the current state
    NoOp,
    /// Cancellation of a running task was requested; the runner finalizes it
    Requested,
}

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    projects: Arc<dyn ProjectRepository>,
    settings: Arc<SettingsService>,
    registry: Arc<ProcessRegistry>,
    notifier: ChangeNotifier,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        projects: Arc<dyn ProjectRepository>,
        settings: Arc<SettingsService>,
        registry: Arc<ProcessRegistry>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self { tasks, projects, settings, registry, notifier }
    }

    async fn check_scope(&self, scope: TaskScope) -> DomainResult<()> {
        let project_id = scope.project_id();
        if self.projects.get_project(project_id).await?.is_none() {
            return Err(DomainError::ProjectNotFound(project_id));
        }
        if let Some(subproject_id) = scope.subproject_id() {
            match self.projects.get_subproject(subproject_id).await? {
                Some(sub) if sub.project_id == project_id => {}
                _ => return Err(DomainError::SubprojectNotFound(subproject_id)),
            }
        }
        Ok(())
    }

    /// Queue a new task at the end of its scope. Blank model or reasoning
    /// take the configured defaults.
    #[tracing::instrument(skip(self, task), fields(project_id = %task.project_id))]
    pub async fn create(&self, mut task: Task) -> DomainResult<Task> {
        self.check_scope(task.scope()).await?;

        if task.model.trim().is_empty() || task.reasoning.trim().is_empty() {
            let settings = self.settings.scheduler_settings().await?;
            if task.model.trim().is_empty() {
                task.model = settings.default_model;
            }
            if task.reasoning.trim().is_empty() {
                task.reasoning = settings.default_reasoning;
            }
        }
        task.status = TaskStatus::Queued;
        task.pending_action = None;
        task.validate().map_err(DomainError::ValidationFailed)?;

        let task = self.tasks.insert(&task).await?;
        tracing::info!(task_id = %task.id, priority = task.priority, "task queued");
        self.notifier.notify_task(ChangeKind::TaskCreated, task.id);
        Ok(task)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Task> {
        self.tasks.get(id).await?.ok_or(DomainError::TaskNotFound(id))
    }

    pub async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
        self.tasks.list(filter).await
    }

    /// Edit a task's fields. Refused while the task is running.
    #[tracing::instrument(skip(self, update), fields(task_id = %id))]
    pub async fn update(&self, id: Uuid, update: &TaskUpdate) -> DomainResult<Task> {
        let mut task = self.get(id).await?;
        if task.is_edit_locked() {
            return Err(DomainError::TaskLocked(id));
        }
        if update.is_empty() {
            return Ok(task);
        }

        update.apply(&mut task);
        task.validate().map_err(DomainError::ValidationFailed)?;

        if !self.tasks.update_unlocked(&task).await? {
            // Admitted or removed since the read
            return match self.tasks.get(id).await? {
                Some(_) => Err(DomainError::TaskLocked(id)),
                None => Err(DomainError::TaskNotFound(id)),
            };
        }
        self.notifier.notify_task(ChangeKind::TaskUpdated, id);
        self.get(id).await
    }

    /// Put a terminal task back in the queue at the end of its scope.
    #[tracing::instrument(skip(self), fields(task_id = %id))]
    pub async fn resubmit(&self, id: Uuid) -> DomainResult<Task> {
        if !self.tasks.requeue(id).await? {
            let task = self.get(id).await?;
            return Err(DomainError::InvalidStateTransition {
                from: task.status.to_string(),
                to: TaskStatus::Queued.to_string(),
                reason: "only done, failed or stopped tasks can be resubmitted".to_string(),
            });
        }
        tracing::info!("task resubmitted");
        self.notifier.notify_task(ChangeKind::TaskUpdated, id);
        self.get(id).await
    }

    /// Renumber a scope; `ordered_ids` must name exactly the scope's tasks.
    pub async fn reorder(&self, scope: TaskScope, ordered_ids: &[Uuid]) -> DomainResult<()> {
        self.check_scope(scope).await?;
        self.tasks.reorder(scope, ordered_ids).await?;
        self.notifier.notify(ChangeKind::TasksReordered);
        Ok(())
    }

    /// Responses of a task, newest first.
    pub async fn responses(&self, id: Uuid) -> DomainResult<Vec<TaskResponse>> {
        self.get(id).await?;
        self.tasks.list_responses(id).await
    }

    pub async fn latest_response(&self, id: Uuid) -> DomainResult<Option<TaskResponse>> {
        self.tasks.latest_response(id).await
    }

    /// Apply `pause`, `resume`, `stop` or `remove`.
    #[tracing::instrument(skip(self), fields(task_id = %id, action = action.as_str()))]
    pub async fn apply_action(&self, id: Uuid, action: TaskAction) -> DomainResult<ActionOutcome> {
        let outcome = match action {
            TaskAction::Pause => self.set_paused(id, true).await?,
            TaskAction::Resume => self.set_paused(id, false).await?,
            TaskAction::Stop => self.stop(id).await?,
            TaskAction::Remove => self.remove(id).await?,
        };
        tracing::debug!(?outcome, "action applied");
        Ok(outcome)
    }

    async fn set_paused(&self, id: Uuid, paused: bool) -> DomainResult<ActionOutcome> {
        let task = self.get(id).await?;
        if task.paused == paused {
            return Ok(ActionOutcome::NoOp);
        }
        if !self.tasks.set_paused(id, paused).await? {
            return Err(DomainError::TaskNotFound(id));
        }
        let kind = if paused { ChangeKind::TaskPaused } else { ChangeKind::TaskResumed };
        self.notifier.notify_task(kind, id);
        Ok(ActionOutcome::Applied)
    }

    async fn stop(&self, id: Uuid) -> DomainResult<ActionOutcome> {
        let task = self.get(id).await?;
        if task.status != TaskStatus::InProgress {
            return Ok(ActionOutcome::NoOp);
        }
        if self.tasks.request_action(id, PendingAction::Stop).await?.is_none() {
            // Finished between the read and the request
            return Ok(ActionOutcome::NoOp);
        }
        let local = self.registry.cancel(id, CancelReason::Stop);
        tracing::info!(local, "stop requested");
        self.notifier.notify_task(ChangeKind::TaskUpdated, id);
        Ok(ActionOutcome::Requested)
    }

    async fn remove(&self, id: Uuid) -> DomainResult<ActionOutcome> {
        if self.tasks.delete_idle(id).await? {
            tracing::info!("task removed");
            self.notifier.notify_task(ChangeKind::TaskRemoved, id);
            return Ok(ActionOutcome::Applied);
        }
        if self.tasks.get(id).await?.is_none() {
            return Ok(ActionOutcome::NoOp);
        }

        if self.tasks.request_action(id, PendingAction::Remove).await?.is_some() {
            let local = self.registry.cancel(id, CancelReason::Remove);
            tracing::info!(local, "removal of running task requested");
            self.notifier.notify_task(ChangeKind::TaskUpdated, id);
            return Ok(ActionOutcome::Requested);
        }

        // Reached a terminal state in the meantime
        if self.tasks.delete_idle(id).await? {
            self.notifier.notify_task(ChangeKind::TaskRemoved, id);
            return Ok(ActionOutcome::Applied);
        }
        Ok(ActionOutcome::NoOp)
    }
}
