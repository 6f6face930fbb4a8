use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HistoryEntry, PendingAction, Task, TaskResponse, TaskScope, TaskStatus};

/// Filters for querying tasks
#[derive(Default, Debug, Clone)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    /// Restrict to one ordering domain; overrides `project_id`
    pub scope: Option<TaskScope>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn scope(scope: TaskScope) -> Self {
        Self { scope: Some(scope), ..Default::default() }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }
}

/// Repository port for task and response persistence.
///
/// Status changes go through compare-and-set methods so that the scheduler
/// and concurrent action callers never overwrite each other's transitions.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a task at the end of its scope; returns it with its assigned priority.
    async fn insert(&self, task: &Task) -> DomainResult<Task>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Tasks matching the filter, ordered by project, scope then priority.
    async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>>;

    /// Persist editable fields unless the task is in progress.
    ///
    /// Returns false when the row is missing or locked.
    async fn update_unlocked(&self, task: &Task) -> DomainResult<bool>;

    async fn set_paused(&self, id: Uuid, paused: bool) -> DomainResult<bool>;

    /// `queued ∧ ¬paused → in_progress`. Returns false when the row no longer qualifies.
    async fn try_admit(&self, id: Uuid) -> DomainResult<bool>;

    /// `in_progress → status` for a terminal status. Returns false when the row
    /// is gone or no longer in progress.
    async fn finish(&self, id: Uuid, status: TaskStatus, last_error: Option<&str>) -> DomainResult<bool>;

    /// Record a stop/remove request against an in-progress task, escalating
    /// any existing request. Returns the request now stored, or `None` when the
    /// task is not in progress.
    async fn request_action(&self, id: Uuid, action: PendingAction) -> DomainResult<Option<PendingAction>>;

    /// In-progress tasks that carry a pending request.
    async fn pending_actions(&self) -> DomainResult<Vec<(Uuid, PendingAction)>>;

    /// Move a terminal task back to `queued` at the end of its scope and clear
    /// its last error. Returns false when the task is not terminal.
    async fn requeue(&self, id: Uuid) -> DomainResult<bool>;

    /// Renumber a scope to match `ordered_ids`, which must name exactly the
    /// scope's tasks.
    async fn reorder(&self, scope: TaskScope, ordered_ids: &[Uuid]) -> DomainResult<()>;

    /// Delete regardless of status. Returns false when missing.
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;

    /// Delete unless in progress. Returns false when missing or running.
    async fn delete_idle(&self, id: Uuid) -> DomainResult<bool>;

    async fn count_in_progress(&self) -> DomainResult<i64>;

    /// Mark every in-progress task failed with `reason`; returns affected ids.
    async fn fail_all_in_progress(&self, reason: &str) -> DomainResult<Vec<Uuid>>;

    async fn append_response(&self, response: &TaskResponse) -> DomainResult<()>;

    /// Responses of one task, newest first.
    async fn list_responses(&self, task_id: Uuid) -> DomainResult<Vec<TaskResponse>>;

    async fn latest_response(&self, task_id: Uuid) -> DomainResult<Option<TaskResponse>>;

    /// Up to `limit` most recent responses of tasks in `scope`, newest first.
    async fn recent_history(&self, scope: TaskScope, limit: u32) -> DomainResult<Vec<HistoryEntry>>;
}
