//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{
    format_datetime, parse_datetime, parse_optional_datetime, parse_optional_json, parse_optional_uuid,
    parse_uuid, validate_full_ordering,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    HistoryEntry, PendingAction, Task, TaskResponse, TaskScope, TaskStatus,
};
use crate::domain::ports::{TaskFilter, TaskRepository};

const TERMINAL_STATUSES: &str = "('done', 'failed', 'stopped')";

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert(&self, task: &Task) -> DomainResult<Task> {
        let metadata = task.metadata.as_ref().map(serde_json::to_string).transpose()?;
        // The next priority is computed inside the INSERT so concurrent writers
        // to the same scope cannot both claim it.
        let (priority,): (i64,) = sqlx::query_as(
            r#"INSERT INTO tasks (id, project_id, subproject_id, text, model, reasoning,
               include_previous_context, previous_context_messages, status, paused, priority,
               metadata, last_error, pending_action, created_at, updated_at, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                   (SELECT COALESCE(MAX(priority), -1) + 1 FROM tasks WHERE project_id = ? AND subproject_id IS ?),
                   ?, ?, ?, ?, ?, ?, ?)
               RETURNING priority"#,
        )
        .bind(task.id.to_string())
        .bind(task.project_id.to_string())
        .bind(task.subproject_id.map(|id| id.to_string()))
        .bind(&task.text)
        .bind(&task.model)
        .bind(&task.reasoning)
        .bind(task.include_previous_context)
        .bind(i64::from(task.previous_context_messages))
        .bind(task.status.as_str())
        .bind(task.paused)
        .bind(task.project_id.to_string())
        .bind(task.subproject_id.map(|id| id.to_string()))
        .bind(&metadata)
        .bind(&task.last_error)
        .bind(task.pending_action.map(|a| a.as_str()))
        .bind(format_datetime(&task.created_at))
        .bind(format_datetime(&task.updated_at))
        .bind(task.started_at.as_ref().map(format_datetime))
        .bind(task.completed_at.as_ref().map(format_datetime))
        .fetch_one(&self.pool)
        .await?;

        Ok(Task { priority, ..task.clone() })
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<Option<String>> = Vec::new();

        if let Some(scope) = filter.scope {
            query.push_str(" AND project_id = ? AND subproject_id IS ?");
            bindings.push(Some(scope.project_id().to_string()));
            bindings.push(scope.subproject_id().map(|id| id.to_string()));
        } else if let Some(project_id) = filter.project_id {
            query.push_str(" AND project_id = ?");
            bindings.push(Some(project_id.to_string()));
        }
        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(Some(status.as_str().to_string()));
        }

        query.push_str(" ORDER BY project_id, COALESCE(subproject_id, ''), priority, created_at");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_unlocked(&self, task: &Task) -> DomainResult<bool> {
        let metadata = task.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            r#"UPDATE tasks SET text = ?, model = ?, reasoning = ?, include_previous_context = ?,
               previous_context_messages = ?, metadata = ?, updated_at = ?
               WHERE id = ? AND status != 'in_progress'"#,
        )
        .bind(&task.text)
        .bind(&task.model)
        .bind(&task.reasoning)
        .bind(task.include_previous_context)
        .bind(i64::from(task.previous_context_messages))
        .bind(&metadata)
        .bind(format_datetime(&Utc::now()))
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_paused(&self, id: Uuid, paused: bool) -> DomainResult<bool> {
        let result = sqlx::query("UPDATE tasks SET paused = ?, updated_at = ? WHERE id = ?")
            .bind(paused)
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_admit(&self, id: Uuid) -> DomainResult<bool> {
        let now = format_datetime(&Utc::now());
        let result = sqlx::query(
            r#"UPDATE tasks SET status = 'in_progress', started_at = ?, completed_at = NULL,
               pending_action = NULL, updated_at = ?
               WHERE id = ? AND status = 'queued' AND paused = 0
                 AND NOT EXISTS (SELECT 1 FROM projects p WHERE p.id = tasks.project_id AND p.paused = 1)
                 AND NOT EXISTS (SELECT 1 FROM subprojects s WHERE s.id = tasks.subproject_id AND s.paused = 1)"#,
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn finish(&self, id: Uuid, status: TaskStatus, last_error: Option<&str>) -> DomainResult<bool> {
        if !TaskStatus::InProgress.can_transition_to(status) {
            return Err(DomainError::InvalidStateTransition {
                from: TaskStatus::InProgress.to_string(),
                to: status.to_string(),
                reason: "a run can only end in a terminal status".to_string(),
            });
        }

        let now = format_datetime(&Utc::now());
        let result = sqlx::query(
            r#"UPDATE tasks SET status = ?, last_error = COALESCE(?, last_error), pending_action = NULL,
               completed_at = ?, updated_at = ?
               WHERE id = ? AND status = 'in_progress'"#,
        )
        .bind(status.as_str())
        .bind(last_error)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn request_action(&self, id: Uuid, action: PendingAction) -> DomainResult<Option<PendingAction>> {
        let result = sqlx::query(
            r#"UPDATE tasks SET pending_action = CASE WHEN pending_action = 'remove' THEN 'remove' ELSE ? END,
               updated_at = ?
               WHERE id = ? AND status = 'in_progress'"#,
        )
        .bind(action.as_str())
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let stored: Option<(Option<String>,)> = sqlx::query_as("SELECT pending_action FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(stored
            .and_then(|(value,)| value)
            .and_then(|value| PendingAction::from_str(&value))
            .or(Some(action)))
    }

    async fn pending_actions(&self) -> DomainResult<Vec<(Uuid, PendingAction)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT id, pending_action FROM tasks WHERE status = 'in_progress' AND pending_action IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, action)| {
                let action = PendingAction::from_str(&action)
                    .ok_or_else(|| DomainError::SerializationError(format!("Invalid pending action: {action}")))?;
                Ok((parse_uuid(&id)?, action))
            })
            .collect()
    }

    async fn requeue(&self, id: Uuid) -> DomainResult<bool> {
        let query = format!(
            r#"UPDATE tasks SET status = 'queued',
               priority = (SELECT COALESCE(MAX(t.priority), -1) + 1 FROM tasks t
                           WHERE t.project_id = tasks.project_id AND t.subproject_id IS tasks.subproject_id),
               last_error = NULL, pending_action = NULL, started_at = NULL, completed_at = NULL, updated_at = ?
               WHERE id = ? AND status IN {TERMINAL_STATUSES}"#
        );
        let result = sqlx::query(&query)
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reorder(&self, scope: TaskScope, ordered_ids: &[Uuid]) -> DomainResult<()> {
        let project_id = scope.project_id().to_string();
        let subproject_id = scope.subproject_id().map(|id| id.to_string());
        let mut tx = self.pool.begin().await?;

        let current: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM tasks WHERE project_id = ? AND subproject_id IS ?")
                .bind(&project_id)
                .bind(&subproject_id)
                .fetch_all(&mut *tx)
                .await?;
        let current: Vec<String> = current.into_iter().map(|(id,)| id).collect();
        validate_full_ordering(&current, ordered_ids)?;

        // Park the scope on negative priorities so the unique index holds mid-update.
        sqlx::query("UPDATE tasks SET priority = -1 - priority WHERE project_id = ? AND subproject_id IS ?")
            .bind(&project_id)
            .bind(&subproject_id)
            .execute(&mut *tx)
            .await?;

        let now = format_datetime(&Utc::now());
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE tasks SET priority = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(&now)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_idle(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND status != 'in_progress'")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_in_progress(&self) -> DomainResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status = 'in_progress'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn fail_all_in_progress(&self, reason: &str) -> DomainResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM tasks WHERE status = 'in_progress'")
            .fetch_all(&mut *tx)
            .await?;

        let now = format_datetime(&Utc::now());
        sqlx::query(
            r#"UPDATE tasks SET status = 'failed', last_error = ?, pending_action = NULL,
               completed_at = ?, updated_at = ?
               WHERE status = 'in_progress'"#,
        )
        .bind(reason)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        ids.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }

    async fn append_response(&self, response: &TaskResponse) -> DomainResult<()> {
        sqlx::query("INSERT INTO task_responses (id, task_id, output, created_at) VALUES (?, ?, ?, ?)")
            .bind(response.id.to_string())
            .bind(response.task_id.to_string())
            .bind(&response.output)
            .bind(format_datetime(&response.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_responses(&self, task_id: Uuid) -> DomainResult<Vec<TaskResponse>> {
        let rows: Vec<ResponseRow> = sqlx::query_as(
            "SELECT * FROM task_responses WHERE task_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn latest_response(&self, task_id: Uuid) -> DomainResult<Option<TaskResponse>> {
        let row: Option<ResponseRow> = sqlx::query_as(
            "SELECT * FROM task_responses WHERE task_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn recent_history(&self, scope: TaskScope, limit: u32) -> DomainResult<Vec<HistoryEntry>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"SELECT r.task_id, t.text, r.output, r.created_at
               FROM task_responses r
               INNER JOIN tasks t ON t.id = r.task_id
               WHERE t.project_id = ? AND t.subproject_id IS ?
               ORDER BY r.created_at DESC, r.rowid DESC
               LIMIT ?"#,
        )
        .bind(scope.project_id().to_string())
        .bind(scope.subproject_id().map(|id| id.to_string()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(task_id, task_text, output, created_at)| {
                Ok(HistoryEntry {
                    task_id: parse_uuid(&task_id)?,
                    task_text,
                    output,
                    created_at: parse_datetime(&created_at)?,
                })
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    project_id: String,
    subproject_id: Option<String>,
    text: String,
    model: String,
    reasoning: String,
    include_previous_context: bool,
    previous_context_messages: i64,
    status: String,
    paused: bool,
    priority: i64,
    metadata: Option<String>,
    last_error: Option<String>,
    pending_action: Option<String>,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        let pending_action = row
            .pending_action
            .map(|s| {
                PendingAction::from_str(&s)
                    .ok_or_else(|| DomainError::SerializationError(format!("Invalid pending action: {s}")))
            })
            .transpose()?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            subproject_id: parse_optional_uuid(row.subproject_id)?,
            text: row.text,
            model: row.model,
            reasoning: row.reasoning,
            include_previous_context: row.include_previous_context,
            previous_context_messages: u32::try_from(row.previous_context_messages).unwrap_or(0),
            status,
            paused: row.paused,
            priority: row.priority,
            metadata: parse_optional_json(row.metadata)?,
            last_error: row.last_error,
            pending_action,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            started_at: parse_optional_datetime(row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: String,
    task_id: String,
    output: String,
    created_at: String,
}

impl TryFrom<ResponseRow> for TaskResponse {
    type Error = DomainError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        Ok(TaskResponse {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            output: row.output,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
