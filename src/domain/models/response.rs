//! Task response model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output captured from one agent run of a task.
///
/// A task accumulates one response per run that produced output; the latest
/// is the one with the newest `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub task_id: Uuid,
    pub output: String,
    pub created_at: DateTime<Utc>,
}

impl TaskResponse {
    pub fn new(task_id: Uuid, output: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            output: output.into(),
            created_at: Utc::now(),
        }
    }
}

/// A response joined with the text of the task that produced it, used when
/// replaying scope history into a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub task_id: Uuid,
    pub task_text: String,
    pub output: String,
    pub created_at: DateTime<Utc>,
}
