//! Task domain model.
//!
//! A task is a free-form instruction queued under a project or one of its
//! subprojects. The scheduler admits queued tasks one at a time and runs each
//! through the configured agent CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for admission
    Queued,
    /// An agent process is running for this task
    InProgress,
    /// Process exited successfully with output
    Done,
    /// Process failed, could not be spawned, or produced no output
    Failed,
    /// Cancelled by an explicit stop
    Stopped,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "in_progress" | "in-progress" | "running" => Some(Self::InProgress),
            "done" | "complete" | "completed" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "stopped" | "cancelled" | "canceled" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Stopped)
    }

    /// Valid scheduler-driven transitions from this status.
    ///
    /// Terminal states only leave through an explicit resubmit, which is not a
    /// scheduler transition.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Queued => vec![Self::InProgress],
            Self::InProgress => vec![Self::Done, Self::Failed, Self::Stopped],
            Self::Done | Self::Failed | Self::Stopped => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cancellation request recorded against an in-progress task and honoured
/// by whichever process owns the live agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    Stop,
    Remove,
}

impl PendingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Remove => "remove",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(Self::Stop),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }

    /// Requests only escalate: a remove may replace a stop, never the reverse.
    pub fn escalate(current: Option<Self>, requested: Self) -> Self {
        match (current, requested) {
            (Some(Self::Remove), _) | (_, Self::Remove) => Self::Remove,
            _ => Self::Stop,
        }
    }
}

/// Named action an external caller may apply to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Pause,
    Resume,
    Stop,
    Remove,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Remove => "remove",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pause" => Some(Self::Pause),
            "resume" | "unpause" => Some(Self::Resume),
            "stop" => Some(Self::Stop),
            "remove" | "delete" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// The ordering domain a task's priority belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskScope {
    /// Tasks attached directly to a project.
    Project { project_id: Uuid },
    /// Tasks attached to one subproject.
    Subproject { project_id: Uuid, subproject_id: Uuid },
}

impl TaskScope {
    pub fn new(project_id: Uuid, subproject_id: Option<Uuid>) -> Self {
        match subproject_id {
            Some(subproject_id) => Self::Subproject { project_id, subproject_id },
            None => Self::Project { project_id },
        }
    }

    pub fn project_id(&self) -> Uuid {
        match self {
            Self::Project { project_id } | Self::Subproject { project_id, .. } => *project_id,
        }
    }

    pub fn subproject_id(&self) -> Option<Uuid> {
        match self {
            Self::Project { .. } => None,
            Self::Subproject { subproject_id, .. } => Some(*subproject_id),
        }
    }
}

/// A queued instruction for the agent CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    /// `None` for project-level tasks
    pub subproject_id: Option<Uuid>,
    pub text: String,
    pub model: String,
    pub reasoning: String,
    pub include_previous_context: bool,
    pub previous_context_messages: u32,
    pub status: TaskStatus,
    pub paused: bool,
    /// Position within the scope; lower runs first
    pub priority: i64,
    /// Free-form tags, e.g. the template a task was created from
    pub metadata: Option<serde_json::Value>,
    /// Reason for the most recent failure
    pub last_error: Option<String>,
    pub pending_action: Option<PendingAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a queued project-level task. Priority is assigned on insert.
    pub fn new(project_id: Uuid, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            subproject_id: None,
            text: text.into(),
            model: String::new(),
            reasoning: String::new(),
            include_previous_context: false,
            previous_context_messages: 0,
            status: TaskStatus::default(),
            paused: false,
            priority: 0,
            metadata: None,
            last_error: None,
            pending_action: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Attach the task to a subproject.
    pub fn with_subproject(mut self, subproject_id: Uuid) -> Self {
        self.subproject_id = Some(subproject_id);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Include the last `messages` responses from the same scope in the prompt.
    pub fn with_previous_context(mut self, messages: u32) -> Self {
        self.include_previous_context = true;
        self.previous_context_messages = messages;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    pub fn scope(&self) -> TaskScope {
        TaskScope::new(self.project_id, self.subproject_id)
    }

    /// Editing text, model or reasoning is refused while the task runs.
    pub fn is_edit_locked(&self) -> bool {
        self.status == TaskStatus::InProgress
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the task itself allows admission. Scope pause flags are checked
    /// by the ready queue.
    pub fn is_admissible(&self) -> bool {
        self.status == TaskStatus::Queued && !self.paused
    }

    /// Whether prior responses should be folded into the prompt.
    pub fn wants_history(&self) -> bool {
        self.include_previous_context && self.previous_context_messages > 0
    }

    /// Validate task.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Task text cannot be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("Task model cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Partial update of a task's editable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub model: Option<String>,
    pub reasoning: Option<String>,
    pub include_previous_context: Option<bool>,
    pub previous_context_messages: Option<u32>,
    pub metadata: Option<serde_json::Value>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the update to a task in memory.
    pub fn apply(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text.clone_from(text);
        }
        if let Some(model) = &self.model {
            task.model.clone_from(model);
        }
        if let Some(reasoning) = &self.reasoning {
            task.reasoning.clone_from(reasoning);
        }
        if let Some(include) = self.include_previous_context {
            task.include_previous_context = include;
        }
        if let Some(messages) = self.previous_context_messages {
            task.previous_context_messages = messages;
        }
        if let Some(metadata) = &self.metadata {
            task.metadata = Some(metadata.clone());
        }
        task.updated_at = Utc::now();
    }
}
