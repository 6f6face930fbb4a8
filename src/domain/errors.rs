//! Domain errors for the Foreman scheduler.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the Foreman system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Subproject not found: {0}")]
    SubprojectNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Task {0} is in progress and locked for editing; stop it before changing its text, model or reasoning")]
    TaskLocked(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Task {0} already has a running process")]
    AlreadyRunning(Uuid),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Usage check failed: {0}")]
    UsageCheckFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
