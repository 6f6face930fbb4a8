//! Mapping from a finished run to the task's terminal state.
//!
//! The runner only knows how the process ended. Whether that becomes
//! `done`, `failed`, `stopped` or a deletion depends on why the run was
//! cancelled and on any request still pending against the row.

use std::time::Duration;

use crate::domain::models::{PendingAction, TaskStatus};
use crate::domain::ports::RunOutcome;

use super::process_registry::CancelReason;

pub const EMPTY_OUTPUT_REASON: &str = "agent produced no output";
pub const SHUTDOWN_REASON: &str = "interrupted by scheduler shutdown";
pub const RESTART_REASON: &str = "interrupted by scheduler restart";

/// What to do with a task once its run has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Finish { status: TaskStatus, last_error: Option<String> },
    Delete,
}

impl Resolution {
    fn finish(status: TaskStatus) -> Self {
        Self::Finish { status, last_error: None }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Finish { status: TaskStatus::Failed, last_error: Some(reason.into()) }
    }
}

/// Resolve a run outcome.
///
/// A remove request always deletes and an explicit stop always lands on
/// `stopped`, even when the process managed to complete first.
pub fn resolve_outcome(
    outcome: &RunOutcome,
    cancel_reason: Option<CancelReason>,
    pending: Option<PendingAction>,
    timeout: Option<Duration>,
) -> Resolution {
    match (cancel_reason, pending) {
        (Some(CancelReason::Remove), _) | (_, Some(PendingAction::Remove)) => return Resolution::Delete,
        (Some(CancelReason::Stop), _) | (_, Some(PendingAction::Stop)) => return Resolution::finish(TaskStatus::Stopped),
        (Some(CancelReason::Timeout), _) => {
            let secs = timeout.map_or(0, |t| t.as_secs());
            return Resolution::failed(format!("timed out after {secs}s"));
        }
        (Some(CancelReason::Shutdown), _) => return Resolution::failed(SHUTDOWN_REASON),
        (None, None) => {}
    }

    match outcome {
        RunOutcome::Completed(output) if output.trim().is_empty() => Resolution::failed(EMPTY_OUTPUT_REASON),
        RunOutcome::Completed(_) => Resolution::finish(TaskStatus::Done),
        RunOutcome::Failed { reason, .. } => Resolution::failed(reason.clone()),
        RunOutcome::Cancelled { .. } => Resolution::finish(TaskStatus::Stopped),
    }
}
