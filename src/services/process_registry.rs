//! Arena of live agent runs keyed by task id.
//!
//! The registry owns each run's cancellation token and remembers why a run
//! was cancelled, so the outcome can be mapped to the right terminal status.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::PendingAction;

/// Why a live run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Stop,
    Remove,
    Timeout,
    Shutdown,
}

impl CancelReason {
    /// Combine with an earlier reason. Remove wins over everything; otherwise
    /// the first reason sticks.
    pub fn escalate(current: Option<Self>, requested: Self) -> Self {
        match (current, requested) {
            (_, Self::Remove) | (Some(Self::Remove), _) => Self::Remove,
            (Some(current), _) => current,
            (None, requested) => requested,
        }
    }
}

impl From<PendingAction> for CancelReason {
    fn from(action: PendingAction) -> Self {
        match action {
            PendingAction::Stop => Self::Stop,
            PendingAction::Remove => Self::Remove,
        }
    }
}

#[derive(Debug, Clone)]
struct RunHandle {
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
    reason: Option<CancelReason>,
}

#[derive(Default)]
pub struct ProcessRegistry {
    handles: Mutex<HashMap<Uuid, RunHandle>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<Uuid, RunHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new run and hand back its cancellation token.
    pub fn register(&self, task_id: Uuid) -> DomainResult<CancellationToken> {
        let mut handles = self.handles();
        if handles.contains_key(&task_id) {
            return Err(DomainError::AlreadyRunning(task_id));
        }
        let cancel = CancellationToken::new();
        handles.insert(task_id, RunHandle { cancel: cancel.clone(), started_at: Utc::now(), reason: None });
        Ok(cancel)
    }

    /// Cancel a live run. Returns false when no run is registered for the task.
    pub fn cancel(&self, task_id: Uuid, reason: CancelReason) -> bool {
        let mut handles = self.handles();
        let Some(handle) = handles.get_mut(&task_id) else {
            return false;
        };
        handle.reason = Some(CancelReason::escalate(handle.reason, reason));
        handle.cancel.cancel();
        true
    }

    /// Cancel every live run; returns how many were signalled.
    pub fn cancel_all(&self, reason: CancelReason) -> usize {
        let mut handles = self.handles();
        for handle in handles.values_mut() {
            handle.reason = Some(CancelReason::escalate(handle.reason, reason));
            handle.cancel.cancel();
        }
        handles.len()
    }

    pub fn cancel_reason(&self, task_id: Uuid) -> Option<CancelReason> {
        self.handles().get(&task_id).and_then(|h| h.reason)
    }

    pub fn started_at(&self, task_id: Uuid) -> Option<DateTime<Utc>> {
        self.handles().get(&task_id).map(|h| h.started_at)
    }

    /// Drop a finished run. Returns its cancel reason, if any.
    pub fn remove(&self, task_id: Uuid) -> Option<CancelReason> {
        self.handles().remove(&task_id).and_then(|h| h.reason)
    }

    pub fn is_running(&self, task_id: Uuid) -> bool {
        self.handles().contains_key(&task_id)
    }

    pub fn running_ids(&self) -> Vec<Uuid> {
        self.handles().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = ProcessRegistry::new();
        let id = Uuid::new_v4();

        registry.register(id).unwrap();
        assert!(matches!(registry.register(id), Err(DomainError::AlreadyRunning(_))));

        registry.remove(id);
        assert!(registry.register(id).is_ok());
    }

    #[test]
    fn test_cancel_fires_token_and_records_reason() {
        let registry = ProcessRegistry::new();
        let id = Uuid::new_v4();
        let token = registry.register(id).unwrap();

        assert!(registry.cancel(id, CancelReason::Stop));
        assert!(token.is_cancelled());
        assert!(registry.cancel(id, CancelReason::Remove));
        assert!(registry.cancel(id, CancelReason::Stop));
        assert_eq!(registry.remove(id), Some(CancelReason::Remove));
        assert!(!registry.cancel(id, CancelReason::Stop));
    }

    #[test]
    fn test_first_non_remove_reason_sticks() {
        assert_eq!(CancelReason::escalate(Some(CancelReason::Timeout), CancelReason::Stop), CancelReason::Timeout);
        assert_eq!(CancelReason::escalate(None, CancelReason::Stop), CancelReason::Stop);
        assert_eq!(CancelReason::escalate(Some(CancelReason::Stop), CancelReason::Remove), CancelReason::Remove);
    }

    #[test]
    fn test_cancel_all() {
        let registry = ProcessRegistry::new();
        let a = registry.register(Uuid::new_v4()).unwrap();
        let b = registry.register(Uuid::new_v4()).unwrap();

        assert_eq!(registry.cancel_all(CancelReason::Shutdown), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
