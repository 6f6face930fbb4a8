//! Change notifier: broadcast "sync" signals after every state mutation.
//!
//! Subscribers (the scheduler loop, UI bridges) only learn that something
//! changed and what kind of change it was; they re-read the entity store for
//! details. Delivery is at-least-once: a subscriber that falls behind gets a
//! single `Resync` signal in place of the dropped ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// What kind of mutation a signal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    TaskCreated,
    TaskUpdated,
    TaskPaused,
    TaskResumed,
    TaskStarted,
    TaskFinished,
    TaskRemoved,
    TasksReordered,
    ScopeCreated,
    ScopeUpdated,
    ScopePaused,
    ScopeResumed,
    ScopeRemoved,
    ScopesReordered,
    SlotFreed,
    SettingsChanged,
    /// Signals were dropped for this subscriber; refresh everything
    Resync,
}

impl ChangeKind {
    /// Whether this change can make a queued task newly admissible.
    pub fn wakes_scheduler(&self) -> bool {
        matches!(
            self,
            Self::TaskCreated
                | Self::TaskResumed
                | Self::TaskUpdated
                | Self::TasksReordered
                | Self::ScopeResumed
                | Self::ScopesReordered
                | Self::SlotFreed
                | Self::SettingsChanged
                | Self::Resync
        )
    }
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSignal {
    pub kind: ChangeKind,
    pub sequence: u64,
    pub task_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

struct NotifierInner {
    sender: broadcast::Sender<SyncSignal>,
    sequence: AtomicU64,
}

/// Cloneable handle to the broadcast channel.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(NotifierInner { sender, sequence: AtomicU64::new(0) }),
        }
    }

    pub fn notify(&self, kind: ChangeKind) {
        self.send(kind, None);
    }

    pub fn notify_task(&self, kind: ChangeKind, task_id: Uuid) {
        self.send(kind, Some(task_id));
    }

    fn send(&self, kind: ChangeKind, task_id: Option<Uuid>) {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(?kind, sequence, ?task_id, "sync signal");
        // No subscribers is not an error
        let _ = self.inner.sender.send(SyncSignal { kind, sequence, task_id, at: Utc::now() });
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription { receiver: self.inner.sender.subscribe() }
    }

    /// Number of signals sent so far.
    pub fn current_sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

/// Receiving side of a notifier subscription.
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<SyncSignal>,
}

impl ChangeSubscription {
    /// Wait for the next signal. `None` once every notifier handle is gone.
    pub async fn recv(&mut self) -> Option<SyncSignal> {
        match self.receiver.recv().await {
            Ok(signal) => Some(signal),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "change subscriber lagged");
                Some(SyncSignal { kind: ChangeKind::Resync, sequence: 0, task_id: None, at: Utc::now() })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
