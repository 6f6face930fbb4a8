//! Mock agent runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::ports::{AgentInvocation, AgentRunner, RunOutcome};

/// What a mock run does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Finish with this output after the delay
    Complete { output: String, delay: Duration },
    /// Fail with this reason after the delay
    Fail { reason: String, delay: Duration },
    /// Run until cancelled, emitting this partial output
    Hang { partial_output: String },
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self::complete("Mock task completed successfully.")
    }
}

impl MockBehavior {
    pub fn complete(output: impl Into<String>) -> Self {
        Self::Complete { output: output.into(), delay: Duration::ZERO }
    }

    pub fn complete_after(output: impl Into<String>, delay: Duration) -> Self {
        Self::Complete { output: output.into(), delay }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail { reason: reason.into(), delay: Duration::ZERO }
    }

    pub fn hang() -> Self {
        Self::Hang { partial_output: String::new() }
    }
}

/// Mock runner that records every invocation and tracks peak concurrency.
pub struct MockRunner {
    default_behavior: MockBehavior,
    overrides: Arc<RwLock<HashMap<Uuid, MockBehavior>>>,
    invocations: Arc<RwLock<Vec<AgentInvocation>>>,
    running: AtomicUsize,
    peak_running: AtomicUsize,
    cancelled: AtomicUsize,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::with_default_behavior(MockBehavior::default())
    }

    pub fn with_default_behavior(behavior: MockBehavior) -> Self {
        Self {
            default_behavior: behavior,
            overrides: Arc::new(RwLock::new(HashMap::new())),
            invocations: Arc::new(RwLock::new(Vec::new())),
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    /// Set a specific behavior for a task ID.
    pub async fn set_behavior_for_task(&self, task_id: Uuid, behavior: MockBehavior) {
        self.overrides.write().await.insert(task_id, behavior);
    }

    pub async fn invocations(&self) -> Vec<AgentInvocation> {
        self.invocations.read().await.clone()
    }

    pub async fn invocation_for(&self, task_id: Uuid) -> Option<AgentInvocation> {
        self.invocations.read().await.iter().find(|i| i.task_id == task_id).cloned()
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of runs that were in flight at once.
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    pub fn cancelled_runs(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn behavior_for(&self, task_id: Uuid) -> MockBehavior {
        self.overrides
            .read()
            .await
            .get(&task_id)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone())
    }

    async fn play(behavior: MockBehavior, cancel: &CancellationToken) -> RunOutcome {
        let (delay, finished) = match behavior {
            MockBehavior::Complete { output, delay } => (delay, RunOutcome::Completed(output)),
            MockBehavior::Fail { reason, delay } => (delay, RunOutcome::failed(reason)),
            MockBehavior::Hang { partial_output } => {
                cancel.cancelled().await;
                return RunOutcome::Cancelled { output: partial_output };
            }
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => finished,
            () = cancel.cancelled() => RunOutcome::Cancelled { output: String::new() },
        }
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRunner for MockRunner {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, invocation: AgentInvocation, cancel: CancellationToken) -> RunOutcome {
        let behavior = self.behavior_for(invocation.task_id).await;
        self.invocations.write().await.push(invocation);

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now_running, Ordering::SeqCst);

        let outcome = if cancel.is_cancelled() {
            RunOutcome::Cancelled { output: String::new() }
        } else {
            Self::play(behavior, &cancel).await
        };

        if matches!(outcome, RunOutcome::Cancelled { .. }) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
