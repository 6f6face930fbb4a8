//! The scheduler daemon.
//!
//! One loop wakes on a fixed interval and on recheck signals from the change
//! notifier. Each tick reads the settings and the project tree, honours
//! stop/remove requests recorded by other processes, then walks the ready
//! queue admitting tasks while both gates allow. Every admitted task runs on
//! its own tokio task; the loop never awaits a running process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{PendingAction, TaskResponse, TaskScope, TaskStatus};
use crate::domain::ports::{AgentInvocation, RunOutcome, TaskFilter};

use super::change_notifier::ChangeKind;
use super::concurrency_gate::Permit;
use super::context::SchedulerContext;
use super::process_registry::CancelReason;
use super::ready_queue;
use super::task_state::{resolve_outcome, Resolution, RESTART_REASON};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub admitted: Vec<Uuid>,
    /// Cancellation requests delivered to live runs
    pub cancelled: Vec<Uuid>,
    /// Orphaned rows finalized from a pending request
    pub finalized: Vec<Uuid>,
    /// Admission was refused by the usage gate
    pub usage_blocked: bool,
}

pub struct Scheduler {
    ctx: Arc<SchedulerContext>,
    /// Permits held for `in_progress` rows left by an earlier daemon
    orphans: HashMap<Uuid, Permit>,
    runs: JoinSet<()>,
}

impl Scheduler {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self { ctx, orphans: HashMap::new(), runs: JoinSet::new() }
    }

    pub fn context(&self) -> &Arc<SchedulerContext> {
        &self.ctx
    }

    /// Reconcile rows left `in_progress` by a previous daemon.
    ///
    /// With recovery enabled they are failed outright. Otherwise each keeps a
    /// gate slot until a stop or remove request finalizes it.
    pub async fn recover(&mut self) -> DomainResult<usize> {
        if self.ctx.config.recover_orphaned_tasks {
            let failed = self.ctx.tasks.fail_all_in_progress(RESTART_REASON).await?;
            for id in &failed {
                tracing::warn!(task_id = %id, "failed task interrupted by restart");
                self.ctx.notifier.notify_task(ChangeKind::TaskFinished, *id);
            }
            return Ok(failed.len());
        }

        let running = self.ctx.tasks.list(&TaskFilter::status(TaskStatus::InProgress)).await?;
        for task in &running {
            self.orphans.insert(task.id, self.ctx.gate.adopt(task.id));
        }
        if !running.is_empty() {
            tracing::warn!(count = running.len(), "adopted in-progress tasks from an earlier run");
        }
        Ok(running.len())
    }

    /// Run until `shutdown` fires, then cancel live runs and wait for them.
    pub async fn run(mut self, shutdown: CancellationToken) -> DomainResult<()> {
        self.recover().await?;

        let mut signals = self.ctx.notifier.subscribe();
        let mut ticker = tokio::time::interval(Duration::from_millis(self.ctx.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(poll_interval_ms = self.ctx.config.poll_interval_ms, runner = self.ctx.runner.name(), "scheduler started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                signal = signals.recv() => match signal {
                    Some(signal) if signal.kind.wakes_scheduler() => {}
                    Some(_) => continue,
                    None => break,
                },
            }

            match self.tick().await {
                Ok(report) if !report.admitted.is_empty() => {
                    tracing::debug!(admitted = report.admitted.len(), "tick admitted tasks");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "scheduler tick failed"),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Cancel every live run and wait for each to settle.
    pub async fn shutdown(&mut self) {
        let cancelled = self.ctx.registry.cancel_all(CancelReason::Shutdown);
        tracing::info!(cancelled, "scheduler shutting down");
        self.wait_for_runs().await;
        self.orphans.clear();
    }

    /// Wait until every spawned run has finished and been recorded.
    pub async fn wait_for_runs(&mut self) {
        while let Some(joined) = self.runs.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "task run panicked");
            }
        }
    }

    pub fn live_runs(&self) -> usize {
        self.runs.len()
    }

    /// One pass of the scheduler loop.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&mut self) -> DomainResult<TickReport> {
        while let Some(joined) = self.runs.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "task run panicked");
            }
        }

        let mut report = TickReport::default();
        let settings = self.ctx.settings.scheduler_settings().await?;
        let tree = self.ctx.load_tree().await?;

        // Rows deleted out from under a live run
        for id in self.ctx.registry.running_ids() {
            if tree.find_task(id).is_none() && self.ctx.registry.cancel(id, CancelReason::Remove) {
                tracing::info!(task_id = %id, "task row removed externally; cancelling run");
                report.cancelled.push(id);
            }
        }
        let before = self.orphans.len();
        self.orphans
            .retain(|id, _| tree.find_task(*id).is_some_and(|t| t.status == TaskStatus::InProgress));
        if self.orphans.len() != before {
            self.ctx.notifier.notify(ChangeKind::SlotFreed);
        }

        self.honour_pending_actions(&mut report).await?;

        let limit = settings.max_parallel_tasks;
        let mut usage_allowed: Option<bool> = None;
        let mut blocked: HashSet<TaskScope> = HashSet::new();

        for task in ready_queue::eligible_tasks(&tree) {
            if self.ctx.gate.is_full(limit) {
                break;
            }
            let scope = task.scope();
            if blocked.contains(&scope) {
                continue;
            }

            let allowed = match usage_allowed {
                Some(allowed) => allowed,
                None => {
                    let usage = self.ctx.usage.check_allowed(&settings.usage, false).await;
                    if !usage.allowed {
                        tracing::info!(reason = usage.error.as_deref().unwrap_or("limit reached"), "usage gate closed");
                    }
                    usage_allowed = Some(usage.allowed);
                    usage.allowed
                }
            };
            if !allowed {
                report.usage_blocked = true;
                break;
            }

            let Some(permit) = self.ctx.gate.try_admit(task.id, limit) else {
                continue;
            };

            let prompt = match self.ctx.assembler.build_prompt(task, &settings.prompts).await {
                Ok(prompt) => prompt,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "cannot assemble prompt; skipping scope this tick");
                    blocked.insert(scope);
                    continue;
                }
            };
            let Some(working_dir) = tree.working_dir_for(task) else {
                blocked.insert(scope);
                continue;
            };

            match self.ctx.tasks.try_admit(task.id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(task_id = %task.id, "task changed since snapshot; not admitted");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "admission failed; skipping scope this tick");
                    blocked.insert(scope);
                    continue;
                }
            }

            let cancel = match self.ctx.registry.register(task.id) {
                Ok(cancel) => cancel,
                Err(e) => {
                    tracing::error!(task_id = %task.id, error = %e, "cannot register run");
                    self.ctx.tasks.finish(task.id, TaskStatus::Failed, Some(&e.to_string())).await?;
                    continue;
                }
            };

            let invocation = AgentInvocation {
                task_id: task.id,
                command_template: settings.cli_command_template.clone(),
                prompt,
                model: task.model.clone(),
                reasoning: task.reasoning.clone(),
                working_dir: working_dir.into(),
            };
            tracing::info!(
                task_id = %task.id,
                project_id = %task.project_id,
                model = %task.model,
                "task admitted"
            );
            self.runs.spawn(execute(Arc::clone(&self.ctx), permit, invocation, cancel, settings.task_timeout));
            self.ctx.notifier.notify_task(ChangeKind::TaskStarted, task.id);
            report.admitted.push(task.id);
        }

        Ok(report)
    }

    /// Deliver stop/remove requests stored on rows. Live runs are cancelled;
    /// adopted orphans have no process and are finalized directly.
    async fn honour_pending_actions(&mut self, report: &mut TickReport) -> DomainResult<()> {
        for (id, action) in self.ctx.tasks.pending_actions().await? {
            if self.ctx.registry.is_running(id) {
                let already = self.ctx.registry.cancel_reason(id);
                self.ctx.registry.cancel(id, action.into());
                if already.is_none() {
                    report.cancelled.push(id);
                }
                continue;
            }
            let Some(mut permit) = self.orphans.remove(&id) else {
                continue;
            };

            match action {
                PendingAction::Stop => {
                    self.ctx.tasks.finish(id, TaskStatus::Stopped, None).await?;
                    self.ctx.notifier.notify_task(ChangeKind::TaskFinished, id);
                }
                PendingAction::Remove => {
                    self.ctx.tasks.delete(id).await?;
                    self.ctx.notifier.notify_task(ChangeKind::TaskRemoved, id);
                }
            }
            tracing::info!(task_id = %id, action = action.as_str(), "finalized orphaned task");
            permit.release();
            self.ctx.notifier.notify(ChangeKind::SlotFreed);
            report.finalized.push(id);
        }
        Ok(())
    }
}

/// Drive one admitted task to its terminal state.
async fn execute(
    ctx: Arc<SchedulerContext>,
    mut permit: Permit,
    invocation: AgentInvocation,
    cancel: CancellationToken,
    timeout: Option<Duration>,
) {
    let task_id = invocation.task_id;
    let run = ctx.runner.run(invocation, cancel);
    let outcome = match timeout {
        None => run.await,
        Some(limit) => {
            tokio::pin!(run);
            tokio::select! {
                outcome = &mut run => outcome,
                () = tokio::time::sleep(limit) => {
                    tracing::warn!(task_id = %task_id, timeout_secs = limit.as_secs(), "task timed out");
                    ctx.registry.cancel(task_id, CancelReason::Timeout);
                    run.await
                }
            }
        }
    };

    if let Err(e) = finish_run(&ctx, task_id, &outcome, timeout).await {
        tracing::error!(task_id = %task_id, error = %e, "failed to record task outcome");
    }

    // The handle goes only after the row is final, so a concurrent stop never
    // sees a live row without a handle.
    ctx.registry.remove(task_id);
    permit.release();
    ctx.notifier.notify(ChangeKind::SlotFreed);
}

async fn finish_run(
    ctx: &SchedulerContext,
    task_id: Uuid,
    outcome: &RunOutcome,
    timeout: Option<Duration>,
) -> DomainResult<()> {
    let reason = ctx.registry.cancel_reason(task_id);
    let Some(row) = ctx.tasks.get(task_id).await? else {
        tracing::info!(task_id = %task_id, "task removed during run");
        ctx.notifier.notify_task(ChangeKind::TaskRemoved, task_id);
        return Ok(());
    };

    match resolve_outcome(outcome, reason, row.pending_action, timeout) {
        Resolution::Delete => {
            ctx.tasks.delete(task_id).await?;
            tracing::info!(task_id = %task_id, "task removed after cancellation");
            ctx.notifier.notify_task(ChangeKind::TaskRemoved, task_id);
        }
        Resolution::Finish { mut status, mut last_error } => {
            let output = outcome.output();
            if !output.trim().is_empty() {
                // The row must still leave in_progress, otherwise it stays locked
                // with no live run behind it.
                if let Err(e) = ctx.tasks.append_response(&TaskResponse::new(task_id, output)).await {
                    tracing::error!(task_id = %task_id, error = %e, "could not record task output");
                    let note = format!("could not record output: {e}");
                    if status == TaskStatus::Done {
                        status = TaskStatus::Failed;
                    }
                    last_error = Some(match last_error {
                        Some(previous) => format!("{previous}; {note}"),
                        None => note,
                    });
                }
            }
            if !ctx.tasks.finish(task_id, status, last_error.as_deref()).await? {
                tracing::warn!(task_id = %task_id, "task was no longer in progress when its run ended");
            }
            match &last_error {
                Some(error) => tracing::warn!(task_id = %task_id, status = %status, error = %error, "task finished"),
                None => tracing::info!(task_id = %task_id, status = %status, "task finished"),
            }
            ctx.notifier.notify_task(ChangeKind::TaskFinished, task_id);
        }
    }
    Ok(())
}
