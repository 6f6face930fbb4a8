//! End-to-end scheduler behaviour over an in-memory database.

mod common;

use std::time::Duration;

use common::{wait_until, Harness};
use foreman::adapters::runners::MockBehavior;
use foreman::adapters::usage::FixedUsageSource;
use foreman::domain::errors::DomainError;
use foreman::domain::models::{SettingKey, Task, TaskAction, TaskStatus, TaskUpdate, UsageReport};
use foreman::services::ActionOutcome;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn paused_task_is_skipped() {
    let mut h = Harness::new(MockBehavior::complete("ok")).await;
    let project = h.project("api").await;
    let first = h.task(&project, "first").await;
    let second = h.task(&project, "second").await;
    h.ctx.task_service().apply_action(first.id, TaskAction::Pause).await.unwrap();

    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.admitted, vec![second.id]);
    h.scheduler.wait_for_runs().await;

    assert_eq!(h.reload(&first).await.status, TaskStatus::Queued);
    assert_eq!(h.reload(&second).await.status, TaskStatus::Done);
}

#[tokio::test]
async fn paused_project_and_subproject_are_skipped() {
    let mut h = Harness::new(MockBehavior::complete("ok")).await;
    let paused = h.project("paused").await;
    let active = h.project("active").await;
    let sub = h.subproject(&active, "docs").await;
    h.task(&paused, "never runs").await;
    let nested = h
        .ctx
        .task_service()
        .create(Task::new(active.id, "nested").with_subproject(sub.id))
        .await
        .unwrap();
    let own = h.task(&active, "own").await;

    let projects = h.ctx.project_service();
    projects.set_project_paused(paused.id, true).await.unwrap();
    projects.set_subproject_paused(sub.id, true).await.unwrap();
    h.ctx.settings.set(SettingKey::MaxParallelTasks, "5").await.unwrap();

    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.admitted, vec![own.id]);
    h.scheduler.wait_for_runs().await;

    projects.set_subproject_paused(sub.id, false).await.unwrap();
    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.admitted, vec![nested.id]);
    h.scheduler.wait_for_runs().await;
}

#[tokio::test]
async fn single_slot_serialises_runs() {
    let mut h = Harness::new(MockBehavior::complete_after("ok", Duration::from_millis(30))).await;
    let project = h.project("api").await;
    let mut tasks = Vec::new();
    for i in 0..3 {
        tasks.push(h.task(&project, &format!("task {i}")).await);
    }

    let mut order = Vec::new();
    for _ in 0..100 {
        order.extend(h.scheduler.tick().await.unwrap().admitted);
        if order.len() == tasks.len() && h.ctx.gate.in_flight() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.scheduler.wait_for_runs().await;

    assert_eq!(order, tasks.iter().map(|t| t.id).collect::<Vec<_>>());
    assert_eq!(h.runner.peak_running(), 1);
    for task in &tasks {
        assert_eq!(h.reload(task).await.status, TaskStatus::Done);
    }
}

#[tokio::test]
async fn stop_running_task_ends_stopped() {
    let mut h = Harness::new(MockBehavior::hang()).await;
    let project = h.project("api").await;
    let task = h.task(&project, "long job").await;

    h.scheduler.tick().await.unwrap();
    let runner = h.runner.clone();
    assert!(wait_until(|| runner.running() == 1, Duration::from_secs(2)).await);

    let service = h.ctx.task_service();
    let edit = TaskUpdate { text: Some("edited".to_string()), ..Default::default() };
    assert!(matches!(service.update(task.id, &edit).await, Err(DomainError::TaskLocked(_))));
    assert_eq!(service.apply_action(task.id, TaskAction::Stop).await.unwrap(), ActionOutcome::Requested);
    h.scheduler.wait_for_runs().await;

    let stopped = h.reload(&task).await;
    assert_eq!(stopped.status, TaskStatus::Stopped);
    assert!(stopped.pending_action.is_none());
    assert_eq!(h.runner.cancelled_runs(), 1);
    assert_eq!(h.ctx.gate.in_flight(), 0);

    assert_eq!(service.apply_action(task.id, TaskAction::Stop).await.unwrap(), ActionOutcome::NoOp);
}

#[tokio::test]
async fn remove_running_task_deletes_after_cancel() {
    let mut h = Harness::new(MockBehavior::hang()).await;
    let project = h.project("api").await;
    let task = h.task(&project, "doomed").await;
    let waiting = h.task(&project, "next").await;

    h.scheduler.tick().await.unwrap();
    let runner = h.runner.clone();
    assert!(wait_until(|| runner.running() == 1, Duration::from_secs(2)).await);

    let service = h.ctx.task_service();
    assert_eq!(service.apply_action(task.id, TaskAction::Remove).await.unwrap(), ActionOutcome::Requested);
    h.scheduler.wait_for_runs().await;

    assert!(matches!(service.get(task.id).await, Err(DomainError::TaskNotFound(_))));
    assert_eq!(h.ctx.gate.in_flight(), 0);
    assert!(h.ctx.registry.is_empty());

    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.admitted, vec![waiting.id]);
    h.scheduler.shutdown().await;
}

#[tokio::test]
async fn remove_queued_task_is_immediate() {
    let h = Harness::new(MockBehavior::default()).await;
    let project = h.project("api").await;
    let task = h.task(&project, "never mind").await;

    let service = h.ctx.task_service();
    assert_eq!(service.apply_action(task.id, TaskAction::Remove).await.unwrap(), ActionOutcome::Applied);
    assert_eq!(service.apply_action(task.id, TaskAction::Remove).await.unwrap(), ActionOutcome::NoOp);
}

#[tokio::test]
async fn denied_usage_blocks_admission_until_allowed() {
    let mut h = Harness::with_usage(MockBehavior::complete("ok"), FixedUsageSource::denying("weekly limit")).await;
    let project = h.project("api").await;
    let task = h.task(&project, "wait for quota").await;

    let report = h.scheduler.tick().await.unwrap();
    assert!(report.admitted.is_empty());
    assert!(report.usage_blocked);
    assert_eq!(h.reload(&task).await.status, TaskStatus::Queued);

    h.usage.set_report(UsageReport { five_hour_used_percent: Some(10.0), ..UsageReport::unchecked() }).await;
    h.ctx.usage.invalidate().await;

    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.admitted, vec![task.id]);
    h.scheduler.wait_for_runs().await;
}

#[tokio::test]
async fn configured_ceiling_blocks_admission() {
    let mut h = Harness::with_usage(
        MockBehavior::complete("ok"),
        FixedUsageSource::with_report(UsageReport { five_hour_used_percent: Some(85.0), ..UsageReport::unchecked() }),
    )
    .await;
    let project = h.project("api").await;
    h.task(&project, "heavy").await;

    h.ctx.settings.set(SettingKey::UsageMaxFiveHourPercent, "80").await.unwrap();
    assert!(h.scheduler.tick().await.unwrap().usage_blocked);

    h.ctx.settings.set(SettingKey::UsageCheckEnabled, "false").await.unwrap();
    assert_eq!(h.scheduler.tick().await.unwrap().admitted.len(), 1);
    h.scheduler.wait_for_runs().await;
}

#[tokio::test]
async fn history_is_replayed_oldest_first() {
    let mut h = Harness::new(MockBehavior::complete("unused")).await;
    let project = h.project("api").await;
    let service = h.ctx.task_service();

    for (text, output) in [("step one", "first answer"), ("step two", "second answer"), ("step three", "third answer")] {
        let task = service.create(Task::new(project.id, text)).await.unwrap();
        h.runner.set_behavior_for_task(task.id, MockBehavior::complete(output)).await;
        h.scheduler.tick().await.unwrap();
        h.scheduler.wait_for_runs().await;
    }

    let follow_up = service.create(Task::new(project.id, "summarise").with_previous_context(2)).await.unwrap();
    h.scheduler.tick().await.unwrap();
    h.scheduler.wait_for_runs().await;

    let prompt = h.runner.invocation_for(follow_up.id).await.unwrap().prompt;
    assert!(!prompt.contains("first answer"), "only the two most recent responses are included");
    let second = prompt.find("second answer").expect("second response present");
    let third = prompt.find("third answer").expect("third response present");
    assert!(second < third, "history must be oldest first");
    assert!(prompt.trim_end().ends_with("summarise"));
}

#[tokio::test]
async fn timeout_fails_the_task() {
    let mut h = Harness::new(MockBehavior::hang()).await;
    let project = h.project("api").await;
    let task = h.task(&project, "slow").await;
    h.ctx.settings.set(SettingKey::TaskTimeoutSecs, "1").await.unwrap();

    h.scheduler.tick().await.unwrap();
    h.scheduler.wait_for_runs().await;

    let failed = h.reload(&task).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.last_error.as_deref(), Some("timed out after 1s"));
}

#[tokio::test]
async fn resubmit_requeues_at_end_of_scope() {
    let mut h = Harness::new(MockBehavior::fail("boom")).await;
    let project = h.project("api").await;
    let task = h.task(&project, "flaky").await;

    h.scheduler.tick().await.unwrap();
    h.scheduler.wait_for_runs().await;
    assert_eq!(h.reload(&task).await.status, TaskStatus::Failed);

    let later = h.task(&project, "later").await;
    let service = h.ctx.task_service();
    let requeued = service.resubmit(task.id).await.unwrap();
    assert_eq!(requeued.status, TaskStatus::Queued);
    assert!(requeued.last_error.is_none());
    assert!(requeued.priority > h.reload(&later).await.priority);
}

#[tokio::test]
async fn run_loop_wakes_on_new_task_and_shuts_down() {
    let h = Harness::new(MockBehavior::hang()).await;
    let project = h.project("api").await;
    let ctx = h.ctx.clone();
    let runner = h.runner.clone();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(h.scheduler.run(shutdown.clone()));

    let task = ctx.task_service().create(Task::new(project.id, "picked up by signal")).await.unwrap();
    assert!(wait_until(|| runner.running() == 1, Duration::from_secs(3)).await);

    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let row = ctx.task_service().get(task.id).await.unwrap();
    assert_eq!(row.status, TaskStatus::Failed);
    assert_eq!(row.last_error.as_deref(), Some("interrupted by scheduler shutdown"));
    assert_eq!(ctx.gate.in_flight(), 0);
}
