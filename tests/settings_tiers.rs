//! Override, environment and default tiers of setting resolution.

mod common;

use common::Harness;
use foreman::adapters::runners::MockBehavior;
use foreman::domain::models::{SettingKey, SettingSource};

#[test]
fn test_environment_beats_default() {
    temp_env::with_vars([("FOREMAN_MAX_PARALLEL_TASKS", Some("3"))], || {
        tokio_test::block_on(async {
            let h = Harness::new(MockBehavior::default()).await;
            let setting = h.ctx.settings.get(SettingKey::MaxParallelTasks).await.unwrap();

            assert_eq!(setting.source, SettingSource::Environment);
            assert_eq!(setting.effective_value.as_deref(), Some("3"));
            assert_eq!(h.ctx.settings.scheduler_settings().await.unwrap().max_parallel_tasks, 3);
        });
    });
}

#[test]
fn test_override_beats_environment_and_unset_falls_back() {
    temp_env::with_vars([("FOREMAN_MAX_PARALLEL_TASKS", Some("3"))], || {
        tokio_test::block_on(async {
            let h = Harness::new(MockBehavior::default()).await;
            let settings = &h.ctx.settings;

            let stored = settings.set(SettingKey::MaxParallelTasks, "6").await.unwrap();
            assert_eq!(stored.source, SettingSource::Override);
            assert_eq!(stored.env_value.as_deref(), Some("3"));
            assert_eq!(stored.effective_value.as_deref(), Some("6"));

            let cleared = settings.unset(SettingKey::MaxParallelTasks).await.unwrap();
            assert_eq!(cleared.source, SettingSource::Environment);
            assert_eq!(cleared.effective_value.as_deref(), Some("3"));
        });
    });
}

#[test]
fn test_empty_environment_value_is_ignored() {
    temp_env::with_vars([("FOREMAN_MAX_PARALLEL_TASKS", Some(""))], || {
        tokio_test::block_on(async {
            let h = Harness::new(MockBehavior::default()).await;
            let setting = h.ctx.settings.get(SettingKey::MaxParallelTasks).await.unwrap();

            assert_eq!(setting.source, SettingSource::Default);
            assert_eq!(setting.effective_value.as_deref(), Some("1"));
        });
    });
}

#[test]
fn test_invalid_environment_value_falls_back_in_snapshot() {
    temp_env::with_vars(
        [("FOREMAN_MAX_PARALLEL_TASKS", Some("many")), ("FOREMAN_TASK_TIMEOUT_SECS", Some("90"))],
        || {
            tokio_test::block_on(async {
                let h = Harness::new(MockBehavior::default()).await;
                let snapshot = h.ctx.settings.scheduler_settings().await.unwrap();

                assert_eq!(snapshot.max_parallel_tasks, 1);
                assert_eq!(snapshot.task_timeout, Some(std::time::Duration::from_secs(90)));
            });
        },
    );
}

#[test]
fn test_listing_reports_every_key_once() {
    temp_env::with_vars([("FOREMAN_DEFAULT_MODEL", Some("gpt-test"))], || {
        tokio_test::block_on(async {
            let h = Harness::new(MockBehavior::default()).await;
            let listed = h.ctx.settings.list().await.unwrap();

            assert_eq!(listed.len(), SettingKey::ALL.len());
            let model = listed.iter().find(|s| s.key == SettingKey::DefaultModel).unwrap();
            assert_eq!(model.source, SettingSource::Environment);
            assert_eq!(model.effective_value.as_deref(), Some("gpt-test"));
        });
    });
}
