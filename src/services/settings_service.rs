//! Settings service: three-tier resolution and the per-tick scheduler snapshot.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::usage::chatgpt::expand_home;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{parse_bool, Setting, SettingKey};
use crate::domain::ports::{SettingsRepository, UsageRequest};

use super::change_notifier::{ChangeKind, ChangeNotifier};
use super::context_assembler::PromptTemplates;
use super::usage_gate::{UsageGate, UsagePolicy};

/// Typed view of every scheduler-relevant setting, read once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub max_parallel_tasks: usize,
    pub cli_command_template: String,
    pub prompts: PromptTemplates,
    pub usage: UsagePolicy,
    /// `None` when runs may take as long as they like
    pub task_timeout: Option<Duration>,
    pub default_model: String,
    pub default_reasoning: String,
}

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    usage: Arc<UsageGate>,
    notifier: ChangeNotifier,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, usage: Arc<UsageGate>, notifier: ChangeNotifier) -> Self {
        Self { repo, usage, notifier }
    }

    fn env_value(key: SettingKey) -> Option<String> {
        std::env::var(key.env_var()).ok()
    }

    pub fn parse_key(name: &str) -> DomainResult<SettingKey> {
        SettingKey::from_str(name).ok_or_else(|| DomainError::UnknownSetting(name.to_string()))
    }

    pub async fn get(&self, key: SettingKey) -> DomainResult<Setting> {
        let override_value = self.repo.get_override(key.as_str()).await?;
        Ok(Setting::resolve(key, override_value, Self::env_value(key)))
    }

    /// Every known key, resolved. Stored overrides for unknown keys are ignored.
    pub async fn list(&self) -> DomainResult<Vec<Setting>> {
        let overrides = self.repo.list_overrides().await?;
        Ok(SettingKey::ALL
            .iter()
            .map(|key| {
                let override_value =
                    overrides.iter().find(|(k, _)| k == key.as_str()).map(|(_, v)| v.clone());
                Setting::resolve(*key, override_value, Self::env_value(*key))
            })
            .collect())
    }

    #[tracing::instrument(skip(self, value), fields(key = %key))]
    pub async fn set(&self, key: SettingKey, value: &str) -> DomainResult<Setting> {
        key.validate_value(value).map_err(DomainError::ValidationFailed)?;
        self.repo.set_override(key.as_str(), value).await?;
        self.changed(key).await;
        tracing::info!("setting override stored");
        self.get(key).await
    }

    /// Clear an override; the key falls back to its environment or default value.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn unset(&self, key: SettingKey) -> DomainResult<Setting> {
        if self.repo.clear_override(key.as_str()).await? {
            self.changed(key).await;
            tracing::info!("setting override cleared");
        }
        self.get(key).await
    }

    async fn changed(&self, key: SettingKey) {
        if key.affects_usage() {
            self.usage.invalidate().await;
        }
        self.notifier.notify(ChangeKind::SettingsChanged);
    }

    /// Resolve all settings into their typed form. Invalid values fall back
    /// to the compiled-in default with a warning.
    pub async fn scheduler_settings(&self) -> DomainResult<SchedulerSettings> {
        let settings = self.list().await?;
        let value = |key: SettingKey| -> String {
            let setting = settings.iter().find(|s| s.key == key);
            let effective = setting.and_then(|s| s.effective_value.clone());
            match effective {
                Some(v) if key.validate_value(&v).is_ok() => v,
                Some(v) => {
                    tracing::warn!(key = %key, value = %v, "invalid setting value; using default");
                    key.default_value().unwrap_or_default().to_string()
                }
                None => key.default_value().unwrap_or_default().to_string(),
            }
        };

        let max_parallel_tasks = value(SettingKey::MaxParallelTasks).trim().parse().unwrap_or(1);
        let timeout_secs: u64 = value(SettingKey::TaskTimeoutSecs).trim().parse().unwrap_or(0);
        let percent = |key| value(key).trim().parse::<f64>().unwrap_or(100.0);
        let proxy = value(SettingKey::UsageProxy);

        Ok(SchedulerSettings {
            max_parallel_tasks,
            cli_command_template: value(SettingKey::CliCommandTemplate),
            prompts: PromptTemplates {
                plain: value(SettingKey::PromptTemplate),
                with_history: value(SettingKey::PromptTemplateWithHistory),
            },
            usage: UsagePolicy {
                enabled: parse_bool(&value(SettingKey::UsageCheckEnabled)).unwrap_or(true),
                request: UsageRequest {
                    auth_file: expand_home(&value(SettingKey::UsageAuthFile)),
                    proxy: (!proxy.trim().is_empty()).then_some(proxy),
                },
                max_five_hour_percent: percent(SettingKey::UsageMaxFiveHourPercent),
                max_weekly_percent: percent(SettingKey::UsageMaxWeeklyPercent),
            },
            task_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            default_model: value(SettingKey::DefaultModel),
            default_reasoning: value(SettingKey::DefaultReasoning),
        })
    }
}
