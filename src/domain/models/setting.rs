//! Runtime settings with three-tier resolution.
//!
//! Every setting resolves as: explicit override (stored) → environment
//! variable → compiled-in default. The first tier that is present wins.

use serde::{Deserialize, Serialize};

/// Settings the scheduler reads while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    MaxParallelTasks,
    CliCommandTemplate,
    PromptTemplate,
    PromptTemplateWithHistory,
    UsageCheckEnabled,
    UsageAuthFile,
    UsageProxy,
    UsageMaxFiveHourPercent,
    UsageMaxWeeklyPercent,
    TaskTimeoutSecs,
    DefaultModel,
    DefaultReasoning,
}

pub const DEFAULT_CLI_COMMAND_TEMPLATE: &str =
    "codex exec --skip-git-repo-check --model {model} -c model_reasoning_effort={reasoning} {prompt}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "{task}";

pub const DEFAULT_PROMPT_TEMPLATE_WITH_HISTORY: &str = "\
Below is the recent conversation history for this project, oldest first.

{history}

Current task:
{task}";

impl SettingKey {
    pub const ALL: [SettingKey; 12] = [
        Self::MaxParallelTasks,
        Self::CliCommandTemplate,
        Self::PromptTemplate,
        Self::PromptTemplateWithHistory,
        Self::UsageCheckEnabled,
        Self::UsageAuthFile,
        Self::UsageProxy,
        Self::UsageMaxFiveHourPercent,
        Self::UsageMaxWeeklyPercent,
        Self::TaskTimeoutSecs,
        Self::DefaultModel,
        Self::DefaultReasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxParallelTasks => "max_parallel_tasks",
            Self::CliCommandTemplate => "cli_command_template",
            Self::PromptTemplate => "prompt_template",
            Self::PromptTemplateWithHistory => "prompt_template_with_history",
            Self::UsageCheckEnabled => "usage_check_enabled",
            Self::UsageAuthFile => "usage_auth_file",
            Self::UsageProxy => "usage_proxy",
            Self::UsageMaxFiveHourPercent => "usage_max_five_hour_percent",
            Self::UsageMaxWeeklyPercent => "usage_max_weekly_percent",
            Self::TaskTimeoutSecs => "task_timeout_secs",
            Self::DefaultModel => "default_model",
            Self::DefaultReasoning => "default_reasoning",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Environment variable supplying the middle tier.
    pub fn env_var(&self) -> String {
        format!("FOREMAN_{}", self.as_str().to_uppercase())
    }

    /// Compiled-in default, if any.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            Self::MaxParallelTasks => Some("1"),
            Self::CliCommandTemplate => Some(DEFAULT_CLI_COMMAND_TEMPLATE),
            Self::PromptTemplate => Some(DEFAULT_PROMPT_TEMPLATE),
            Self::PromptTemplateWithHistory => Some(DEFAULT_PROMPT_TEMPLATE_WITH_HISTORY),
            Self::UsageCheckEnabled => Some("true"),
            Self::UsageAuthFile => Some("~/.codex/auth.json"),
            Self::UsageProxy => None,
            Self::UsageMaxFiveHourPercent | Self::UsageMaxWeeklyPercent => Some("100"),
            Self::TaskTimeoutSecs => Some("0"),
            Self::DefaultModel => Some("gpt-5-codex"),
            Self::DefaultReasoning => Some("medium"),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MaxParallelTasks => "Maximum number of tasks running at once",
            Self::CliCommandTemplate => "Agent command line; placeholders {prompt}, {model}, {reasoning}",
            Self::PromptTemplate => "Prompt template without history; placeholder {task}",
            Self::PromptTemplateWithHistory => "Prompt template with history; placeholders {history}, {task}",
            Self::UsageCheckEnabled => "Query the backend usage endpoint before admitting tasks",
            Self::UsageAuthFile => "Credential file used for the usage check",
            Self::UsageProxy => "Optional proxy URL for the usage check",
            Self::UsageMaxFiveHourPercent => "Refuse admission at or above this five-hour usage percent",
            Self::UsageMaxWeeklyPercent => "Refuse admission at or above this weekly usage percent",
            Self::TaskTimeoutSecs => "Fail a running task after this many seconds; 0 disables",
            Self::DefaultModel => "Model used when a task does not name one",
            Self::DefaultReasoning => "Reasoning effort used when a task does not name one",
        }
    }

    /// Whether a change to this key invalidates the cached usage result.
    pub fn affects_usage(&self) -> bool {
        matches!(
            self,
            Self::UsageCheckEnabled
                | Self::UsageAuthFile
                | Self::UsageProxy
                | Self::UsageMaxFiveHourPercent
                | Self::UsageMaxWeeklyPercent
        )
    }

    /// Reject values the scheduler could not use.
    pub fn validate_value(&self, value: &str) -> Result<(), String> {
        match self {
            Self::MaxParallelTasks => match value.trim().parse::<u32>() {
                Ok(n) if n >= 1 => Ok(()),
                _ => Err(format!("{} must be a positive integer", self.as_str())),
            },
            Self::TaskTimeoutSecs => value
                .trim()
                .parse::<u64>()
                .map(|_| ())
                .map_err(|_| format!("{} must be a non-negative integer", self.as_str())),
            Self::UsageMaxFiveHourPercent | Self::UsageMaxWeeklyPercent => match value.trim().parse::<f64>() {
                Ok(p) if (0.0..=100.0).contains(&p) => Ok(()),
                _ => Err(format!("{} must be between 0 and 100", self.as_str())),
            },
            Self::UsageCheckEnabled => parse_bool(value)
                .map(|_| ())
                .ok_or_else(|| format!("{} must be true or false", self.as_str())),
            Self::CliCommandTemplate => {
                if value.contains("{prompt}") {
                    Ok(())
                } else {
                    Err("cli_command_template must contain {prompt}".to_string())
                }
            }
            Self::PromptTemplate | Self::PromptTemplateWithHistory => {
                if value.contains("{task}") {
                    Ok(())
                } else {
                    Err(format!("{} must contain {{task}}", self.as_str()))
                }
            }
            Self::UsageAuthFile | Self::UsageProxy | Self::DefaultModel | Self::DefaultReasoning => Ok(()),
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the boolean spellings accepted in settings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Which tier supplied a setting's effective value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingSource {
    Override,
    Environment,
    Default,
    Unset,
}

/// A fully resolved setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: SettingKey,
    pub override_value: Option<String>,
    pub env_value: Option<String>,
    pub default_value: Option<String>,
    pub effective_value: Option<String>,
    pub source: SettingSource,
}

impl Setting {
    /// Resolve a key from its stored override and environment value.
    ///
    /// Empty strings count as absent so that clearing an env var by setting it
    /// to "" falls through to the default.
    pub fn resolve(key: SettingKey, override_value: Option<String>, env_value: Option<String>) -> Self {
        let override_value = override_value.filter(|v| !v.is_empty());
        let env_value = env_value.filter(|v| !v.is_empty());
        let default_value = key.default_value().map(str::to_string);

        let (effective_value, source) = if let Some(v) = &override_value {
            (Some(v.clone()), SettingSource::Override)
        } else if let Some(v) = &env_value {
            (Some(v.clone()), SettingSource::Environment)
        } else if let Some(v) = &default_value {
            (Some(v.clone()), SettingSource::Default)
        } else {
            (None, SettingSource::Unset)
        };

        Self { key, override_value, env_value, default_value, effective_value, source }
    }
}
