use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the Foreman daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scheduler loop configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Usage endpoint configuration
    #[serde(default)]
    pub usage: UsageConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".foreman/foreman.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for stdout
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Enable stdout logging
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
            enable_stdout: true,
        }
    }
}

/// Scheduler loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Interval between ticks when no recheck signal arrives
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Time between SIGTERM and a forced kill when stopping a task
    #[serde(default = "default_stop_grace_period_ms")]
    pub stop_grace_period_ms: u64,

    /// Mark `in_progress` rows left by a previous daemon as failed on startup
    #[serde(default = "default_true")]
    pub recover_orphaned_tasks: bool,

    /// Buffer size of the change notification channel
    #[serde(default = "default_notifier_capacity")]
    pub notifier_capacity: usize,
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

const fn default_stop_grace_period_ms() -> u64 {
    5_000
}

const fn default_notifier_capacity() -> usize {
    256
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stop_grace_period_ms: default_stop_grace_period_ms(),
            recover_orphaned_tasks: true,
            notifier_capacity: default_notifier_capacity(),
        }
    }
}

/// Usage endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UsageConfig {
    /// Base URL of the backend serving `/backend-api/wham/usage`
    #[serde(default = "default_usage_base_url")]
    pub base_url: String,

    /// How long a usage result is reused before querying again
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Forced refreshes allowed per minute
    #[serde(default = "default_forced_refresh_per_minute")]
    pub forced_refresh_per_minute: u32,
}

fn default_usage_base_url() -> String {
    "https://chatgpt.com".to_string()
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    15
}

const fn default_forced_refresh_per_minute() -> u32 {
    6
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            base_url: default_usage_base_url(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            forced_refresh_per_minute: default_forced_refresh_per_minute(),
        }
    }
}
