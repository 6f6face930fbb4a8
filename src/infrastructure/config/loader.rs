use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid poll_interval_ms: {0}. Must be at least 10")]
    InvalidPollInterval(u64),

    #[error("Invalid notifier_capacity: {0}. Must be at least 1")]
    InvalidNotifierCapacity(usize),

    #[error("Invalid usage base_url: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Invalid request_timeout_secs: {0}. Must be at least 1")]
    InvalidRequestTimeout(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .foreman/config.yaml
    /// 3. .foreman/local.yaml (optional developer overrides)
    /// 4. Environment variables (FOREMAN_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Load configuration rooted at `dir` instead of the working directory.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join(".foreman/config.yaml")))
            .merge(Yaml::file(dir.join(".foreman/local.yaml")))
            .merge(Env::prefixed("FOREMAN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.scheduler.poll_interval_ms < 10 {
            return Err(ConfigError::InvalidPollInterval(config.scheduler.poll_interval_ms));
        }
        if config.scheduler.notifier_capacity == 0 {
            return Err(ConfigError::InvalidNotifierCapacity(config.scheduler.notifier_capacity));
        }

        let base_url = &config.usage.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.clone()));
        }
        if config.usage.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout(config.usage.request_timeout_secs));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{LogFormat, RotationPolicy};
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".foreman/foreman.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scheduler.poll_interval_ms, 2_000);
        assert!(config.scheduler.recover_orphaned_tasks);
        assert_eq!(config.usage.base_url, "https://chatgpt.com");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
  rotation: hourly
scheduler:
  poll_interval_ms: 500
  recover_orphaned_tasks: false
usage:
  cache_ttl_secs: 120
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.rotation, RotationPolicy::Hourly);
        assert_eq!(config.scheduler.poll_interval_ms, 500);
        assert!(!config.scheduler.recover_orphaned_tasks);
        assert_eq!(config.scheduler.stop_grace_period_ms, 5_000);
        assert_eq!(config.usage.cache_ttl_secs, 120);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn test_validate_scheduler_and_usage() {
        let mut config = Config::default();
        config.scheduler.poll_interval_ms = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidPollInterval(0))));

        let mut config = Config::default();
        config.usage.base_url = "chatgpt.com".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidBaseUrl(_))));

        let mut config = Config::default();
        config.usage.request_timeout_secs = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidRequestTimeout(0))));
    }

    #[test]
    fn test_hierarchical_merging_and_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".foreman")).unwrap();

        let mut base = std::fs::File::create(dir.path().join(".foreman/config.yaml")).unwrap();
        writeln!(base, "logging:\n  level: info\n  format: json\nscheduler:\n  poll_interval_ms: 750").unwrap();
        let mut local = std::fs::File::create(dir.path().join(".foreman/local.yaml")).unwrap();
        writeln!(local, "logging:\n  level: debug").unwrap();

        temp_env::with_vars(
            [("FOREMAN_SCHEDULER__POLL_INTERVAL_MS", Some("300")), ("FOREMAN_LOGGING__LEVEL", None)],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.logging.level, "debug", "local.yaml should win over config.yaml");
                assert_eq!(config.logging.format, LogFormat::Json, "base value should persist");
                assert_eq!(config.scheduler.poll_interval_ms, 300, "env should win over files");
            },
        );
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_var_unset("FOREMAN_SCHEDULER__POLL_INTERVAL_MS", || {
            let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
            assert_eq!(config.scheduler.poll_interval_ms, 2_000);
        });
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database:\n  max_connections: 0").unwrap();
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
