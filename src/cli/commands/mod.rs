//! Command handlers. Each module owns its clap arguments and an `execute`
//! entry point called from `main`.

pub mod daemon;
pub mod project;
pub mod settings;
pub mod subproject;
pub mod task;
pub mod tree;
pub mod usage;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig};
use crate::domain::models::Config;
use crate::services::SchedulerContext;

/// Everything a command needs: the pool for ID prefix lookups and the wired
/// services.
pub struct CommandContext {
    pub pool: SqlitePool,
    pub scheduler: Arc<SchedulerContext>,
}

impl CommandContext {
    /// Open (and migrate) the configured database and wire the services.
    pub async fn open(config: &Config) -> Result<Self> {
        let url = database_url(&config.database.path);
        let pool_config = PoolConfig { max_connections: config.database.max_connections, ..Default::default() };
        let pool = initialize_database(&url, Some(pool_config))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let scheduler = Arc::new(SchedulerContext::new(pool.clone(), config));
        Ok(Self { pool, scheduler })
    }
}

/// Parse a `--metadata` argument as a JSON value.
pub(crate) fn parse_metadata(raw: Option<&str>) -> Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(s).with_context(|| format!("Invalid JSON metadata: {s}")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(parse_metadata(None).unwrap(), None);
        assert_eq!(parse_metadata(Some(r#"{"a":1}"#)).unwrap(), Some(serde_json::json!({"a": 1})));
        assert!(parse_metadata(Some("{oops")).is_err());
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("nested/foreman.db").to_string_lossy().into_owned();

        let ctx = CommandContext::open(&config).await.unwrap();
        let tree = ctx.scheduler.load_tree().await.unwrap();
        assert!(tree.projects.is_empty());
        assert!(dir.path().join("nested/foreman.db").exists());
    }
}
