//! SQLite storage for setting overrides.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::adapters::sqlite::format_datetime;
use crate::domain::errors::DomainResult;
use crate::domain::ports::SettingsRepository;

#[derive(Clone)]
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn get_override(&self, key: &str) -> DomainResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn list_overrides(&self) -> DomainResult<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn set_override(&self, key: &str, value: &str) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_override(&self, key: &str) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
