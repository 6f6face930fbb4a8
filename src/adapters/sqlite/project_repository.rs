//! SQLite implementation of the ProjectRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{
    format_datetime, parse_datetime, parse_optional_json, parse_uuid, validate_full_ordering,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Project, Subproject};
use crate::domain::ports::ProjectRepository;

#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn insert_project(&self, project: &Project) -> DomainResult<Project> {
        let metadata = project.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let (priority,): (i64,) = sqlx::query_as(
            r#"INSERT INTO projects (id, name, path, metadata, paused, priority, show_on_main, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, (SELECT COALESCE(MAX(priority), -1) + 1 FROM projects), ?, ?, ?)
               RETURNING priority"#,
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(&project.path)
        .bind(&metadata)
        .bind(project.paused)
        .bind(project.show_on_main)
        .bind(format_datetime(&project.created_at))
        .bind(format_datetime(&project.updated_at))
        .fetch_one(&self.pool)
        .await?;

        Ok(Project { priority, ..project.clone() })
    }

    async fn get_project(&self, id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_projects(&self) -> DomainResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as("SELECT * FROM projects ORDER BY priority, created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_project(&self, project: &Project) -> DomainResult<()> {
        let metadata = project.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            "UPDATE projects SET name = ?, path = ?, metadata = ?, show_on_main = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&project.name)
        .bind(&project.path)
        .bind(&metadata)
        .bind(project.show_on_main)
        .bind(format_datetime(&Utc::now()))
        .bind(project.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProjectNotFound(project.id));
        }
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_project_paused(&self, id: Uuid, paused: bool) -> DomainResult<bool> {
        let result = sqlx::query("UPDATE projects SET paused = ?, updated_at = ? WHERE id = ?")
            .bind(paused)
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reorder_projects(&self, ordered_ids: &[Uuid]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Vec<(String,)> = sqlx::query_as("SELECT id FROM projects").fetch_all(&mut *tx).await?;
        let current: Vec<String> = current.into_iter().map(|(id,)| id).collect();
        validate_full_ordering(&current, ordered_ids)?;

        // Park everything on negative priorities first so the unique index holds mid-update.
        sqlx::query("UPDATE projects SET priority = -1 - priority").execute(&mut *tx).await?;

        let now = format_datetime(&Utc::now());
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE projects SET priority = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(&now)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_subproject(&self, subproject: &Subproject) -> DomainResult<Subproject> {
        let metadata = subproject.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM projects WHERE id = ?")
            .bind(subproject.project_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DomainError::ProjectNotFound(subproject.project_id));
        }

        let (priority,): (i64,) = sqlx::query_as(
            r#"INSERT INTO subprojects (id, project_id, name, path, metadata, paused, priority, show_on_main, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?,
                   (SELECT COALESCE(MAX(priority), -1) + 1 FROM subprojects WHERE project_id = ?), ?, ?, ?)
               RETURNING priority"#,
        )
        .bind(subproject.id.to_string())
        .bind(subproject.project_id.to_string())
        .bind(&subproject.name)
        .bind(&subproject.path)
        .bind(&metadata)
        .bind(subproject.paused)
        .bind(subproject.project_id.to_string())
        .bind(subproject.show_on_main)
        .bind(format_datetime(&subproject.created_at))
        .bind(format_datetime(&subproject.updated_at))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Subproject { priority, ..subproject.clone() })
    }

    async fn get_subproject(&self, id: Uuid) -> DomainResult<Option<Subproject>> {
        let row: Option<SubprojectRow> = sqlx::query_as("SELECT * FROM subprojects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_subprojects(&self, project_id: Option<Uuid>) -> DomainResult<Vec<Subproject>> {
        let rows: Vec<SubprojectRow> = match project_id {
            Some(project_id) => {
                sqlx::query_as("SELECT * FROM subprojects WHERE project_id = ? ORDER BY priority, created_at")
                    .bind(project_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM subprojects ORDER BY project_id, priority, created_at")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_subproject(&self, subproject: &Subproject) -> DomainResult<()> {
        let metadata = subproject.metadata.as_ref().map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            "UPDATE subprojects SET name = ?, path = ?, metadata = ?, show_on_main = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&subproject.name)
        .bind(&subproject.path)
        .bind(&metadata)
        .bind(subproject.show_on_main)
        .bind(format_datetime(&Utc::now()))
        .bind(subproject.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SubprojectNotFound(subproject.id));
        }
        Ok(())
    }

    async fn delete_subproject(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM subprojects WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_subproject_paused(&self, id: Uuid, paused: bool) -> DomainResult<bool> {
        let result = sqlx::query("UPDATE subprojects SET paused = ?, updated_at = ? WHERE id = ?")
            .bind(paused)
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reorder_subprojects(&self, project_id: Uuid, ordered_ids: &[Uuid]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Vec<(String,)> = sqlx::query_as("SELECT id FROM subprojects WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(&mut *tx)
            .await?;
        let current: Vec<String> = current.into_iter().map(|(id,)| id).collect();
        validate_full_ordering(&current, ordered_ids)?;

        sqlx::query("UPDATE subprojects SET priority = -1 - priority WHERE project_id = ?")
            .bind(project_id.to_string())
            .execute(&mut *tx)
            .await?;

        let now = format_datetime(&Utc::now());
        for (index, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE subprojects SET priority = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(&now)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    path: String,
    metadata: Option<String>,
    paused: bool,
    priority: i64,
    show_on_main: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DomainError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: parse_uuid(&row.id)?,
            name: row.name,
            path: row.path,
            metadata: parse_optional_json(row.metadata)?,
            paused: row.paused,
            priority: row.priority,
            show_on_main: row.show_on_main,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubprojectRow {
    id: String,
    project_id: String,
    name: String,
    path: String,
    metadata: Option<String>,
    paused: bool,
    priority: i64,
    show_on_main: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SubprojectRow> for Subproject {
    type Error = DomainError;

    fn try_from(row: SubprojectRow) -> Result<Self, Self::Error> {
        Ok(Subproject {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            name: row.name,
            path: row.path,
            metadata: parse_optional_json(row.metadata)?,
            paused: row.paused,
            priority: row.priority,
            show_on_main: row.show_on_main,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
