//! Short ID prefix resolution for CLI commands.
//!
//! Accepts any unique prefix of a UUID instead of the full ID, the way git
//! accepts short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

const PROJECT_QUERY: &str = "SELECT id FROM projects WHERE id LIKE ? ORDER BY id";
const SUBPROJECT_QUERY: &str = "SELECT id FROM subprojects WHERE id LIKE ? ORDER BY id";
const TASK_QUERY: &str = "SELECT id FROM tasks WHERE id LIKE ? ORDER BY id";

/// Resolve a project ID prefix to a full UUID.
pub async fn resolve_project_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "project", PROJECT_QUERY).await
}

/// Resolve a subproject ID prefix to a full UUID.
pub async fn resolve_subproject_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "subproject", SUBPROJECT_QUERY).await
}

/// Resolve a task ID prefix to a full UUID.
pub async fn resolve_task_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    resolve_prefix(pool, prefix, "task", TASK_QUERY).await
}

/// Resolve every prefix in order, failing on the first miss.
pub async fn resolve_task_ids(pool: &SqlitePool, prefixes: &[String]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        ids.push(resolve_task_id(pool, prefix).await?);
    }
    Ok(ids)
}

pub async fn resolve_project_ids(pool: &SqlitePool, prefixes: &[String]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        ids.push(resolve_project_id(pool, prefix).await?);
    }
    Ok(ids)
}

pub async fn resolve_subproject_ids(pool: &SqlitePool, prefixes: &[String]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        ids.push(resolve_subproject_id(pool, prefix).await?);
    }
    Ok(ids)
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}

async fn resolve_prefix(pool: &SqlitePool, prefix: &str, entity: &str, query: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;
    let pattern = format!("{}%", prefix.to_lowercase());

    let rows: Vec<(String,)> = sqlx::query_as(query).bind(&pattern).fetch_all(pool).await?;

    match rows.as_slice() {
        [] => bail!("No {entity} found matching '{prefix}'"),
        [(id,)] => Ok(Uuid::parse_str(id)?),
        _ => {
            let mut msg = format!("Ambiguous prefix '{prefix}': matches {} {entity}s:", rows.len());
            for (id,) in &rows {
                msg.push_str("\n  ");
                msg.push_str(id);
            }
            bail!("{msg}")
        }
    }
}
