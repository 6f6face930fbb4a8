//! Project and subproject domain models.
//!
//! Projects own a working directory and an ordering domain for their own
//! tasks. Subprojects hang off a project with their own directory and their
//! own task ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level scheduling scope bound to a directory on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub metadata: Option<serde_json::Value>,
    pub paused: bool,
    /// Lower runs first
    pub priority: i64,
    pub show_on_main: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            path: path.into(),
            metadata: None,
            paused: false,
            priority: 0,
            show_on_main: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Project name cannot be empty".to_string());
        }
        if self.path.trim().is_empty() {
            return Err("Project path cannot be empty".to_string());
        }
        Ok(())
    }
}

/// A child scope of a project with its own directory and task ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subproject {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub path: String,
    pub metadata: Option<serde_json::Value>,
    pub paused: bool,
    /// Ordered among siblings of the same project
    pub priority: i64,
    pub show_on_main: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subproject {
    pub fn new(project_id: Uuid, name: impl Into<String>, path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            path: path.into(),
            metadata: None,
            paused: false,
            priority: 0,
            show_on_main: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Subproject name cannot be empty".to_string());
        }
        if self.path.trim().is_empty() {
            return Err("Subproject path cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Partial update shared by projects and subprojects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeUpdate {
    pub name: Option<String>,
    pub path: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub show_on_main: Option<bool>,
}

impl ScopeUpdate {
    pub fn apply_to_project(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name.clone_from(name);
        }
        if let Some(path) = &self.path {
            project.path.clone_from(path);
        }
        if let Some(metadata) = &self.metadata {
            project.metadata = Some(metadata.clone());
        }
        if let Some(show) = self.show_on_main {
            project.show_on_main = show;
        }
        project.updated_at = Utc::now();
    }

    pub fn apply_to_subproject(&self, subproject: &mut Subproject) {
        if let Some(name) = &self.name {
            subproject.name.clone_from(name);
        }
        if let Some(path) = &self.path {
            subproject.path.clone_from(path);
        }
        if let Some(metadata) = &self.metadata {
            subproject.metadata = Some(metadata.clone());
        }
        if let Some(show) = self.show_on_main {
            subproject.show_on_main = show;
        }
        subproject.updated_at = Utc::now();
    }
}
