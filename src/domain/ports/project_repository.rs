use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Project, Subproject};

/// Repository port for projects and subprojects.
///
/// Inserts place the new scope after its existing siblings. Deletes cascade
/// to child subprojects, tasks and responses.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert a project at the end of the global ordering; returns it with its priority.
    async fn insert_project(&self, project: &Project) -> DomainResult<Project>;

    async fn get_project(&self, id: Uuid) -> DomainResult<Option<Project>>;

    /// All projects, ascending priority.
    async fn list_projects(&self) -> DomainResult<Vec<Project>>;

    /// Persist name, path, metadata and display flags.
    async fn update_project(&self, project: &Project) -> DomainResult<()>;

    /// Returns false when the project did not exist.
    async fn delete_project(&self, id: Uuid) -> DomainResult<bool>;

    async fn set_project_paused(&self, id: Uuid, paused: bool) -> DomainResult<bool>;

    /// Renumber all projects to match `ordered_ids`, which must name every project.
    async fn reorder_projects(&self, ordered_ids: &[Uuid]) -> DomainResult<()>;

    async fn insert_subproject(&self, subproject: &Subproject) -> DomainResult<Subproject>;

    async fn get_subproject(&self, id: Uuid) -> DomainResult<Option<Subproject>>;

    /// Subprojects ordered by project then priority; restricted to one project when given.
    async fn list_subprojects(&self, project_id: Option<Uuid>) -> DomainResult<Vec<Subproject>>;

    async fn update_subproject(&self, subproject: &Subproject) -> DomainResult<()>;

    async fn delete_subproject(&self, id: Uuid) -> DomainResult<bool>;

    async fn set_subproject_paused(&self, id: Uuid, paused: bool) -> DomainResult<bool>;

    /// Renumber one project's subprojects to match `ordered_ids`.
    async fn reorder_subprojects(&self, project_id: Uuid, ordered_ids: &[Uuid]) -> DomainResult<()>;
}
