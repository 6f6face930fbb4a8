//! Project and subproject management.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PendingAction, Project, ScopeUpdate, Subproject, TaskScope, TaskStatus};
use crate::domain::ports::{ProjectRepository, TaskFilter, TaskRepository};

use super::change_notifier::{ChangeKind, ChangeNotifier};
use super::process_registry::{CancelReason, ProcessRegistry};

pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    tasks: Arc<dyn TaskRepository>,
    registry: Arc<ProcessRegistry>,
    notifier: ChangeNotifier,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        tasks: Arc<dyn TaskRepository>,
        registry: Arc<ProcessRegistry>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self { projects, tasks, registry, notifier }
    }

    #[tracing::instrument(skip(self, project), fields(name = %project.name))]
    pub async fn create_project(&self, project: Project) -> DomainResult<Project> {
        project.validate().map_err(DomainError::ValidationFailed)?;
        let project = self.projects.insert_project(&project).await?;
        tracing::info!(project_id = %project.id, "project created");
        self.notifier.notify(ChangeKind::ScopeCreated);
        Ok(project)
    }

    pub async fn get_project(&self, id: Uuid) -> DomainResult<Project> {
        self.projects.get_project(id).await?.ok_or(DomainError::ProjectNotFound(id))
    }

    pub async fn list_projects(&self) -> DomainResult<Vec<Project>> {
        self.projects.list_projects().await
    }

    pub async fn update_project(&self, id: Uuid, update: &ScopeUpdate) -> DomainResult<Project> {
        let mut project = self.get_project(id).await?;
        update.apply_to_project(&mut project);
        project.validate().map_err(DomainError::ValidationFailed)?;
        self.projects.update_project(&project).await?;
        self.notifier.notify(ChangeKind::ScopeUpdated);
        Ok(project)
    }

    /// Delete a project with everything under it, cancelling its live runs.
    #[tracing::instrument(skip(self), fields(project_id = %id))]
    pub async fn delete_project(&self, id: Uuid) -> DomainResult<()> {
        self.get_project(id).await?;
        let filter = TaskFilter { project_id: Some(id), status: Some(TaskStatus::InProgress), ..Default::default() };
        self.cancel_running(&filter).await?;

        if !self.projects.delete_project(id).await? {
            return Err(DomainError::ProjectNotFound(id));
        }
        tracing::info!("project deleted");
        self.notifier.notify(ChangeKind::ScopeRemoved);
        Ok(())
    }

    pub async fn set_project_paused(&self, id: Uuid, paused: bool) -> DomainResult<Project> {
        if !self.projects.set_project_paused(id, paused).await? {
            return Err(DomainError::ProjectNotFound(id));
        }
        self.notifier.notify(if paused { ChangeKind::ScopePaused } else { ChangeKind::ScopeResumed });
        self.get_project(id).await
    }

    /// Renumber projects; `ordered_ids` must name every project.
    pub async fn reorder_projects(&self, ordered_ids: &[Uuid]) -> DomainResult<()> {
        self.projects.reorder_projects(ordered_ids).await?;
        self.notifier.notify(ChangeKind::ScopesReordered);
        Ok(())
    }

    #[tracing::instrument(skip(self, subproject), fields(project_id = %subproject.project_id, name = %subproject.name))]
    pub async fn create_subproject(&self, subproject: Subproject) -> DomainResult<Subproject> {
        subproject.validate().map_err(DomainError::ValidationFailed)?;
        let subproject = self.projects.insert_subproject(&subproject).await?;
        tracing::info!(subproject_id = %subproject.id, "subproject created");
        self.notifier.notify(ChangeKind::ScopeCreated);
        Ok(subproject)
    }

    pub async fn get_subproject(&self, id: Uuid) -> DomainResult<Subproject> {
        self.projects.get_subproject(id).await?.ok_or(DomainError::SubprojectNotFound(id))
    }

    pub async fn list_subprojects(&self, project_id: Option<Uuid>) -> DomainResult<Vec<Subproject>> {
        self.projects.list_subprojects(project_id).await
    }

    pub async fn update_subproject(&self, id: Uuid, update: &ScopeUpdate) -> DomainResult<Subproject> {
        let mut subproject = self.get_subproject(id).await?;
        update.apply_to_subproject(&mut subproject);
        subproject.validate().map_err(DomainError::ValidationFailed)?;
        self.projects.update_subproject(&subproject).await?;
        self.notifier.notify(ChangeKind::ScopeUpdated);
        Ok(subproject)
    }

    #[tracing::instrument(skip(self), fields(subproject_id = %id))]
    pub async fn delete_subproject(&self, id: Uuid) -> DomainResult<()> {
        let subproject = self.get_subproject(id).await?;
        let filter = TaskFilter {
            scope: Some(TaskScope::Subproject {
                project_id: subproject.project_id,
                subproject_id: id,
            }),
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        };
        self.cancel_running(&filter).await?;

        if !self.projects.delete_subproject(id).await? {
            return Err(DomainError::SubprojectNotFound(id));
        }
        tracing::info!("subproject deleted");
        self.notifier.notify(ChangeKind::ScopeRemoved);
        Ok(())
    }

    pub async fn set_subproject_paused(&self, id: Uuid, paused: bool) -> DomainResult<Subproject> {
        if !self.projects.set_subproject_paused(id, paused).await? {
            return Err(DomainError::SubprojectNotFound(id));
        }
        self.notifier.notify(if paused { ChangeKind::ScopePaused } else { ChangeKind::ScopeResumed });
        self.get_subproject(id).await
    }

    pub async fn reorder_subprojects(&self, project_id: Uuid, ordered_ids: &[Uuid]) -> DomainResult<()> {
        self.get_project(project_id).await?;
        self.projects.reorder_subprojects(project_id, ordered_ids).await?;
        self.notifier.notify(ChangeKind::ScopesReordered);
        Ok(())
    }

    /// Record a remove request on every running task matched by `filter` and
    /// cancel the ones this process owns.
    async fn cancel_running(&self, filter: &TaskFilter) -> DomainResult<()> {
        for task in self.tasks.list(filter).await? {
            self.tasks.request_action(task.id, PendingAction::Remove).await?;
            if self.registry.cancel(task.id, CancelReason::Remove) {
                tracing::debug!(task_id = %task.id, "cancelled run of deleted scope");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProjectRepository, SqliteTaskRepository};
    use crate::domain::models::Task;

    async fn setup() -> (ProjectService, Arc<SqliteTaskRepository>, Arc<ProcessRegistry>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let registry = Arc::new(ProcessRegistry::new());
        let service = ProjectService::new(
            Arc::new(SqliteProjectRepository::new(pool)),
            tasks.clone(),
            registry.clone(),
            ChangeNotifier::new(16),
        );
        (service, tasks, registry)
    }

    #[tokio::test]
    async fn test_create_and_reorder_projects() {
        let (service, _, _) = setup().await;
        let a = service.create_project(Project::new("a", "/a")).await.unwrap();
        let b = service.create_project(Project::new("b", "/b")).await.unwrap();
        assert_eq!((a.priority, b.priority), (0, 1));

        service.reorder_projects(&[b.id, a.id]).await.unwrap();
        let names: Vec<_> = service.list_projects().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[tokio::test]
    async fn test_validation_and_not_found() {
        let (service, _, _) = setup().await;
        assert!(matches!(
            service.create_project(Project::new(" ", "/a")).await,
            Err(DomainError::ValidationFailed(_))
        ));
        assert!(matches!(
            service.set_project_paused(Uuid::new_v4(), true).await,
            Err(DomainError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_pause() {
        let (service, _, _) = setup().await;
        let p = service.create_project(Project::new("a", "/a")).await.unwrap();
        let update = ScopeUpdate { name: Some("renamed".into()), show_on_main: Some(false), ..Default::default() };
        let updated = service.update_project(p.id, &update).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert!(!updated.show_on_main);

        assert!(service.set_project_paused(p.id, true).await.unwrap().paused);
        assert!(!service.set_project_paused(p.id, false).await.unwrap().paused);
    }

    #[tokio::test]
    async fn test_delete_cancels_live_runs() {
        let (service, tasks, registry) = setup().await;
        let p = service.create_project(Project::new("a", "/a")).await.unwrap();
        let sub = service.create_subproject(Subproject::new(p.id, "s", "/a/s")).await.unwrap();
        let task = tasks.insert(&Task::new(p.id, "run").with_model("m").with_subproject(sub.id)).await.unwrap();
        assert!(tasks.try_admit(task.id).await.unwrap());
        let token = registry.register(task.id).unwrap();

        service.delete_project(p.id).await.unwrap();
        assert!(token.is_cancelled());
        assert_eq!(registry.cancel_reason(task.id), Some(CancelReason::Remove));
        assert!(tasks.get(task.id).await.unwrap().is_none());
        assert!(service.list_subprojects(Some(p.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subproject_lifecycle() {
        let (service, _, _) = setup().await;
        let p = service.create_project(Project::new("a", "/a")).await.unwrap();
        let s1 = service.create_subproject(Subproject::new(p.id, "one", "/a/1")).await.unwrap();
        let s2 = service.create_subproject(Subproject::new(p.id, "two", "/a/2")).await.unwrap();

        service.reorder_subprojects(p.id, &[s2.id, s1.id]).await.unwrap();
        let order: Vec<_> = service.list_subprojects(Some(p.id)).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(order, vec![s2.id, s1.id]);

        assert!(service.set_subproject_paused(s1.id, true).await.unwrap().paused);
        service.delete_subproject(s1.id).await.unwrap();
        assert!(matches!(service.get_subproject(s1.id).await, Err(DomainError::SubprojectNotFound(_))));
    }
}
