//! Snapshot of the project tree read by the ready queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::{Project, Subproject};
use super::task::Task;

/// Projects with their subprojects and tasks, as read in one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTree {
    pub projects: Vec<ProjectNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    pub project: Project,
    /// Project-level tasks
    pub tasks: Vec<Task>,
    pub subprojects: Vec<SubprojectNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubprojectNode {
    pub subproject: Subproject,
    pub tasks: Vec<Task>,
}

impl ProjectTree {
    /// Assemble a tree from flat lists. Orphaned rows are dropped.
    pub fn assemble(projects: Vec<Project>, subprojects: Vec<Subproject>, tasks: Vec<Task>) -> Self {
        let mut nodes: Vec<ProjectNode> = projects
            .into_iter()
            .map(|project| ProjectNode { project, tasks: Vec::new(), subprojects: Vec::new() })
            .collect();

        for subproject in subprojects {
            if let Some(node) = nodes.iter_mut().find(|n| n.project.id == subproject.project_id) {
                node.subprojects.push(SubprojectNode { subproject, tasks: Vec::new() });
            }
        }

        for task in tasks {
            let Some(node) = nodes.iter_mut().find(|n| n.project.id == task.project_id) else {
                continue;
            };
            match task.subproject_id {
                None => node.tasks.push(task),
                Some(subproject_id) => {
                    if let Some(sub) = node.subprojects.iter_mut().find(|s| s.subproject.id == subproject_id) {
                        sub.tasks.push(task);
                    }
                }
            }
        }

        Self { projects: nodes }
    }

    pub fn project(&self, project_id: Uuid) -> Option<&ProjectNode> {
        self.projects.iter().find(|n| n.project.id == project_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.projects.iter().flat_map(|node| {
            node.tasks
                .iter()
                .chain(node.subprojects.iter().flat_map(|s| s.tasks.iter()))
        })
    }

    pub fn find_task(&self, task_id: Uuid) -> Option<&Task> {
        self.tasks().find(|t| t.id == task_id)
    }

    /// Working directory for a task: its subproject's path, else its project's.
    pub fn working_dir_for(&self, task: &Task) -> Option<&str> {
        let node = self.project(task.project_id)?;
        match task.subproject_id {
            None => Some(node.project.path.as_str()),
            Some(subproject_id) => node
                .subprojects
                .iter()
                .find(|s| s.subproject.id == subproject_id)
                .map(|s| s.subproject.path.as_str()),
        }
    }
}
