//! Ready-queue resolver.
//!
//! Pure functions over a [`ProjectTree`] snapshot. Projects are walked in
//! ascending priority; within a project the project-level tasks come first,
//! then each subproject in ascending priority. Paused projects and
//! subprojects are skipped along with everything under them.

use crate::domain::models::{ProjectTree, Task};

/// Admissible tasks of one scope, in run order. Sorting is stable, so equal
/// priority and timestamp fall back to load order.
fn scope_queue(tasks: &[Task]) -> Vec<&Task> {
    let mut queued: Vec<&Task> = tasks.iter().filter(|t| t.is_admissible()).collect();
    queued.sort_by_key(|t| (t.priority, t.created_at));
    queued
}

/// Every admissible task in the order the scheduler should try them.
pub fn eligible_tasks(tree: &ProjectTree) -> Vec<&Task> {
    let mut projects: Vec<_> = tree.projects.iter().filter(|n| !n.project.paused).collect();
    projects.sort_by_key(|n| (n.project.priority, n.project.created_at));

    let mut ordered = Vec::new();
    for node in projects {
        ordered.extend(scope_queue(&node.tasks));

        let mut subprojects: Vec<_> = node.subprojects.iter().filter(|s| !s.subproject.paused).collect();
        subprojects.sort_by_key(|s| (s.subproject.priority, s.subproject.created_at));
        for sub in subprojects {
            ordered.extend(scope_queue(&sub.tasks));
        }
    }
    ordered
}

/// The first admissible task, if any.
pub fn next_eligible_task(tree: &ProjectTree) -> Option<&Task> {
    eligible_tasks(tree).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Project, Subproject, TaskStatus};
    use chrono::{Duration, Utc};

    fn task(project: &Project, text: &str, priority: i64) -> Task {
        let mut t = Task::new(project.id, text).with_model("m");
        t.priority = priority;
        t
    }

    fn texts(tree: &ProjectTree) -> Vec<String> {
        eligible_tasks(tree).into_iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn test_empty_tree_has_no_candidate() {
        assert!(next_eligible_task(&ProjectTree::default()).is_none());
    }

    #[test]
    fn test_projects_by_priority_then_scopes() {
        let mut a = Project::new("a", "/a");
        a.priority = 1;
        let mut b = Project::new("b", "/b");
        b.priority = 0;
        let mut sub_late = Subproject::new(a.id, "late", "/a/late");
        sub_late.priority = 1;
        let sub_early = Subproject::new(a.id, "early", "/a/early");

        let tasks = vec![
            task(&a, "a-sub-late", 0).with_subproject(sub_late.id),
            task(&a, "a-root-2", 1),
            task(&a, "a-sub-early", 0).with_subproject(sub_early.id),
            task(&a, "a-root-1", 0),
            task(&b, "b-root", 5),
        ];
        let tree = ProjectTree::assemble(vec![a, b], vec![sub_late, sub_early], tasks);

        assert_eq!(texts(&tree), ["b-root", "a-root-1", "a-root-2", "a-sub-early", "a-sub-late"]);
        assert_eq!(next_eligible_task(&tree).unwrap().text, "b-root");
    }

    #[test]
    fn test_pause_at_every_level_excludes() {
        let paused_project = Project::new("p", "/p").paused();
        let live = Project::new("l", "/l");
        let paused_sub = Subproject::new(live.id, "s", "/l/s").paused();

        let tasks = vec![
            task(&paused_project, "in-paused-project", 0),
            task(&live, "in-paused-sub", 0).with_subproject(paused_sub.id),
            task(&live, "paused-task", 0).paused(),
            task(&live, "runnable", 1),
        ];
        let tree = ProjectTree::assemble(vec![paused_project, live], vec![paused_sub], tasks);

        assert_eq!(texts(&tree), ["runnable"]);
    }

    #[test]
    fn test_only_queued_tasks_are_candidates() {
        let project = Project::new("p", "/p");
        let mut running = task(&project, "running", 0);
        running.status = TaskStatus::InProgress;
        let mut done = task(&project, "done", 1);
        done.status = TaskStatus::Done;
        let tree = ProjectTree::assemble(vec![project.clone()], vec![], vec![running, done, task(&project, "next", 2)]);

        assert_eq!(texts(&tree), ["next"]);
    }

    #[test]
    fn test_ties_break_on_creation_then_load_order() {
        let project = Project::new("p", "/p");
        let now = Utc::now();
        let mut newer = task(&project, "newer", 0);
        newer.created_at = now;
        let mut older = task(&project, "older", 0);
        older.created_at = now - Duration::seconds(5);
        let mut first_loaded = task(&project, "first-loaded", 0);
        first_loaded.created_at = now;

        let tree = ProjectTree::assemble(vec![project], vec![], vec![newer, older, first_loaded]);
        assert_eq!(texts(&tree), ["older", "newer", "first-loaded"]);
    }
}
