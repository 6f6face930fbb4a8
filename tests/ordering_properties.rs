//! Property tests for queue ordering: persisted reorders and ready-queue selection.

mod common;

use std::collections::HashSet;

use common::Harness;
use foreman::adapters::runners::MockBehavior;
use foreman::domain::errors::DomainError;
use foreman::domain::models::{Project, ProjectTree, Subproject, Task, TaskScope, TaskStatus};
use foreman::domain::ports::TaskFilter;
use foreman::services::ready_queue::{eligible_tasks, next_eligible_task};
use foreman::services::TaskService;
use proptest::prelude::*;
use test_strategy::Arbitrary;
use uuid::Uuid;

async fn scope_ids(service: &TaskService, scope: TaskScope) -> Vec<Uuid> {
    service.list(&TaskFilter::scope(scope)).await.unwrap().into_iter().map(|t| t.id).collect()
}

fn permutation() -> impl Strategy<Value = Vec<usize>> {
    (1usize..8).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: after a full reorder, listing the scope returns exactly the submitted order.
    #[test]
    fn prop_reorder_is_listed_back(order in permutation()) {
        let (wanted, listed) = tokio_test::block_on(async {
            let h = Harness::new(MockBehavior::default()).await;
            let project = h.project("api").await;
            let mut ids = Vec::new();
            for i in 0..order.len() {
                ids.push(h.task(&project, &format!("task {i}")).await.id);
            }
            let wanted: Vec<Uuid> = order.iter().map(|&i| ids[i]).collect();

            let service = h.ctx.task_service();
            let scope = TaskScope::Project { project_id: project.id };
            service.reorder(scope, &wanted).await.unwrap();
            let listed = scope_ids(&service, scope).await;
            (wanted, listed)
        });

        prop_assert_eq!(wanted, listed);
    }

    /// Property: a reorder that omits or repeats a member is refused and changes nothing.
    #[test]
    fn prop_partial_reorder_is_rejected(order in permutation(), duplicate in any::<bool>()) {
        prop_assume!(order.len() > 1);

        let (result, before, after) = tokio_test::block_on(async {
            let h = Harness::new(MockBehavior::default()).await;
            let project = h.project("api").await;
            let mut ids = Vec::new();
            for i in 0..order.len() {
                ids.push(h.task(&project, &format!("task {i}")).await.id);
            }
            let mut wanted: Vec<Uuid> = order.iter().map(|&i| ids[i]).collect();
            if duplicate {
                let first = wanted[0];
                if let Some(last) = wanted.last_mut() {
                    *last = first;
                }
            } else {
                wanted.pop();
            }

            let service = h.ctx.task_service();
            let scope = TaskScope::Project { project_id: project.id };
            let before = scope_ids(&service, scope).await;
            let result = service.reorder(scope, &wanted).await;
            (result, before, scope_ids(&service, scope).await)
        });

        prop_assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
        prop_assert_eq!(before, after);
    }
}

#[derive(Arbitrary, Debug, Clone)]
struct TaskSpec {
    paused: bool,
    #[strategy(0i64..6)]
    priority: i64,
    #[strategy(0usize..5)]
    status: usize,
}

#[derive(Arbitrary, Debug, Clone)]
struct SubprojectSpec {
    paused: bool,
    #[strategy(0i64..3)]
    priority: i64,
    #[strategy(proptest::collection::vec(any::<TaskSpec>(), 0..5))]
    tasks: Vec<TaskSpec>,
}

#[derive(Arbitrary, Debug, Clone)]
struct ProjectSpec {
    paused: bool,
    #[strategy(0i64..3)]
    priority: i64,
    #[strategy(proptest::collection::vec(any::<TaskSpec>(), 0..5))]
    tasks: Vec<TaskSpec>,
    #[strategy(proptest::collection::vec(any::<SubprojectSpec>(), 0..3))]
    subprojects: Vec<SubprojectSpec>,
}

#[derive(Arbitrary, Debug, Clone)]
struct TreeSpec {
    #[strategy(proptest::collection::vec(any::<ProjectSpec>(), 0..4))]
    projects: Vec<ProjectSpec>,
}

const STATUSES: [TaskStatus; 5] =
    [TaskStatus::Queued, TaskStatus::InProgress, TaskStatus::Done, TaskStatus::Failed, TaskStatus::Stopped];

fn make_task(project_id: Uuid, subproject_id: Option<Uuid>, shape: &TaskSpec, n: usize) -> Task {
    let mut task = Task::new(project_id, format!("task {n}")).with_model("m");
    task.subproject_id = subproject_id;
    task.paused = shape.paused;
    task.priority = shape.priority;
    task.status = STATUSES[shape.status];
    task
}

/// Build the tree and count how many tasks should be runnable.
fn build(shape: &TreeSpec) -> (ProjectTree, usize) {
    let mut projects = Vec::new();
    let mut subprojects = Vec::new();
    let mut tasks = Vec::new();
    let mut runnable = 0;

    for (pi, ps) in shape.projects.iter().enumerate() {
        let mut project = Project::new(format!("p{pi}"), format!("/p{pi}"));
        project.paused = ps.paused;
        project.priority = ps.priority;

        for ts in &ps.tasks {
            if !ps.paused && !ts.paused && ts.status == 0 {
                runnable += 1;
            }
            tasks.push(make_task(project.id, None, ts, tasks.len()));
        }
        for (si, ss) in ps.subprojects.iter().enumerate() {
            let mut sub = Subproject::new(project.id, format!("s{si}"), format!("/p{pi}/s{si}"));
            sub.paused = ss.paused;
            sub.priority = ss.priority;
            for ts in &ss.tasks {
                if !ps.paused && !ss.paused && !ts.paused && ts.status == 0 {
                    runnable += 1;
                }
                tasks.push(make_task(project.id, Some(sub.id), ts, tasks.len()));
            }
            subprojects.push(sub);
        }
        projects.push(project);
    }

    (ProjectTree::assemble(projects, subprojects, tasks), runnable)
}

/// Property: only runnable tasks outside paused scopes are offered, each scope in priority order.
#[test_strategy::proptest]
fn prop_eligible_tasks_respect_pauses_and_priority(shape: TreeSpec) {
    let (tree, runnable) = build(&shape);
    let eligible = eligible_tasks(&tree);

    let paused_projects: HashSet<Uuid> =
        tree.projects.iter().filter(|n| n.project.paused).map(|n| n.project.id).collect();
    let paused_subprojects: HashSet<Uuid> = tree
        .projects
        .iter()
        .flat_map(|n| n.subprojects.iter())
        .filter(|s| s.subproject.paused)
        .map(|s| s.subproject.id)
        .collect();

    prop_assert_eq!(eligible.len(), runnable);
    for task in &eligible {
        prop_assert!(task.is_admissible());
        prop_assert!(!paused_projects.contains(&task.project_id));
        prop_assert!(task.subproject_id.map_or(true, |id| !paused_subprojects.contains(&id)));
    }

    for pair in eligible.windows(2) {
        if pair[0].scope() == pair[1].scope() {
            prop_assert!(pair[0].priority <= pair[1].priority);
        }
    }

    prop_assert_eq!(next_eligible_task(&tree).map(|t| t.id), eligible.first().map(|t| t.id));
}

/// Property: a project's own tasks are offered before any of its subprojects' tasks.
#[test_strategy::proptest]
fn prop_project_tasks_precede_subproject_tasks(shape: TreeSpec) {
    let (tree, _) = build(&shape);
    let eligible = eligible_tasks(&tree);

    for (i, later) in eligible.iter().enumerate() {
        if later.subproject_id.is_some() {
            continue;
        }
        for earlier in &eligible[..i] {
            if earlier.project_id == later.project_id {
                prop_assert!(earlier.subproject_id.is_none());
            }
        }
    }
}
