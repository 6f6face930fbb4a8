use console::style;

use crate::cli::output::{headline, short_id};
use crate::cli::output::table::status_icon;
use crate::domain::models::{ProjectTree, Task};

const TREE_BRANCH: &str = "├── ";
const TREE_LAST: &str = "└── ";
const TREE_PIPE: &str = "│   ";
const TREE_SPACE: &str = "    ";

/// Render the project tree in queue order: projects, their own tasks, then
/// subprojects with theirs.
pub fn render_project_tree(tree: &ProjectTree) -> String {
    if tree.projects.is_empty() {
        return "No projects found. Add one with 'foreman project add'.".to_string();
    }

    let mut out = String::new();
    for node in &tree.projects {
        let project = &node.project;
        out.push_str(&format!(
            "{} {} [{}]{}\n",
            style(&project.name).bold(),
            style(&project.path).dim(),
            short_id(&project.id),
            paused_marker(project.paused),
        ));

        let children = node.tasks.len() + node.subprojects.len();
        let mut index = 0;
        for task in &node.tasks {
            index += 1;
            out.push_str(&render_task("", task, index == children));
        }
        for sub in &node.subprojects {
            index += 1;
            let last = index == children;
            out.push_str(&format!(
                "{}{} [{}]{}\n",
                if last { TREE_LAST } else { TREE_BRANCH },
                style(&sub.subproject.name).bold(),
                short_id(&sub.subproject.id),
                paused_marker(sub.subproject.paused),
            ));
            let prefix = if last { TREE_SPACE } else { TREE_PIPE };
            for (i, task) in sub.tasks.iter().enumerate() {
                out.push_str(&render_task(prefix, task, i + 1 == sub.tasks.len()));
            }
        }
    }
    out.trim_end().to_string()
}

fn render_task(prefix: &str, task: &Task, last: bool) -> String {
    let connector = if last { TREE_LAST } else { TREE_BRANCH };
    format!(
        "{prefix}{connector}{} {} [{}]{}\n",
        status_icon(task.status),
        headline(&task.text, 60),
        short_id(&task.id),
        paused_marker(task.paused),
    )
}

fn paused_marker(paused: bool) -> String {
    if paused {
        format!(" {}", style("(paused)").yellow())
    } else {
        String::new()
    }
}
