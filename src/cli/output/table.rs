//! Table output formatting for CLI commands
//!
//! Tables for tasks, projects, subprojects, settings and responses using
//! comfy-table, with color-coded status cells.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::cli::output::{headline, short_id};
use crate::domain::models::{Project, Setting, SettingSource, Subproject, Task, TaskResponse, TaskStatus};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormatter {
    pub fn new() -> Self {
        Self { use_colors: supports_color(), max_width: None }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self { use_colors, max_width }
    }

    pub fn format_tasks(&self, tasks: &[Task]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Pri", "Status", "Task", "Model", "Flags"]));

        for task in tasks {
            table.add_row(vec![
                Cell::new(short_id(&task.id)),
                Cell::new(task.priority),
                self.status_cell(task.status),
                Cell::new(headline(&task.text, 50)),
                Cell::new(format!("{} / {}", task.model, task.reasoning)),
                Cell::new(task_flags(task)),
            ]);
        }

        table.to_string()
    }

    pub fn format_projects(&self, projects: &[Project]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Pri", "Name", "Path", "State"]));

        for project in projects {
            table.add_row(vec![
                Cell::new(short_id(&project.id)),
                Cell::new(project.priority),
                Cell::new(&project.name).add_attribute(Attribute::Bold),
                Cell::new(&project.path),
                self.paused_cell(project.paused),
            ]);
        }

        table.to_string()
    }

    pub fn format_subprojects(&self, subprojects: &[Subproject]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Project", "Pri", "Name", "Path", "State"]));

        for subproject in subprojects {
            table.add_row(vec![
                Cell::new(short_id(&subproject.id)),
                Cell::new(short_id(&subproject.project_id)),
                Cell::new(subproject.priority),
                Cell::new(&subproject.name).add_attribute(Attribute::Bold),
                Cell::new(&subproject.path),
                self.paused_cell(subproject.paused),
            ]);
        }

        table.to_string()
    }

    pub fn format_settings(&self, settings: &[Setting]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Key", "Value", "Source"]));

        for setting in settings {
            let value = setting.effective_value.as_deref().unwrap_or("-");
            let source = match setting.source {
                SettingSource::Override => "override",
                SettingSource::Environment => "env",
                SettingSource::Default => "default",
                SettingSource::Unset => "unset",
            };
            let source_cell = if self.use_colors && setting.source == SettingSource::Override {
                Cell::new(source).fg(Color::Cyan)
            } else {
                Cell::new(source)
            };
            table.add_row(vec![Cell::new(setting.key.as_str()), Cell::new(value), source_cell]);
        }

        table.to_string()
    }

    pub fn format_responses(&self, responses: &[TaskResponse]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["#", "Recorded", "Output"]));

        for (index, response) in responses.iter().enumerate() {
            table.add_row(vec![
                Cell::new(index + 1),
                Cell::new(response.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(headline(&response.output, 80)),
            ]);
        }

        table.to_string()
    }

    fn status_cell(&self, status: TaskStatus) -> Cell {
        if self.use_colors {
            Cell::new(status.as_str()).fg(status_color(status))
        } else {
            Cell::new(format!("{} {}", status_icon(status), status.as_str()))
        }
    }

    fn paused_cell(&self, paused: bool) -> Cell {
        let label = if paused { "paused" } else { "active" };
        if self.use_colors {
            Cell::new(label).fg(if paused { Color::Yellow } else { Color::Green })
        } else {
            Cell::new(label)
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED).set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        if !self.use_colors {
            table.force_no_tty();
        }
        table
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels.iter().map(|label| Cell::new(label).add_attribute(Attribute::Bold)).collect()
}

fn task_flags(task: &Task) -> String {
    let mut flags = Vec::new();
    if task.paused {
        flags.push("paused".to_string());
    }
    if task.is_edit_locked() {
        flags.push("locked".to_string());
    }
    if task.wants_history() {
        flags.push(format!("ctx:{}", task.previous_context_messages));
    }
    if let Some(action) = task.pending_action {
        flags.push(format!("{}-requested", action.as_str()));
    }
    flags.join(" ")
}

pub fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Queued => Color::Blue,
        TaskStatus::InProgress => Color::Yellow,
        TaskStatus::Done => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Stopped => Color::DarkGrey,
    }
}

pub fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Queued => "○",
        TaskStatus::InProgress => "◐",
        TaskStatus::Done => "●",
        TaskStatus::Failed => "✗",
        TaskStatus::Stopped => "■",
    }
}

/// Colors are on unless `NO_COLOR` is set or stdout is not a terminal.
fn supports_color() -> bool {
    env::var_os("NO_COLOR").is_none() && console::Term::stdout().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn formatter() -> TableFormatter {
        TableFormatter::with_config(false, Some(160))
    }

    #[test]
    fn test_task_table_shows_flags() {
        let mut task = Task::new(Uuid::new_v4(), "Migrate the schema\nwith details").with_model("gpt-5").paused();
        task.status = TaskStatus::InProgress;
        let rendered = formatter().format_tasks(&[task.clone()]);
        assert!(rendered.contains(&short_id(&task.id)));
        assert!(rendered.contains("Migrate the schema"));
        assert!(!rendered.contains("with details"));
        assert!(rendered.contains("paused locked"));
        assert!(rendered.contains("in_progress"));
    }

    #[test]
    fn test_project_table_shows_state() {
        let project = Project::new("billing", "/srv/billing").paused();
        let rendered = formatter().format_projects(&[project]);
        assert!(rendered.contains("billing"));
        assert!(rendered.contains("paused"));
    }

    #[test]
    fn test_settings_table_shows_source() {
        let settings = vec![Setting::resolve(
            crate::domain::models::SettingKey::MaxParallelTasks,
            Some("3".to_string()),
            None,
        )];
        let rendered = formatter().format_settings(&settings);
        assert!(rendered.contains("max_parallel_tasks"));
        assert!(rendered.contains("override"));
    }
}
