//! Task CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{parse_metadata, CommandContext};
use crate::cli::id_resolver::{resolve_project_id, resolve_subproject_id, resolve_task_id, resolve_task_ids};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, Task, TaskAction, TaskResponse, TaskScope, TaskStatus, TaskUpdate};
use crate::domain::ports::TaskFilter;
use crate::services::ActionOutcome;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Queue a new task at the end of its scope
    Add {
        /// Prompt text handed to the agent
        text: String,
        /// Project ID (or unique prefix)
        #[arg(short, long)]
        project: String,
        /// Subproject ID (or unique prefix)
        #[arg(short, long)]
        subproject: Option<String>,
        /// Model; defaults to the default_model setting
        #[arg(short, long)]
        model: Option<String>,
        /// Reasoning effort; defaults to the default_reasoning setting
        #[arg(short, long)]
        reasoning: Option<String>,
        /// Include this many earlier responses from the same scope
        #[arg(long, value_name = "N")]
        context: Option<u32>,
        /// Create the task paused
        #[arg(long)]
        paused: bool,
        /// Arbitrary JSON metadata
        #[arg(long)]
        metadata: Option<String>,
    },
    /// List tasks in queue order
    List {
        #[arg(short, long)]
        project: Option<String>,
        #[arg(short, long)]
        subproject: Option<String>,
        /// Filter by status (queued, in_progress, done, failed, stopped)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a task and its latest response
    Show { id: String },
    /// Edit a task that is not running
    Edit {
        id: String,
        #[arg(short, long)]
        text: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
        #[arg(short, long)]
        reasoning: Option<String>,
        /// Include this many earlier responses from the same scope
        #[arg(long, value_name = "N", conflicts_with = "no_context")]
        context: Option<u32>,
        /// Stop including earlier responses
        #[arg(long)]
        no_context: bool,
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Exclude a task from scheduling
    Pause { id: String },
    /// Make a paused task eligible again
    Resume { id: String },
    /// Stop a running task
    Stop { id: String },
    /// Remove a task, stopping it first if it is running
    Rm { id: String },
    /// Set the full order of the tasks in one scope
    Reorder {
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        subproject: Option<String>,
        /// Every task ID of the scope, highest priority first
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Queue a finished task again
    Resubmit { id: String },
    /// List the recorded responses of a task
    Responses {
        id: String,
        /// Print only the newest response in full
        #[arg(long)]
        latest: bool,
    },
}

/// A task as printed by the CLI; adds the derived edit lock.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub edit_locked: bool,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self { edit_locked: task.is_edit_locked(), task }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskView>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        let tasks: Vec<Task> = self.tasks.iter().map(|v| v.task.clone()).collect();
        format!("{}\n\nShowing {} task(s)", TableFormatter::new().format_tasks(&tasks), self.total)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetailOutput {
    #[serde(flatten)]
    pub task: TaskView,
    pub latest_response: Option<TaskResponse>,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let task = &self.task.task;
        let mut lines = vec![
            format!("Task {}", task.id),
            format!("  Status:    {}{}", task.status, if task.paused { " (paused)" } else { "" }),
            format!("  Priority:  {}", task.priority),
            format!("  Model:     {} / {}", task.model, task.reasoning),
            format!("  Project:   {}", task.project_id),
        ];
        if let Some(sub) = task.subproject_id {
            lines.push(format!("  Subproject: {sub}"));
        }
        if task.wants_history() {
            lines.push(format!("  Context:   last {} response(s)", task.previous_context_messages));
        }
        lines.push(format!("  Created:   {}", task.created_at.format("%Y-%m-%d %H:%M:%S UTC")));
        if let Some(started) = task.started_at {
            lines.push(format!("  Started:   {}", started.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(completed) = task.completed_at {
            lines.push(format!("  Completed: {}", completed.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(action) = task.pending_action {
            lines.push(format!("  Pending:   {} requested", action.as_str()));
        }
        if let Some(error) = &task.last_error {
            lines.push(format!("  Error:     {error}"));
        }
        if let Some(metadata) = &task.metadata {
            lines.push(format!("  Metadata:  {metadata}"));
        }
        lines.push(String::new());
        lines.push(task.text.clone());
        if let Some(response) = &self.latest_response {
            lines.push(String::new());
            lines.push(format!("--- latest response ({}) ---", response.created_at.format("%Y-%m-%d %H:%M:%S")));
            lines.push(response.output.clone());
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskActionOutput {
    pub success: bool,
    pub action: String,
    pub outcome: ActionOutcome,
    pub task_id: String,
}

impl CommandOutput for TaskActionOutput {
    fn to_human(&self) -> String {
        match self.outcome {
            ActionOutcome::Applied => format!("Task {}: {} applied", self.task_id, self.action),
            ActionOutcome::NoOp => format!("Task {}: nothing to {}", self.task_id, self.action),
            ActionOutcome::Requested => {
                format!("Task {}: {} requested; the scheduler will finish it", self.task_id, self.action)
            }
        }
    }
}

/// Responses newest first, as the service returns them.
#[derive(Debug, Serialize)]
pub struct ResponseListOutput {
    pub responses: Vec<TaskResponse>,
    #[serde(skip)]
    pub latest_only: bool,
}

impl CommandOutput for ResponseListOutput {
    fn to_human(&self) -> String {
        match (self.latest_only, self.responses.first()) {
            (_, None) => "No responses recorded.".to_string(),
            (true, Some(latest)) => latest.output.clone(),
            (false, Some(_)) => TableFormatter::new().format_responses(&self.responses),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        if self.latest_only {
            serde_json::to_value(self.responses.first()).unwrap_or_default()
        } else {
            serde_json::to_value(self).unwrap_or_default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskReorderOutput {
    pub success: bool,
    pub order: Vec<String>,
}

impl CommandOutput for TaskReorderOutput {
    fn to_human(&self) -> String {
        format!("Reordered {} task(s)", self.order.len())
    }
}

impl CommandOutput for TaskView {
    fn to_human(&self) -> String {
        format!("Task {} [{}] priority {}", self.task.id, self.task.status, self.task.priority)
    }
}

async fn resolve_scope(ctx: &CommandContext, project: &str, subproject: Option<&str>) -> Result<TaskScope> {
    let project_id = resolve_project_id(&ctx.pool, project).await?;
    let subproject_id = match subproject {
        Some(prefix) => Some(resolve_subproject_id(&ctx.pool, prefix).await?),
        None => None,
    };
    Ok(TaskScope::new(project_id, subproject_id))
}

async fn apply(ctx: &CommandContext, id: &str, action: TaskAction, json_mode: bool) -> Result<()> {
    let task_id = resolve_task_id(&ctx.pool, id).await?;
    let outcome = ctx
        .scheduler
        .task_service()
        .apply_action(task_id, action)
        .await
        .with_context(|| format!("Failed to {} task {task_id}", action.as_str()))?;
    let out = TaskActionOutput {
        success: true,
        action: action.as_str().to_string(),
        outcome,
        task_id: task_id.to_string(),
    };
    output(&out, json_mode);
    Ok(())
}

pub async fn execute(args: TaskArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CommandContext::open(config).await?;
    let service = ctx.scheduler.task_service();

    match args.command {
        TaskCommands::Add { text, project, subproject, model, reasoning, context, paused, metadata } => {
            let scope = resolve_scope(&ctx, &project, subproject.as_deref()).await?;
            let mut task = Task::new(scope.project_id(), text)
                .with_model(model.unwrap_or_default())
                .with_reasoning(reasoning.unwrap_or_default());
            task.subproject_id = scope.subproject_id();
            if let Some(messages) = context {
                task = task.with_previous_context(messages);
            }
            if let Some(metadata) = parse_metadata(metadata.as_deref())? {
                task = task.with_metadata(metadata);
            }
            if paused {
                task = task.paused();
            }

            let created = service.create(task).await.context("Failed to create task")?;
            output(&TaskView::from(created), json_mode);
        }

        TaskCommands::List { project, subproject, status } => {
            let mut filter = TaskFilter::default();
            if let Some(status) = status {
                filter.status =
                    Some(TaskStatus::from_str(&status).ok_or_else(|| anyhow::anyhow!("Invalid status: {status}"))?);
            }
            match (project, subproject) {
                (Some(project), sub) => {
                    let scope = resolve_scope(&ctx, &project, sub.as_deref()).await?;
                    if scope.subproject_id().is_some() {
                        filter.scope = Some(scope);
                    } else {
                        filter.project_id = Some(scope.project_id());
                    }
                }
                (None, Some(_)) => bail!("--subproject requires --project"),
                (None, None) => {}
            }

            let tasks = service.list(&filter).await.context("Failed to list tasks")?;
            let out = TaskListOutput { total: tasks.len(), tasks: tasks.into_iter().map(TaskView::from).collect() };
            output(&out, json_mode);
        }

        TaskCommands::Show { id } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let task = service.get(task_id).await?;
            let latest_response = service.latest_response(task_id).await?;
            output(&TaskDetailOutput { task: TaskView::from(task), latest_response }, json_mode);
        }

        TaskCommands::Edit { id, text, model, reasoning, context, no_context, metadata } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let mut update = TaskUpdate {
                text,
                model,
                reasoning,
                metadata: parse_metadata(metadata.as_deref())?,
                ..Default::default()
            };
            if let Some(messages) = context {
                update.include_previous_context = Some(true);
                update.previous_context_messages = Some(messages);
            } else if no_context {
                update.include_previous_context = Some(false);
            }
            if update.is_empty() {
                bail!("Nothing to edit; pass at least one field");
            }

            let task = service.update(task_id, &update).await.context("Failed to edit task")?;
            output(&TaskView::from(task), json_mode);
        }

        TaskCommands::Pause { id } => apply(&ctx, &id, TaskAction::Pause, json_mode).await?,
        TaskCommands::Resume { id } => apply(&ctx, &id, TaskAction::Resume, json_mode).await?,
        TaskCommands::Stop { id } => apply(&ctx, &id, TaskAction::Stop, json_mode).await?,
        TaskCommands::Rm { id } => apply(&ctx, &id, TaskAction::Remove, json_mode).await?,

        TaskCommands::Reorder { project, subproject, ids } => {
            let scope = resolve_scope(&ctx, &project, subproject.as_deref()).await?;
            let ordered = resolve_task_ids(&ctx.pool, &ids).await?;
            service.reorder(scope, &ordered).await.context("Failed to reorder tasks")?;
            let out = TaskReorderOutput { success: true, order: ordered.iter().map(ToString::to_string).collect() };
            output(&out, json_mode);
        }

        TaskCommands::Resubmit { id } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let task = service.resubmit(task_id).await.context("Failed to resubmit task")?;
            output(&TaskView::from(task), json_mode);
        }

        TaskCommands::Responses { id, latest } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let responses = service.responses(task_id).await?;
            output(&ResponseListOutput { responses, latest_only: latest }, json_mode);
        }
    }

    Ok(())
}
