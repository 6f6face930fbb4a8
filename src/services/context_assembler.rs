//! Context assembler: turns a task into the prompt handed to the agent.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HistoryEntry, Task};
use crate::domain::ports::TaskRepository;

/// The two prompt templates in effect for one admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    /// Placeholder: `{task}`
    pub plain: String,
    /// Placeholders: `{history}`, `{task}`
    pub with_history: String,
}

pub struct ContextAssembler {
    tasks: Arc<dyn TaskRepository>,
}

impl ContextAssembler {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Build the final prompt for `task`.
    ///
    /// History is the latest `previous_context_messages` responses of the
    /// task's scope, rendered oldest first.
    #[tracing::instrument(skip(self, task, templates), fields(task_id = %task.id))]
    pub async fn build_prompt(&self, task: &Task, templates: &PromptTemplates) -> DomainResult<String> {
        if !task.wants_history() {
            return Ok(fill(&templates.plain, &[("{task}", &task.text)]));
        }

        let mut history = self.tasks.recent_history(task.scope(), task.previous_context_messages).await?;
        history.reverse();
        tracing::debug!(entries = history.len(), "assembled history");

        let rendered = render_history(&history);
        Ok(fill(&templates.with_history, &[("{history}", &rendered), ("{task}", &task.text)]))
    }
}

/// Render history entries in the order given.
pub fn render_history(entries: &[HistoryEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "### Previous task {}\n{}\n\n### Response\n{}",
                i + 1,
                entry.task_text.trim(),
                entry.output.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Substitute placeholders in a single left-to-right pass, so text that is
/// itself substituted is never scanned again.
pub(crate) fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (placeholder, value) in values {
            if let Some(after) = rest.strip_prefix(placeholder) {
                out.push_str(value);
                rest = after;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}
