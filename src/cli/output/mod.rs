//! CLI output formatting.
//!
//! Every command result implements [`CommandOutput`]; [`output`] prints it as
//! pretty JSON or as human text depending on `--json`.

pub mod progress;
pub mod table;
pub mod tree;

use serde::Serialize;

pub use table::TableFormatter;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate to `max_chars` characters, appending "..." when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// First line of a multi-line text, truncated.
pub fn headline(s: &str, max_chars: usize) -> String {
    truncate(s.lines().next().unwrap_or_default().trim(), max_chars)
}

pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Plain success message used by commands with nothing else to report.
#[derive(Debug, Serialize)]
pub struct MessageOutput {
    pub success: bool,
    pub message: String,
}

impl MessageOutput {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

impl CommandOutput for MessageOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}
