//! Agent runner port - interface for executing one task's agent process.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything needed to launch one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub task_id: Uuid,
    /// Command line with `{prompt}`, `{model}` and `{reasoning}` placeholders
    pub command_template: String,
    pub prompt: String,
    pub model: String,
    pub reasoning: String,
    pub working_dir: PathBuf,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Process exited successfully; carries its full stdout
    Completed(String),
    /// Spawn failure, malformed template or non-zero exit
    Failed {
        reason: String,
        /// Whatever stdout was captured before the failure
        output: String,
    },
    /// The cancellation token fired before the process finished
    Cancelled {
        /// Whatever stdout was captured before the process was terminated
        output: String,
    },
}

impl RunOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into(), output: String::new() }
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Completed(output) | Self::Failed { output, .. } | Self::Cancelled { output } => output,
        }
    }
}

/// Port for running an agent process to completion.
///
/// `run` must resolve to `Cancelled` whenever `cancel` fires first, and must
/// not return until the process has exited.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, invocation: AgentInvocation, cancel: CancellationToken) -> RunOutcome;
}
