//! Agent CLI runner.
//!
//! Resolves the command template into an argv, spawns the process in its own
//! process group inside the task's working directory, and captures stdout.
//! Cancellation sends SIGTERM to the whole group and escalates to a forced
//! kill once the grace period runs out. Processes the agent leaves behind
//! after it exits get the same treatment if they keep its output open.

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::ports::{AgentInvocation, AgentRunner, RunOutcome};
use crate::services::context_assembler::fill;

/// Errors raised before or while launching the process.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("command template is empty")]
    EmptyTemplate,
    #[error("command template has an unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("command template has a trailing backslash")]
    TrailingEscape,
    #[error("command template does not contain a {{prompt}} placeholder")]
    MissingPrompt,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Split a command line into words, honouring single quotes, double quotes
/// and backslash escapes.
fn split_words(template: &str) -> Result<Vec<String>, RunnerError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(RunnerError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(RunnerError::UnterminatedQuote('"')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(RunnerError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next().ok_or(RunnerError::TrailingEscape)?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Resolve a command template into an argv.
///
/// Placeholders are substituted after splitting, so a prompt containing
/// spaces or quotes always stays a single argument.
pub fn build_argv(template: &str, prompt: &str, model: &str, reasoning: &str) -> Result<Vec<String>, RunnerError> {
    let words = split_words(template)?;
    if words.is_empty() {
        return Err(RunnerError::EmptyTemplate);
    }
    if !words.iter().any(|w| w.contains("{prompt}")) {
        return Err(RunnerError::MissingPrompt);
    }

    let values = [("{prompt}", prompt), ("{model}", model), ("{reasoning}", reasoning)];
    Ok(words.iter().map(|word| fill(word, &values)).collect())
}

/// Runs the configured agent CLI as a child process.
pub struct CliRunner {
    grace_period: Duration,
}

impl CliRunner {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    fn spawn(&self, argv: &[String], invocation: &AgentInvocation) -> Result<Child, RunnerError> {
        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyTemplate)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .env("FOREMAN_TASK_ID", invocation.task_id.to_string());

        cmd.spawn().map_err(|source| RunnerError::Spawn { program: program.clone(), source })
    }

    /// SIGTERM the process group, then force-kill after the grace period.
    async fn terminate(&self, child: &mut Child, group: Option<Pid>) {
        signal_group(group, Signal::SIGTERM);

        if tokio::time::timeout(self.grace_period, child.wait()).await.is_ok() {
            return;
        }

        tracing::warn!(grace_ms = self.grace_period.as_millis() as u64, "agent ignored SIGTERM, killing");
        signal_group(group, Signal::SIGKILL);
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "kill after grace period failed");
        }
    }

    /// Wait for both output pipes to close after the leader has exited.
    ///
    /// Anything the agent left running in its group keeps the pipes open. Each
    /// grace period without EOF, and a stop request, sends the group the next
    /// signal: SIGTERM first, then SIGKILL. Returns stdout, stderr and whether
    /// a stop arrived while waiting.
    async fn drain(
        &self,
        group: Option<Pid>,
        mut stdout: JoinHandle<String>,
        mut stderr: JoinHandle<String>,
        cancel: &CancellationToken,
    ) -> (String, String, bool) {
        let mut escalation = [Signal::SIGTERM, Signal::SIGKILL].into_iter();
        let mut stopped = false;

        let drained = {
            let streams = futures::future::join(&mut stdout, &mut stderr);
            tokio::pin!(streams);
            loop {
                tokio::select! {
                    biased;
                    (out, err) = &mut streams => break Some((out.unwrap_or_default(), err.unwrap_or_default())),
                    () = cancel.cancelled(), if !stopped => {
                        stopped = true;
                        tracing::info!("stop requested while agent output is still open");
                        if let Some(signal) = escalation.next() {
                            signal_group(group, signal);
                        }
                    }
                    () = tokio::time::sleep(self.grace_period) => match escalation.next() {
                        Some(signal) => {
                            tracing::warn!(?signal, "agent left processes holding its output");
                            signal_group(group, signal);
                        }
                        None => break None,
                    },
                }
            }
        };

        match drained {
            Some((output, errors)) => (output, errors, stopped),
            None => {
                tracing::warn!("agent output still open after SIGKILL, abandoning it");
                stdout.abort();
                stderr.abort();
                (String::new(), String::new(), stopped)
            }
        }
    }
}

fn signal_group(group: Option<Pid>, signal: Signal) {
    if let Some(group) = group {
        if let Err(e) = killpg(group, signal) {
            tracing::debug!(error = %e, ?signal, "signal to process group failed");
        }
    }
}

fn read_stream<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            if let Err(e) = stream.read_to_end(&mut buf).await {
                tracing::debug!(error = %e, "stopped reading agent output");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Last few lines of stderr, enough to explain a failure.
fn stderr_tail(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let start = lines.len().saturating_sub(5);
    Some(lines[start..].join("\n"))
}

#[async_trait]
impl AgentRunner for CliRunner {
    fn name(&self) -> &'static str {
        "cli"
    }

    #[tracing::instrument(skip(self, invocation, cancel), fields(task_id = %invocation.task_id))]
    async fn run(&self, invocation: AgentInvocation, cancel: CancellationToken) -> RunOutcome {
        let argv = match build_argv(
            &invocation.command_template,
            &invocation.prompt,
            &invocation.model,
            &invocation.reasoning,
        ) {
            Ok(argv) => argv,
            Err(e) => return RunOutcome::failed(e.to_string()),
        };

        if cancel.is_cancelled() {
            return RunOutcome::Cancelled { output: String::new() };
        }

        let mut child = match self.spawn(&argv, &invocation) {
            Ok(child) => child,
            Err(e) => return RunOutcome::failed(e.to_string()),
        };
        tracing::info!(pid = child.id(), program = %argv[0], "agent process started");

        // The child leads its own group, so its pid is the group id. Read it
        // now because the pid is no longer reported once the child is reaped.
        let group = child.id().and_then(|pid| i32::try_from(pid).ok()).map(Pid::from_raw);
        let stdout = read_stream(child.stdout.take());
        let stderr = read_stream(child.stderr.take());

        let exit = tokio::select! {
            status = child.wait() => Some(status),
            () = cancel.cancelled() => None,
        };

        match exit {
            None => {
                self.terminate(&mut child, group).await;
                let (output, _, _) = self.drain(group, stdout, stderr, &cancel).await;
                tracing::info!("agent process cancelled");
                RunOutcome::Cancelled { output }
            }
            Some(Err(e)) => {
                let _ = child.kill().await;
                signal_group(group, Signal::SIGKILL);
                let (output, _, _) = self.drain(group, stdout, stderr, &cancel).await;
                RunOutcome::Failed { reason: RunnerError::Wait(e).to_string(), output }
            }
            Some(Ok(status)) => {
                let (output, errors, stopped) = self.drain(group, stdout, stderr, &cancel).await;
                if stopped {
                    tracing::info!("agent process cancelled after exit");
                    RunOutcome::Cancelled { output }
                } else if status.success() {
                    tracing::info!(bytes = output.len(), "agent process exited");
                    RunOutcome::Completed(output)
                } else {
                    let code = status
                        .code()
                        .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"));
                    let reason = match stderr_tail(&errors) {
                        Some(tail) => format!("agent failed with {code}: {tail}"),
                        None => format!("agent failed with {code}"),
                    };
                    tracing::warn!(%reason, "agent process failed");
                    RunOutcome::Failed { reason, output }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn invocation(template: &str, prompt: &str) -> AgentInvocation {
        AgentInvocation {
            task_id: Uuid::new_v4(),
            command_template: template.to_string(),
            prompt: prompt.to_string(),
            model: "gpt-5".to_string(),
            reasoning: "high".to_string(),
            working_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn test_build_argv_substitutes_per_word() {
        let argv = build_argv(
            "codex exec --model {model} -c model_reasoning_effort={reasoning} {prompt}",
            "fix the \"flaky\" test",
            "gpt-5",
            "high",
        )
        .unwrap();
        assert_eq!(
            argv,
            vec!["codex", "exec", "--model", "gpt-5", "-c", "model_reasoning_effort=high", "fix the \"flaky\" test"]
        );
    }

    #[test]
    fn test_build_argv_honours_quotes() {
        let argv = build_argv(r#"sh -c 'echo "$0"' "{prompt}" a\ b"#, "hi there", "m", "r").unwrap();
        assert_eq!(argv, vec!["sh", "-c", "echo \"$0\"", "hi there", "a b"]);
    }

    #[test]
    fn test_build_argv_does_not_expand_substituted_values() {
        let argv = build_argv("agent --model {model} -r {reasoning} {prompt}", "say {model}", "{prompt}", "{reasoning}")
            .unwrap();
        assert_eq!(argv, vec!["agent", "--model", "{prompt}", "-r", "{reasoning}", "say {model}"]);
    }

    #[test]
    fn test_build_argv_rejects_malformed_templates() {
        assert!(matches!(build_argv("   ", "p", "m", "r"), Err(RunnerError::EmptyTemplate)));
        assert!(matches!(build_argv("agent 'oops {prompt}", "p", "m", "r"), Err(RunnerError::UnterminatedQuote('\''))));
        assert!(matches!(build_argv("agent --model {model}", "p", "m", "r"), Err(RunnerError::MissingPrompt)));
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = CliRunner::new(Duration::from_millis(200));
        let outcome = runner.run(invocation("echo {prompt}", "hello world"), CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed("hello world\n".to_string()));
    }

    #[tokio::test]
    async fn test_run_reports_non_zero_exit() {
        let runner = CliRunner::new(Duration::from_millis(200));
        let outcome = runner
            .run(invocation("sh -c 'echo broken >&2; exit 3' {prompt}", "x"), CancellationToken::new())
            .await;
        match outcome {
            RunOutcome::Failed { reason, .. } => {
                assert!(reason.contains("exit code 3"));
                assert!(reason.contains("broken"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_reports_spawn_failure() {
        let runner = CliRunner::new(Duration::from_millis(200));
        let outcome = runner
            .run(invocation("definitely-not-a-real-binary-4821 {prompt}", "x"), CancellationToken::new())
            .await;
        assert!(matches!(outcome, RunOutcome::Failed { ref reason, .. } if reason.contains("failed to spawn")));
    }

    #[tokio::test]
    async fn test_cancel_terminates_process() {
        let runner = CliRunner::new(Duration::from_millis(500));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = runner.run(invocation("sh -c 'sleep 30' {prompt}", "agent"), cancel).await;
        assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancel_escalates_when_sigterm_ignored() {
        let runner = CliRunner::new(Duration::from_millis(200));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = runner
            .run(invocation("sh -c 'trap \"\" TERM; sleep 30' {prompt}", ""), cancel)
            .await;
        assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stop_reaches_processes_left_behind_after_exit() {
        let runner = CliRunner::new(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = runner.run(invocation("sh -c 'sleep 30 & echo hi' {prompt}", "agent"), cancel).await;
        assert_eq!(outcome, RunOutcome::Cancelled { output: "hi\n".to_string() });
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_leftover_processes_are_terminated_after_grace() {
        let runner = CliRunner::new(Duration::from_millis(300));
        let started = std::time::Instant::now();
        let outcome = runner
            .run(invocation("sh -c 'sleep 30 & echo hi' {prompt}", "agent"), CancellationToken::new())
            .await;
        assert_eq!(outcome, RunOutcome::Completed("hi\n".to_string()));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
