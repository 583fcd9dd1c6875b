//! # Supervised Command Execution
//!
//! This module is the execution engine: it runs one shell command under
//! supervision and reports what happened. Supervision covers the full
//! lifecycle:
//!
//! 1. **Preconditions**: the working directory must exist before anything is
//!    spawned.
//! 2. **Policy**: commands that do not match a bypass pattern are wrapped by
//!    the session's sandbox mechanism before spawn.
//! 3. **Spawn**: the child runs `sh -c` in its own process group, with
//!    stdout and stderr piped.
//! 4. **Streaming**: output is forwarded chunk by chunk through the
//!    configured callback as it arrives; nothing waits for process exit.
//! 5. **Timeout and cancellation**: a configured timeout and a cancellation
//!    token are raced against process exit. Either one terminates the whole
//!    process group, not just the immediate child, so forked descendants die
//!    too. Termination is idempotent and best-effort.
//! 6. **Diagnostics**: a nonzero exit on the sandboxed path asks the
//!    mechanism to annotate the captured stderr; any information beyond what
//!    was already streamed is delivered as one final diagnostic chunk.
//!
//! Each invocation owns its child, timer, and cancellation listener. The
//! only shared state is the read-only [`SandboxState`] snapshot.

use crate::callback::{CallbackSender, ExecEvent};
use crate::process_group;
use crate::sandbox::SandboxState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;

/// Upper bound on stderr retained for the violation-annotation pass. Output
/// streaming to the callback is unaffected by this cap.
const STDERR_CAPTURE_LIMIT: usize = 256 * 1024;

/// Lifecycle states of one supervised invocation. Terminal states are
/// mutually exclusive and final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Created,
    Running,
    Completed,
    TimedOut,
    Cancelled,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::TimedOut
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Failed
        )
    }
}

/// Failures of the execution lifecycle. Policy decisions never surface
/// here; they are booleans answered before execution starts.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("working directory does not exist: {path:?}")]
    DirectoryNotFound { path: PathBuf },

    #[error("operation timed out after {}s (exceeded timeout limit)", .limit.as_secs())]
    Timeout { limit: Duration },

    #[error("operation was cancelled")]
    Cancelled,

    #[error("failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sandbox wrapping failed: {0}")]
    Wrap(#[source] anyhow::Error),
}

/// Options for one supervised invocation.
#[derive(Default)]
pub struct ExecOptions {
    /// Kill the process group and fail with `Timeout` after this long.
    /// `None` or zero disables the timer.
    pub timeout: Option<Duration>,
    /// Cooperative cancellation; firing kills the process group and fails
    /// with `Cancelled`.
    pub cancellation: Option<CancellationToken>,
    /// Receiver for start, output, and diagnostic events.
    pub callback: Option<Box<dyn CallbackSender>>,
}

/// Runs shell commands under the session policy.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    state: Arc<SandboxState>,
}

enum StreamChunk {
    Data { bytes: Vec<u8>, is_stderr: bool },
}

enum Outcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

impl ShellExecutor {
    pub fn new(state: Arc<SandboxState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SandboxState {
        &self.state
    }

    /// Executes `command` via `sh -c` in `working_dir` and resolves with its
    /// exit code (`None` when the child was killed by a signal).
    ///
    /// The command is wrapped by the sandbox mechanism unless the session
    /// policy bypasses it. Rejects with [`ExecError`] on a missing working
    /// directory, spawn failure, timeout, or cancellation.
    pub async fn execute(
        &self,
        command: &str,
        working_dir: &Path,
        options: ExecOptions,
    ) -> Result<Option<i32>, ExecError> {
        let mut status = ExecutionStatus::Created;
        tracing::debug!(
            "Execution requested: {} (in {:?}, status: {:?})",
            command,
            working_dir,
            status
        );

        if !working_dir.is_dir() {
            tracing::warn!("Refusing to execute, working directory missing: {:?}", working_dir);
            return Err(ExecError::DirectoryNotFound {
                path: working_dir.to_path_buf(),
            });
        }

        let sandboxed = !self.state.should_bypass(command);
        let shell_command = if sandboxed {
            self.state
                .wrap_command(command)
                .await
                .map_err(ExecError::Wrap)?
        } else {
            tracing::debug!("Command runs unsandboxed by policy: {}", command);
            command.to_string()
        };

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&shell_command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        process_group::spawn_in_own_group(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!("Failed to spawn '{}': {}", shell_command, e);
            ExecError::Spawn(e)
        })?;
        status = ExecutionStatus::Running;
        tracing::debug!("Spawned child {:?} (status: {:?})", child.id(), status);

        let callback = options.callback;
        if let Some(callback) = &callback {
            let started = ExecEvent::Started {
                command: command.to_string(),
                working_directory: working_dir.to_string_lossy().to_string(),
            };
            if let Err(e) = callback.send_event(started).await {
                tracing::debug!("Failed to deliver start event: {}", e);
            }
        }

        let (chunk_tx, mut chunk_rx) = mpsc::channel::<StreamChunk>(64);
        spawn_stream_pump(child.stdout.take(), false, chunk_tx.clone());
        spawn_stream_pump(child.stderr.take(), true, chunk_tx);

        let limit = options.timeout.filter(|d| !d.is_zero());
        let mut timeout_sleep: Option<Pin<Box<Sleep>>> = limit.map(|d| Box::pin(sleep(d)));
        let has_timeout = timeout_sleep.is_some();
        let cancellation = options.cancellation;
        let has_cancellation = cancellation.is_some();

        let mut exit_status: Option<std::process::ExitStatus> = None;
        let mut streams_done = false;
        let mut stderr_captured = String::new();

        let outcome = loop {
            tokio::select! {
                biased;

                _ = wait_optional_cancel(cancellation.as_ref()),
                    if has_cancellation && exit_status.is_none() =>
                {
                    break Outcome::Cancelled;
                }

                _ = wait_optional_sleep(&mut timeout_sleep),
                    if has_timeout && exit_status.is_none() =>
                {
                    break Outcome::TimedOut;
                }

                result = child.wait(), if exit_status.is_none() => {
                    match result {
                        Ok(exit) => exit_status = Some(exit),
                        Err(e) => {
                            status = ExecutionStatus::Failed;
                            tracing::error!("Failed waiting for child: {} (status: {:?})", e, status);
                            process_group::terminate_tree(&mut child).await;
                            return Err(ExecError::Spawn(e));
                        }
                    }
                }

                chunk = chunk_rx.recv(), if !streams_done => {
                    match chunk {
                        Some(StreamChunk::Data { bytes, is_stderr }) => {
                            let text = String::from_utf8_lossy(&bytes).to_string();
                            if is_stderr {
                                append_capped(&mut stderr_captured, &text);
                            }
                            if let Some(callback) = &callback {
                                let event = ExecEvent::Output { chunk: text, is_stderr };
                                if let Err(e) = callback.send_event(event).await {
                                    tracing::debug!("Failed to deliver output chunk: {}", e);
                                }
                            }
                        }
                        None => streams_done = true,
                    }
                }
            }

            if streams_done && let Some(exit) = exit_status {
                break Outcome::Exited(exit);
            }
        };

        match outcome {
            Outcome::TimedOut => {
                status = ExecutionStatus::TimedOut;
                let limit = limit.unwrap_or_default();
                tracing::warn!(
                    "Execution exceeded {}s, terminating process group (status: {:?})",
                    limit.as_secs(),
                    status
                );
                process_group::terminate_tree(&mut child).await;
                Err(ExecError::Timeout { limit })
            }
            Outcome::Cancelled => {
                status = ExecutionStatus::Cancelled;
                tracing::info!("Execution cancelled, terminating process group (status: {:?})", status);
                process_group::terminate_tree(&mut child).await;
                Err(ExecError::Cancelled)
            }
            Outcome::Exited(exit) => {
                status = ExecutionStatus::Completed;
                tracing::debug!("Child exited with {:?} (status: {:?})", exit, status);

                if sandboxed && !exit.success() {
                    self.emit_sandbox_diagnostics(command, &stderr_captured, callback.as_deref())
                        .await;
                }
                Ok(exit.code())
            }
        }
    }

    /// Asks the mechanism whether the captured stderr hides a sandbox
    /// violation, and forwards anything it adds as one diagnostic event.
    async fn emit_sandbox_diagnostics(
        &self,
        command: &str,
        stderr_captured: &str,
        callback: Option<&dyn CallbackSender>,
    ) {
        let annotated = self.state.annotate_failure(command, stderr_captured).await;
        if annotated == stderr_captured {
            return;
        }
        let extra = annotated
            .strip_prefix(stderr_captured)
            .unwrap_or(annotated.as_str())
            .trim()
            .to_string();
        if extra.is_empty() {
            return;
        }
        tracing::info!("Sandbox mechanism annotated the failure: {}", extra);
        if let Some(callback) = callback {
            let message = format!(
                "{extra}\nIf the failure was caused by sandbox restrictions, retry the command with unsandboxed approval."
            );
            if let Err(e) = callback
                .send_event(ExecEvent::SandboxDiagnostic { message })
                .await
            {
                tracing::debug!("Failed to deliver sandbox diagnostic: {}", e);
            }
        }
    }
}

/// Streams one child pipe into the chunk channel until EOF. The task exits
/// on its own when the pipe closes, including after a group kill.
fn spawn_stream_pump(
    reader: Option<impl AsyncReadExt + Unpin + Send + 'static>,
    is_stderr: bool,
    sender: mpsc::Sender<StreamChunk>,
) {
    let Some(mut reader) = reader else {
        return;
    };
    tokio::spawn(async move {
        let mut buffer = [0u8; 4096];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = StreamChunk::Data {
                        bytes: buffer[..n].to_vec(),
                        is_stderr,
                    };
                    if sender.send(chunk).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

async fn wait_optional_cancel(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

async fn wait_optional_sleep(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep.as_mut() {
        Some(fut) => fut.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}

fn append_capped(buffer: &mut String, text: &str) {
    let remaining = STDERR_CAPTURE_LIMIT.saturating_sub(buffer.len());
    if remaining == 0 {
        return;
    }
    if text.len() <= remaining {
        buffer.push_str(text);
    } else {
        // Truncate on a char boundary.
        let mut end = remaining;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        buffer.push_str(&text[..end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_terminal() {
        assert!(!ExecutionStatus::Created.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::TimedOut.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
    }

    #[test]
    fn stderr_capture_respects_the_cap() {
        let mut buffer = String::new();
        append_capped(&mut buffer, &"x".repeat(STDERR_CAPTURE_LIMIT + 10));
        assert_eq!(buffer.len(), STDERR_CAPTURE_LIMIT);
        append_capped(&mut buffer, "more");
        assert_eq!(buffer.len(), STDERR_CAPTURE_LIMIT);
    }

    #[test]
    fn timeout_error_reports_the_limit() {
        let err = ExecError::Timeout {
            limit: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("5s"));
    }
}
