//! # Execution Event Callbacks
//!
//! Incremental delivery of supervised-execution events: the executor pushes
//! an event when the child starts, for every output chunk as it arrives, and
//! for sandbox diagnostics discovered after a failure. Implement
//! [`CallbackSender`] to consume them, or use the channel-backed and
//! logging-backed senders provided here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during one supervised execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExecEvent {
    /// The child process has been spawned.
    Started {
        command: String,
        working_directory: String,
    },
    /// A chunk of child output, delivered as it arrives.
    Output { chunk: String, is_stderr: bool },
    /// Diagnostics the sandbox mechanism added beyond the raw stderr,
    /// pointing the caller at an unsandboxed retry.
    SandboxDiagnostic { message: String },
}

/// Errors from delivering an event to a callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("callback channel closed")]
    ChannelClosed,
    #[error("failed to deliver event: {0}")]
    SendFailed(String),
}

/// Receiver side of the execution event stream.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn send_event(&self, event: ExecEvent) -> Result<(), CallbackError>;
}

/// Forwards events into a tokio mpsc channel.
pub struct ChannelCallbackSender {
    sender: mpsc::Sender<ExecEvent>,
}

impl ChannelCallbackSender {
    pub fn new(sender: mpsc::Sender<ExecEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl CallbackSender for ChannelCallbackSender {
    async fn send_event(&self, event: ExecEvent) -> Result<(), CallbackError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| CallbackError::ChannelClosed)
    }
}

/// Writes events to the tracing log. Useful for debugging and as a sink
/// when no consumer cares about the stream.
pub struct LoggingCallbackSender {
    label: String,
}

impl LoggingCallbackSender {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl CallbackSender for LoggingCallbackSender {
    async fn send_event(&self, event: ExecEvent) -> Result<(), CallbackError> {
        match &event {
            ExecEvent::Started {
                command,
                working_directory,
            } => {
                tracing::info!("[{}] started: {} (in {})", self.label, command, working_directory);
            }
            ExecEvent::Output { chunk, is_stderr } => {
                let stream = if *is_stderr { "stderr" } else { "stdout" };
                tracing::debug!("[{}] {}: {}", self.label, stream, chunk.trim_end());
            }
            ExecEvent::SandboxDiagnostic { message } => {
                tracing::warn!("[{}] sandbox diagnostic: {}", self.label, message);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sender_forwards_events() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = ChannelCallbackSender::new(tx);
        sender
            .send_event(ExecEvent::Output {
                chunk: "hello".to_string(),
                is_stderr: false,
            })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ExecEvent::Output { chunk, is_stderr } => {
                assert_eq!(chunk, "hello");
                assert!(!is_stderr);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn channel_sender_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = ChannelCallbackSender::new(tx);
        let result = sender
            .send_event(ExecEvent::SandboxDiagnostic {
                message: "gone".to_string(),
            })
            .await;
        assert!(matches!(result, Err(CallbackError::ChannelClosed)));
    }
}
