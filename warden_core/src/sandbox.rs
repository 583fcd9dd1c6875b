//! # Sandbox Session State
//!
//! A [`SandboxState`] is the resolved policy for one agent session: whether
//! sandboxing is active, the filesystem rules, and the command bypass
//! patterns. It is built exactly once at session start, shared behind an
//! `Arc`, and never mutated afterwards. Tests construct fresh states freely;
//! there is no process-wide storage.
//!
//! The OS-level isolation mechanism itself (profile compilation, namespace
//! setup) lives outside this crate. It is reached through the
//! [`SandboxMechanism`] trait with two calls: wrapping a raw command line
//! into its sandboxed form before spawn, and annotating captured stderr with
//! violation diagnostics after a failure. [`PassthroughMechanism`] is the
//! no-op implementation used when no mechanism is present and by tests.

use crate::command_policy::is_unsandboxed_command;
use crate::config::SandboxConfig;
use crate::fs_policy;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// External sandbox mechanism collaborator.
#[async_trait]
pub trait SandboxMechanism: Send + Sync {
    /// Transforms a raw command line into its sandbox-wrapped form.
    async fn wrap_command(&self, raw: &str) -> Result<String>;

    /// Augments captured stderr with violation diagnostics, when the
    /// mechanism has any to offer. May return the input unchanged.
    async fn annotate_failure(&self, command: &str, stderr: &str) -> String;
}

/// Mechanism that performs no isolation: commands run as given and stderr is
/// returned untouched.
#[derive(Debug, Default)]
pub struct PassthroughMechanism;

#[async_trait]
impl SandboxMechanism for PassthroughMechanism {
    async fn wrap_command(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }

    async fn annotate_failure(&self, _command: &str, stderr: &str) -> String {
        stderr.to_string()
    }
}

/// Resolved, read-only policy for one agent session.
pub struct SandboxState {
    config: SandboxConfig,
    mechanism: Arc<dyn SandboxMechanism>,
}

impl fmt::Debug for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxState")
            .field("enabled", &self.config.enabled)
            .field(
                "unsandboxed_commands",
                &self.config.unsandboxed_commands.len(),
            )
            .finish_non_exhaustive()
    }
}

impl SandboxState {
    /// Creates the session state from a resolved policy and a mechanism.
    pub fn new(config: SandboxConfig, mechanism: Arc<dyn SandboxMechanism>) -> Self {
        tracing::info!(
            "Sandbox session initialized (enabled: {}, bypass patterns: {}, deny_read: {}, allow_write: {}, deny_write: {})",
            config.enabled,
            config.unsandboxed_commands.len(),
            config.filesystem.deny_read.len(),
            config.filesystem.allow_write.len(),
            config.filesystem.deny_write.len(),
        );
        Self { config, mechanism }
    }

    /// State for a session with sandboxing off entirely.
    pub fn disabled() -> Self {
        Self::new(SandboxConfig::default(), Arc::new(PassthroughMechanism))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Whether `command` should run without sandbox wrapping: always when
    /// sandboxing is off, otherwise when a bypass pattern matches.
    pub fn should_bypass(&self, command: &str) -> bool {
        !self.config.enabled
            || is_unsandboxed_command(command, &self.config.unsandboxed_commands)
    }

    /// Read permission for `path` under this session's filesystem rules.
    pub fn is_read_allowed(&self, path: &Path, cwd: &Path) -> bool {
        fs_policy::is_read_allowed(path, cwd, &self.config.filesystem)
    }

    /// Write permission for `path` under this session's filesystem rules.
    pub fn is_write_allowed(&self, path: &Path, cwd: &Path) -> bool {
        fs_policy::is_write_allowed(path, cwd, &self.config.filesystem)
    }

    /// Obtains the sandbox-wrapped form of `command` from the mechanism.
    pub async fn wrap_command(&self, command: &str) -> Result<String> {
        self.mechanism.wrap_command(command).await
    }

    /// Asks the mechanism to annotate `stderr` with violation diagnostics.
    pub async fn annotate_failure(&self, command: &str, stderr: &str) -> String {
        self.mechanism.annotate_failure(command, stderr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilesystemRules;

    fn state(enabled: bool, patterns: &[&str]) -> SandboxState {
        SandboxState::new(
            SandboxConfig {
                enabled,
                unsandboxed_commands: patterns.iter().map(ToString::to_string).collect(),
                filesystem: FilesystemRules::default(),
            },
            Arc::new(PassthroughMechanism),
        )
    }

    #[test]
    fn disabled_sandbox_bypasses_everything() {
        let state = state(false, &[]);
        assert!(state.should_bypass("rm -rf /tmp/scratch"));
    }

    #[test]
    fn enabled_sandbox_bypasses_only_matching_commands() {
        let state = state(true, &["git status", "npm run *"]);
        assert!(state.should_bypass("git status"));
        assert!(state.should_bypass("npm run build"));
        assert!(!state.should_bypass("git push"));
        assert!(!state.should_bypass("git status && rm -rf /"));
    }

    #[tokio::test]
    async fn passthrough_mechanism_is_identity() {
        let mechanism = PassthroughMechanism;
        assert_eq!(mechanism.wrap_command("ls -l").await.unwrap(), "ls -l");
        assert_eq!(mechanism.annotate_failure("ls", "boom").await, "boom");
    }
}
