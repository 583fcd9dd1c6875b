//! # Policy Configuration
//!
//! This module defines the typed configuration consumed by the sandbox
//! session. Policy files are plain JSON and deserialize into a small, fully
//! enumerable set of options: whether sandboxing is enabled, which commands
//! may run unsandboxed, and which filesystem paths may be read or written.
//!
//! ## Core Data Structures
//!
//! - **`SandboxConfig`**: The complete policy for one agent session. Every
//!   field has a defined default, so an empty document (`{}`) is a valid,
//!   maximally permissive policy with sandboxing disabled.
//!
//! - **`FilesystemRules`**: The three pattern lists that drive path access
//!   decisions. Reads are deny-list only; writes carry both a deny list and
//!   an optional allow list.
//!
//! ## Layering
//!
//! Configuration can come from more than one place (a user-level file plus a
//! project-level file, for example). `SandboxConfig::merge` combines two
//! layers field by field with documented, enumerable effects. There is no
//! generic deep-merge over untyped data.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete sandbox policy for a single agent session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct SandboxConfig {
    /// Whether sandboxing is active for this session.
    pub enabled: bool,
    /// Command patterns permitted to run without sandbox wrapping.
    ///
    /// Each entry is either an exact tokenized command (`"git status"`) or a
    /// prefix pattern whose final token is a bare `*` (`"npm run *"`).
    pub unsandboxed_commands: Vec<String>,
    /// Filesystem access rules.
    pub filesystem: FilesystemRules,
}

/// Path pattern lists controlling filesystem access.
///
/// All lists default to empty. An empty `deny_read` permits every read; an
/// empty `allow_write` places no allow-list restriction on writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct FilesystemRules {
    /// Paths that must never be read.
    pub deny_read: Vec<String>,
    /// Paths writes are restricted to, when non-empty.
    pub allow_write: Vec<String>,
    /// Paths that must never be written. Deny wins over allow.
    pub deny_write: Vec<String>,
}

impl SandboxConfig {
    /// Loads a policy from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {:?}", path))?;
        let config: SandboxConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse policy file {:?}", path))?;
        Ok(config)
    }

    /// Layers `overlay` on top of `self` and returns the combined policy.
    ///
    /// The merge is pure and total, with one documented effect per field:
    /// - `enabled`: true if either layer enables sandboxing.
    /// - `unsandboxed_commands`: concatenation, base entries first. Order
    ///   does not affect matching, so duplicates are harmless.
    /// - `filesystem.*`: concatenation per list, base entries first.
    #[must_use]
    pub fn merge(mut self, overlay: SandboxConfig) -> SandboxConfig {
        self.enabled = self.enabled || overlay.enabled;
        self.unsandboxed_commands
            .extend(overlay.unsandboxed_commands);
        self.filesystem
            .deny_read
            .extend(overlay.filesystem.deny_read);
        self.filesystem
            .allow_write
            .extend(overlay.filesystem.allow_write);
        self.filesystem
            .deny_write
            .extend(overlay.filesystem.deny_write);
        self
    }
}
