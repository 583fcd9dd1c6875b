//! # Filesystem Access Policy
//!
//! Read/write permission decisions over the configured pattern lists.
//!
//! Reads use a blocklist posture: everything is allowed unless a `deny_read`
//! pattern matches. Writes use a least-privilege posture: a `deny_write`
//! match refuses unconditionally, and when `allow_write` is non-empty the
//! path must match one of its entries. The decision functions are pure and
//! never error; callers that want a raisable error use the `ensure_*`
//! variants.

use crate::config::FilesystemRules;
use crate::path_match::{matches_path, resolve_candidate};
use std::fmt;
use std::path::{Path, PathBuf};

/// Deny patterns for locations that commonly hold credentials or secrets.
///
/// Advisory: nothing applies this list implicitly. Hosts splice it into
/// `deny_read` (and usually `deny_write`) when building a session policy.
pub const DEFAULT_DENY_READ_PATTERNS: &[&str] = &[
    "~/.ssh",
    "~/.gnupg",
    "~/.aws",
    "~/.kube",
    ".env",
    ".env.*",
    ".npmrc",
    ".netrc",
    ".git-credentials",
    "*.pem",
    "*.key",
    "*.p12",
    "*.pfx",
    "id_rsa*",
    "id_ed25519*",
    "id_ecdsa*",
];

/// Owned copy of [`DEFAULT_DENY_READ_PATTERNS`], ready to splice into rules.
#[must_use]
pub fn default_deny_read_patterns() -> Vec<String> {
    DEFAULT_DENY_READ_PATTERNS
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Which kind of filesystem access a decision concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    Read,
    Write,
}

impl fmt::Display for AccessOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOp::Read => write!(f, "read"),
            AccessOp::Write => write!(f, "write"),
        }
    }
}

/// A path operation refused by policy. Recoverable: the caller may prompt
/// the user for approval and retry outside the policy.
#[derive(Debug, thiserror::Error)]
#[error("{op} access to {path:?} is denied by the {op} policy; request approval to proceed")]
pub struct AccessDenied {
    pub path: PathBuf,
    pub op: AccessOp,
}

/// Returns true when `path` may be read under `rules`.
///
/// An empty `deny_read` list allows every read.
pub fn is_read_allowed(path: &Path, cwd: &Path, rules: &FilesystemRules) -> bool {
    let candidate = resolve_candidate(path, cwd);
    !rules
        .deny_read
        .iter()
        .any(|pattern| matches_path(&candidate, pattern, cwd))
}

/// Returns true when `path` may be written under `rules`.
///
/// Deny wins over allow. With an empty `allow_write` list, writes are only
/// restricted by `deny_write`.
pub fn is_write_allowed(path: &Path, cwd: &Path, rules: &FilesystemRules) -> bool {
    let candidate = resolve_candidate(path, cwd);
    if rules
        .deny_write
        .iter()
        .any(|pattern| matches_path(&candidate, pattern, cwd))
    {
        return false;
    }
    if rules.allow_write.is_empty() {
        return true;
    }
    rules
        .allow_write
        .iter()
        .any(|pattern| matches_path(&candidate, pattern, cwd))
}

/// Raises [`AccessDenied`] when the read is refused.
pub fn ensure_read_allowed(
    path: &Path,
    cwd: &Path,
    rules: &FilesystemRules,
) -> Result<(), AccessDenied> {
    if is_read_allowed(path, cwd, rules) {
        Ok(())
    } else {
        tracing::warn!("Read denied by policy: {:?}", path);
        Err(AccessDenied {
            path: path.to_path_buf(),
            op: AccessOp::Read,
        })
    }
}

/// Raises [`AccessDenied`] when the write is refused.
pub fn ensure_write_allowed(
    path: &Path,
    cwd: &Path,
    rules: &FilesystemRules,
) -> Result<(), AccessDenied> {
    if is_write_allowed(path, cwd, rules) {
        Ok(())
    } else {
        tracing::warn!("Write denied by policy: {:?}", path);
        Err(AccessDenied {
            path: path.to_path_buf(),
            op: AccessOp::Write,
        })
    }
}
