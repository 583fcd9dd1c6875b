//! # Warden Core
//!
//! Warden is the policy-enforcement layer that stands between an automated
//! agent and the machine it runs on. Before any OS-level action happens, it
//! answers two questions: may this filesystem path be read or written, and
//! may this shell command run without sandbox isolation. For commands that
//! are allowed to run, it supervises the whole child lifecycle: spawn,
//! incremental output streaming, timeout enforcement, cooperative
//! cancellation, and process-group cleanup.
//!
//! ## Architecture
//!
//! Decisions and execution are deliberately separated. The decision side
//! (`path_match`, `fs_policy`, `command_policy`) is pure: functions take a
//! path or command plus the configured rules and return booleans, never
//! errors. The execution side (`executor`) is where failures live, with a
//! small taxonomy covering missing directories, spawn failures, timeouts,
//! and cancellation.
//!
//! The OS isolation mechanism (Landlock profiles, Seatbelt policies, or
//! anything else) is not implemented here. It is an external collaborator
//! behind the [`sandbox::SandboxMechanism`] trait: Warden asks it to wrap a
//! command line before spawn and to explain violations after a failure.
//!
//! ## Session lifecycle
//!
//! A host builds one [`sandbox::SandboxState`] per agent session from a
//! [`config::SandboxConfig`], shares it behind an `Arc`, and hands it to a
//! [`executor::ShellExecutor`]. The state is written once and read by every
//! tool-wrapping decision until the session ends.
//!
//! ## Modules
//!
//! - **`config`**: typed policy configuration with a field-by-field merge.
//! - **`path_match`**: pattern-to-path matching with tilde and relative
//!   expansion, basename mode, and directory-prefix semantics.
//! - **`fs_policy`**: read/write permission decisions over deny/allow lists.
//! - **`command_policy`**: shell-aware tokenization and bypass matching.
//! - **`sandbox`**: per-session policy state and the mechanism trait.
//! - **`executor`**: supervised command execution.
//! - **`callback`**: incremental event delivery to the host.

pub mod callback;
pub mod command_policy;
pub mod config;
pub mod executor;
pub mod fs_policy;
pub mod path_match;
mod process_group;
pub mod sandbox;
pub mod utils;

// Re-export the main types for easier use.
pub use callback::{CallbackSender, ChannelCallbackSender, ExecEvent, LoggingCallbackSender};
pub use command_policy::{CommandTokens, is_unsandboxed_command, tokenize};
pub use config::{FilesystemRules, SandboxConfig};
pub use executor::{ExecError, ExecOptions, ExecutionStatus, ShellExecutor};
pub use fs_policy::{AccessDenied, AccessOp, is_read_allowed, is_write_allowed};
pub use path_match::matches_path;
pub use sandbox::{PassthroughMechanism, SandboxMechanism, SandboxState};
