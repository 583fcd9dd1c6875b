//! Tests for policy configuration loading and merging.

use std::io::Write;
use warden_core::SandboxConfig;
use warden_core::utils::logging::init_test_logging;

#[test]
fn load_from_file_reads_a_complete_policy() {
    init_test_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "enabled": true,
            "unsandboxed_commands": ["git status", "npm run *"],
            "filesystem": {{
                "deny_read": ["~/.ssh", "*.pem"],
                "allow_write": ["."],
                "deny_write": [".env"]
            }}
        }}"#
    )
    .unwrap();

    let config = SandboxConfig::load_from_file(file.path()).unwrap();
    assert!(config.enabled);
    assert_eq!(config.unsandboxed_commands.len(), 2);
    assert_eq!(config.filesystem.deny_read, vec!["~/.ssh", "*.pem"]);
    assert_eq!(config.filesystem.allow_write, vec!["."]);
    assert_eq!(config.filesystem.deny_write, vec![".env"]);
}

#[test]
fn absent_fields_default_to_empty_lists() {
    init_test_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"enabled": true}}"#).unwrap();

    let config = SandboxConfig::load_from_file(file.path()).unwrap();
    assert!(config.enabled);
    assert!(config.unsandboxed_commands.is_empty());
    assert!(config.filesystem.deny_read.is_empty());
}

#[test]
fn load_from_file_rejects_malformed_json() {
    init_test_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(SandboxConfig::load_from_file(file.path()).is_err());
}

#[test]
fn load_from_file_reports_missing_files() {
    init_test_logging();
    let dir = tempfile::TempDir::new().unwrap();
    let result = SandboxConfig::load_from_file(&dir.path().join("absent.json"));
    assert!(result.is_err());
}

#[test]
fn merge_layers_field_by_field() {
    init_test_logging();
    let base: SandboxConfig = serde_json::from_str(
        r#"{
            "enabled": true,
            "unsandboxed_commands": ["git status"],
            "filesystem": {"deny_read": ["~/.ssh"], "deny_write": [".env"]}
        }"#,
    )
    .unwrap();
    let overlay: SandboxConfig = serde_json::from_str(
        r#"{
            "unsandboxed_commands": ["cargo build"],
            "filesystem": {"deny_read": ["*.pem"], "allow_write": ["."]}
        }"#,
    )
    .unwrap();

    let merged = base.merge(overlay);
    // Sandboxing stays on when either layer enables it.
    assert!(merged.enabled);
    assert_eq!(merged.unsandboxed_commands, vec!["git status", "cargo build"]);
    assert_eq!(merged.filesystem.deny_read, vec!["~/.ssh", "*.pem"]);
    assert_eq!(merged.filesystem.allow_write, vec!["."]);
    assert_eq!(merged.filesystem.deny_write, vec![".env"]);
}

#[test]
fn merge_of_defaults_is_a_default() {
    init_test_logging();
    let merged = SandboxConfig::default().merge(SandboxConfig::default());
    assert!(!merged.enabled);
    assert!(merged.unsandboxed_commands.is_empty());
}
