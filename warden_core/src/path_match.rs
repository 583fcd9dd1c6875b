//! # Path Pattern Matching
//!
//! Decides whether a filesystem path falls under a configured path pattern.
//! Patterns come in a handful of shapes:
//!
//! - absolute paths (`/etc/passwd`)
//! - home-relative paths (`~/.ssh`, `~` alone)
//! - cwd-relative paths (`.`, `./build`, `src/generated`)
//! - bare basenames with optional wildcards (`.env`, `*.pem`, `id_rsa?`)
//! - wildcard-bearing paths (`~/work/*.log`)
//!
//! Two invariants shape the semantics. A pattern without wildcards denotes
//! the named path and everything nested beneath it, compared segment by
//! segment rather than by raw string prefix. A pattern without a path
//! separator matches by basename at any depth, which is what lets a single
//! `*.pem` entry deny key files wherever they live.

use globset::GlobBuilder;
use std::path::{Component, Path, PathBuf};

/// Returns true when `path` falls under `pattern`.
///
/// `path` should be absolute; callers resolving user input first go through
/// [`resolve_candidate`]. `cwd` anchors relative patterns. Matching is
/// case-sensitive, and `*`/`?` never cross a path separator. A pattern that
/// fails to compile as a glob matches nothing.
pub fn matches_path(path: &Path, pattern: &str, cwd: &Path) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }

    match expand_pattern(pattern, cwd) {
        ExpandedPattern::Basename(name) => {
            if has_wildcard(&name) {
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    return false;
                };
                glob_matches(&name, file_name)
            } else {
                // Any segment equal to the name covers both the file itself
                // and anything nested beneath a directory of that name.
                path.components().any(|c| match c {
                    Component::Normal(segment) => segment.to_str() == Some(name.as_str()),
                    _ => false,
                })
            }
        }
        ExpandedPattern::Path(resolved) => {
            if has_wildcard(&resolved.to_string_lossy()) {
                glob_matches(&resolved.to_string_lossy(), &path.to_string_lossy())
            } else {
                path.starts_with(&resolved)
            }
        }
    }
}

/// Resolves a candidate path to absolute form: `~` expansion, then `cwd` for
/// anything still relative.
pub fn resolve_candidate(path: &Path, cwd: &Path) -> PathBuf {
    if let Some(s) = path.to_str()
        && let Some(expanded) = expand_tilde(s)
    {
        return expanded;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

enum ExpandedPattern {
    /// No separator after expansion: compare against basenames.
    Basename(String),
    /// Anchored path, absolute after expansion.
    Path(PathBuf),
}

fn expand_pattern(pattern: &str, cwd: &Path) -> ExpandedPattern {
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() {
        // The pattern was just "/": the filesystem root.
        return ExpandedPattern::Path(PathBuf::from("/"));
    }

    if let Some(expanded) = expand_tilde(pattern) {
        return ExpandedPattern::Path(expanded);
    }
    if pattern == "." {
        return ExpandedPattern::Path(cwd.to_path_buf());
    }
    if let Some(rest) = pattern.strip_prefix("./") {
        return ExpandedPattern::Path(cwd.join(rest));
    }
    if pattern.starts_with('/') {
        return ExpandedPattern::Path(PathBuf::from(pattern));
    }
    if pattern.contains('/') {
        return ExpandedPattern::Path(cwd.join(pattern));
    }
    ExpandedPattern::Basename(pattern.to_string())
}

/// Expands `~` and `~/...` against the current home directory. Returns None
/// for anything else, including `~user` forms, which stay literal.
fn expand_tilde(input: &str) -> Option<PathBuf> {
    if input == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    None
}

fn has_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let Ok(glob) = GlobBuilder::new(pattern).literal_separator(true).build() else {
        tracing::debug!("Ignoring unparseable path pattern: {}", pattern);
        return false;
    };
    glob.compile_matcher().is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cwd() -> PathBuf {
        PathBuf::from("/work/project")
    }

    #[test]
    fn non_wildcard_pattern_covers_nested_paths() {
        assert!(matches_path(Path::new("/etc/nginx"), "/etc/nginx", &cwd()));
        assert!(matches_path(
            Path::new("/etc/nginx/conf.d/site.conf"),
            "/etc/nginx",
            &cwd()
        ));
    }

    #[test]
    fn prefix_matching_is_segment_aware() {
        assert!(!matches_path(
            Path::new("/etc/nginx-backup"),
            "/etc/nginx",
            &cwd()
        ));
    }

    #[test]
    fn dot_pattern_resolves_to_cwd() {
        assert!(matches_path(Path::new("/work/project/src/a.rs"), ".", &cwd()));
        assert!(!matches_path(Path::new("/work/other"), ".", &cwd()));
    }

    #[test]
    fn dot_slash_pattern_resolves_under_cwd() {
        assert!(matches_path(
            Path::new("/work/project/build/out.o"),
            "./build",
            &cwd()
        ));
        assert!(!matches_path(Path::new("/work/project/src"), "./build", &cwd()));
    }

    #[test]
    fn relative_pattern_with_separator_resolves_under_cwd() {
        assert!(matches_path(
            Path::new("/work/project/target/debug/app"),
            "target/debug",
            &cwd()
        ));
    }

    #[test]
    fn basename_pattern_matches_at_any_depth() {
        assert!(matches_path(Path::new("/a/b/.env"), ".env", &cwd()));
        assert!(matches_path(Path::new("/.env"), ".env", &cwd()));
        assert!(!matches_path(Path::new("/a/b/.env.local"), ".env", &cwd()));
    }

    #[test]
    fn basename_pattern_covers_contents_of_matching_directory() {
        assert!(matches_path(
            Path::new("/repo/node_modules/pkg/index.js"),
            "node_modules",
            &cwd()
        ));
    }

    #[test]
    fn wildcard_basename_matches_final_segment_only() {
        assert!(matches_path(Path::new("/keys/server.pem"), "*.pem", &cwd()));
        assert!(matches_path(Path::new("/deep/ly/nested/ca.pem"), "*.pem", &cwd()));
        assert!(!matches_path(Path::new("/keys/server.pem.bak"), "*.pem", &cwd()));
    }

    #[test]
    fn question_mark_matches_exactly_one_character() {
        assert!(matches_path(Path::new("/h/id_rsa1"), "id_rsa?", &cwd()));
        assert!(!matches_path(Path::new("/h/id_rsa"), "id_rsa?", &cwd()));
        assert!(!matches_path(Path::new("/h/id_rsa12"), "id_rsa?", &cwd()));
    }

    #[test]
    fn wildcard_in_anchored_pattern_does_not_cross_separators() {
        assert!(matches_path(
            Path::new("/var/log/app.log"),
            "/var/log/*.log",
            &cwd()
        ));
        assert!(!matches_path(
            Path::new("/var/log/archive/app.log"),
            "/var/log/*.log",
            &cwd()
        ));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!matches_path(Path::new("/keys/server.PEM"), "*.pem", &cwd()));
    }

    #[test]
    fn tilde_pattern_matches_home_and_below() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert!(matches_path(&home, "~", &cwd()));
        assert!(matches_path(&home.join("notes/todo.txt"), "~", &cwd()));
        assert!(matches_path(&home.join(".ssh/id_rsa"), "~/.ssh", &cwd()));
        assert!(!matches_path(&home.join(".ssh-backup"), "~/.ssh", &cwd()));
    }

    #[test]
    fn invalid_glob_matches_nothing() {
        assert!(!matches_path(Path::new("/a/b"), "[invalid", &cwd()));
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        assert!(!matches_path(Path::new("/a/b"), "", &cwd()));
        assert!(!matches_path(Path::new("/a/b"), "   ", &cwd()));
    }

    #[test]
    fn resolve_candidate_joins_relative_input() {
        assert_eq!(
            resolve_candidate(Path::new("src/main.rs"), &cwd()),
            PathBuf::from("/work/project/src/main.rs")
        );
        assert_eq!(
            resolve_candidate(Path::new("/abs/path"), &cwd()),
            PathBuf::from("/abs/path")
        );
    }

    #[test]
    fn resolve_candidate_expands_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(
            resolve_candidate(Path::new("~/notes.txt"), &cwd()),
            home.join("notes.txt")
        );
    }
}
