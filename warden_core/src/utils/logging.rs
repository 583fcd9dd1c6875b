//! # Logging Initialization
//!
//! One-time setup for the `tracing` subscriber. Call
//! `init_logging(level, log_to_file)` at the start of the host process; the
//! internal `Once` makes repeated calls harmless, which matters for tests
//! that each try to initialize.
//!
//! Verbosity comes from `RUST_LOG` when set; otherwise the passed level
//! applies globally with `warden_core` raised to `debug`. With
//! `log_to_file = true`, output goes to a daily-rolling file in the
//! user-specific cache directory with ANSI colors disabled; if that
//! directory cannot be created the logger falls back to stderr. With
//! `log_to_file = false`, output goes to stderr with colors enabled.

use anyhow::Result;
use directories::ProjectDirs;
use std::{io::stderr, sync::Once};
use tracing_subscriber::{EnvFilter, fmt::layer, prelude::*};

static INIT: Once = Once::new();

/// Logging setup for tests: everything to stderr at trace level.
pub fn init_test_logging() {
    init_logging("trace", false).expect("Failed to initialize test logging");
}

/// Initializes the global tracing subscriber.
///
/// # Errors
///
/// Currently infallible; the `Result` return leaves room for configuration
/// validation without breaking callers.
pub fn init_logging(log_level: &str, log_to_file: bool) -> Result<()> {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},warden_core=debug")));

        if log_to_file && let Some(file_appender) = try_file_appender() {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer().with_writer(non_blocking).with_ansi(false))
                .init();
            // Leak the guard so buffered lines are flushed at process exit.
            Box::leak(Box::new(guard));
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer().with_writer(stderr).with_ansi(true))
                .init();
        }
    });

    Ok(())
}

/// Builds the daily-rolling file appender in the project cache directory,
/// or None when the directory is unavailable (sandboxed or unusual
/// environments), in which case the caller falls back to stderr.
fn try_file_appender() -> Option<tracing_appender::rolling::RollingFileAppender> {
    let proj_dirs = ProjectDirs::from("dev", "Warden", "warden")?;
    let log_dir = proj_dirs.cache_dir();
    std::fs::create_dir_all(log_dir).ok()?;
    std::panic::catch_unwind(|| tracing_appender::rolling::daily(log_dir, "warden.log")).ok()
}
