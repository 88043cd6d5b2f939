//! Tracing setup shared by the `ragline` server and `ragline-cli`.
//!
//! Engine events (ingestions, answers, guardrail hits, store commits) are printed to stdout
//! without targets and copied to a log file with targets and no ANSI colours. Set
//! `RAGLINE_LOG_FILE` to choose the file; the default is `logs/ragline.log` under the working
//! directory; missing parent directories are created. The non-blocking writer's guard is parked
//! in a static so the background writer lives as long as the process.
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`. Calling this more than once is a
/// no-op after the first successful installation.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let installed = if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).try_init()
    } else {
        registry.try_init()
    };

    if let Err(err) = installed {
        eprintln!("Tracing subscriber already installed: {err}");
    }
}

/// Environment variable overriding the log file path.
pub const LOG_FILE_ENV: &str = "RAGLINE_LOG_FILE";

const DEFAULT_LOG_FILE: &str = "logs/ragline.log";

/// Resolve the log file path from an optional override.
fn log_file_path(override_path: Option<OsString>) -> PathBuf {
    override_path
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Open the log file for appending and wrap it in a non-blocking writer.
///
/// Returns `None` (stdout only) when the directory or file cannot be created.
fn configure_file_writer() -> Option<NonBlocking> {
    let path = log_file_path(std::env::var_os(LOG_FILE_ENV));
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }

    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
