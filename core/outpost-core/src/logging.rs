//! Tracing setup shared by both binaries.
//!
//! Console output always; the agent's log file is appended through a
//! non-blocking `tracing-appender` writer once the configuration says where it
//! lives. Hold the returned guard until the process exits or buffered lines
//! are lost.

use std::env;
use std::path::Path;

use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEBUG_ENV: &str = "OUTPOST_DEBUG_LOG";

fn build_filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Console-only logging, used when the configuration could not be loaded.
pub fn init_console() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Console plus append-only file logging at `log_path`.
///
/// Falls back to console-only output when the log directory cannot be created.
pub fn init_with_file(log_path: &Path) -> Option<WorkerGuard> {
    let mut guard = None;
    let file_layer = match open_file_writer(log_path) {
        Ok((writer, worker_guard)) => {
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(build_filter()),
            )
        }
        Err(err) => {
            eprintln!(
                "Warning: failed to open log file {}: {}",
                log_path.display(),
                err
            );
            None
        }
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(build_filter());

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}

fn open_file_writer(
    log_path: &Path,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = log_path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no file name")
    })?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
