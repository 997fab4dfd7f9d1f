//! Tracing setup for indexing runs.
//!
//! Events go to stdout through a compact formatter and to an append-mode log
//! file behind a non-blocking writer, so slow disks never stall the pipeline.
//! The file lives at `logs/docdex.log` unless `DOCDEX_LOG_FILE` points it
//! elsewhere.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering and defaults to `info`. The worker guard for
/// the optional file writer is parked in a process-wide static so buffered
/// events survive until exit.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();
    let base = tracing_subscriber::registry().with(filter).with(stdout);

    match file_writer() {
        Some(writer) => {
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            base.with(file).init();
        }
        None => base.init(),
    }
}

/// Non-blocking writer for the log file, or `None` when it cannot be opened.
///
/// `DOCDEX_LOG_FILE` overrides the default `logs/docdex.log` location.
fn file_writer() -> Option<NonBlocking> {
    let (writer, guard) = match std::env::var("DOCDEX_LOG_FILE") {
        Ok(path) => {
            let opened = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path);
            match opened {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {path}: {err}");
                    return None;
                }
            }
        }
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            let appender = tracing_appender::rolling::never("logs", "docdex.log");
            tracing_appender::non_blocking(appender)
        }
    };
    let _ = FILE_GUARD.set(guard);
    Some(writer)
}
