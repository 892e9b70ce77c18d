// src/logging.rs
//! Tracing setup: a console layer (compact, or JSON lines) plus a rotating
//! debug-level log file written off the hot path.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

pub const LOG_FILE_PREFIX: &str = "weibo_crawler";
/// Rotated files kept on disk; older ones are pruned.
pub const MAX_LOG_FILES: usize = 5;

const CONSOLE_DIRECTIVES: &str = "weibo_digest=info,digest=info,notify=info,source=info,warn";
const FILE_DIRECTIVES: &str =
    "weibo_digest=debug,digest=debug,timeparse=debug,notify=debug,source=debug,info";

/// Daily-rotated `weibo_crawler.<date>.log` files under `dir`.
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log dir {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("opening log file in {}", dir.display()))
}

/// Install the global subscriber. Console honours `RUST_LOG`; the file always
/// gets debug for the crate's targets. Keep the guard alive until exit or
/// buffered file lines are lost.
pub fn init(log_dir: &Path, json: bool) -> Result<WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(CONSOLE_DIRECTIVES));
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().with_filter(console_filter).boxed()
    } else {
        fmt::layer().compact().with_filter(console_filter).boxed()
    };

    let (writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);
    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new(FILE_DIRECTIVES));

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(guard)
}
