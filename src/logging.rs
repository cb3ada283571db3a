//! Logging configuration and initialization
//!
//! Two layers: a compact console log filtered from the environment, and an
//! append-only `error.log` that records every warning and error with a
//! timestamp.

use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{fmt, prelude::*};

pub const ERROR_LOG_FILE: &str = "error.log";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory that receives `error.log`
    pub log_dir: PathBuf,
    /// Console level when neither `THERMVIEW_LOG` nor `RUST_LOG` is set
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("debug"),
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn error_log_path(&self) -> PathBuf {
        self.log_dir.join(ERROR_LOG_FILE)
    }
}

/// Console filter: `THERMVIEW_LOG`, then `RUST_LOG`, then `default_level`
fn console_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("THERMVIEW_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the program.
pub fn init_logging(config: &LogConfig) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    ensure_dir(&config.log_dir)?;
    let appender = tracing_appender::rolling::never(&config.log_dir, ERROR_LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(console_filter(&config.default_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        error_log = %config.error_log_path().display(),
        "Logging initialized"
    );

    Ok(guard)
}
