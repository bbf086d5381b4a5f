//! Tracing subscriber setup.
//!
//! Headless runs log to stderr. The terminal UI owns the screen, so it logs
//! to a file: the configured `log_file`, or a daily file in the cache dir.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::APP_NAME;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// A fixed file.
    File(PathBuf),
    /// `{dir}/tbdash.log.YYYY-MM-DD`
    DailyIn(PathBuf),
}

impl LogTarget {
    /// File target for the terminal UI; None when no cache dir is known.
    pub fn for_tui(log_file: Option<&Path>) -> Option<Self> {
        match log_file {
            Some(path) => Some(Self::File(path.to_path_buf())),
            None => default_log_dir().map(Self::DailyIn),
        }
    }
}

/// Flushes buffered file logs when dropped; keep it alive until exit.
pub struct LogGuard(#[allow(dead_code)] Option<WorkerGuard>);

impl LogGuard {
    /// No subscriber installed; logs are discarded.
    pub fn disabled() -> Self {
        Self(None)
    }
}

pub fn default_log_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(APP_NAME))
}

/// `RUST_LOG` when set, else info (or debug) for this crate.
pub fn env_filter(debug: bool) -> EnvFilter {
    let default = if debug {
        format!("{}=debug", APP_NAME)
    } else {
        format!("{}=info", APP_NAME)
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_logging(target: &LogTarget, debug: bool) -> Result<LogGuard> {
    let filter = env_filter(debug);
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init()
                .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
            Ok(LogGuard(None))
        }
        LogTarget::File(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            init_file(filter, appender)
        }
        LogTarget::DailyIn(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", APP_NAME));
            init_file(filter, appender)
        }
    }
}

fn init_file(filter: EnvFilter, appender: tracing_appender::rolling::RollingFileAppender) -> Result<LogGuard> {
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
    Ok(LogGuard(Some(guard)))
}
