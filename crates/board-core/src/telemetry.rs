//! Logging setup.
//!
//! Installs a `tracing` subscriber with an `EnvFilter` (`BOARD_LOG` wins over
//! the config filter) and a fmt layer writing to stderr or, when configured,
//! to a log file through a non-blocking writer.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

const LOG_ENV_VAR: &str = "BOARD_LOG";
const DEFAULT_FILTER: &str = "info";

/// Keeps the background log writer alive. Drop it last.
pub struct TelemetryGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error if the log file cannot be prepared or a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<TelemetryGuard> {
    let filter = build_filter(
        std::env::var(LOG_ENV_VAR).ok().as_deref(),
        config.filter.as_deref(),
    );

    let (writer, guard) = match &config.file {
        Some(path) => {
            let (dir, file_name) = split_log_path(path)?;
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(config.file.is_none()),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(TelemetryGuard { _guard: guard })
}

fn build_filter(env_directive: Option<&str>, config_directive: Option<&str>) -> EnvFilter {
    let directive = [env_directive, config_directive]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|directive| !directive.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    EnvFilter::new(directive)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, OsString)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", path.display()))?
        .to_os_string();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok((dir, file_name))
}
