//! # Logging Setup
//!
//! Installs the global `tracing` subscriber: a console layer on stderr (stdout
//! carries process output) and an optional plain-text session log file.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::config::LoggingConfig;

/// `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initializes tracing. Keep the returned guard alive for the whole run or
/// buffered file output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &config.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {file}"))?;

            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            // Each run starts a fresh session log.
            let _ = std::fs::remove_file(path);

            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
