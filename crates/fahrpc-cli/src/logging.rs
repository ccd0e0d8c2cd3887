use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use fahrpc_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the file writer flushing until dropped at process exit.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
    pub file: Option<PathBuf>,
}

/// Console output plus an optional daily rolling file under `dir`.
/// `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig, dir: &Path) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log filter {:?}", config.level))?;

    let (file_layer, guard, file) = if config.file_enabled {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, &config.file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(guard), Some(dir.join(&config.file_name)))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;

    Ok(LogGuard { _file: guard, file })
}
