//! src/logging.rs
//! ============================================================================
//! # Tracing Bootstrap
//!
//! File-based structured logging with optional stderr mirroring. The returned
//! guard must be held for the lifetime of the application or buffered log
//! lines are lost on shutdown.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub rotation: LogRotation,
    /// Mirror log output to stderr as well as the log file.
    pub log_to_stderr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("filevault"),
            log_level: CompactString::const_new("info"),
            rotation: LogRotation::Daily,
            log_to_stderr: false,
        }
    }
}

pub struct Logger;

impl Logger {
    /// Install the global subscriber. `RUST_LOG` takes precedence over the
    /// configured level when set.
    pub fn init(config: &LoggerConfig) -> anyhow::Result<WorkerGuard> {
        let rotation: Rotation = match config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        };

        let appender =
            RollingFileAppender::new(rotation, &config.log_dir, config.log_file_prefix.as_str());
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let filter: EnvFilter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true);

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);

        if config.log_to_stderr {
            registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()?;
        } else {
            registry.try_init()?;
        }

        Ok(guard)
    }
}
