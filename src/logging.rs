//! Logging and tracing initialization.
//!
//! The library only emits `tracing` events. Binaries and demos call
//! [`init_logging`] once at startup to print them.
//!
//! ```rust,no_run
//! use siphon::logging::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! # fn main() -> siphon::Result<()> {
//! init_logging(&LogConfig::new(Level::INFO))?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for the `siphon` target when `RUST_LOG` is unset.
    pub level: Level,
    /// Write JSON lines to this file instead of compact text to stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LogConfig {
    /// Log at `level` to stderr.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            log_file: None,
        }
    }

    /// Log to `path` instead of stderr.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// Initialize structured logging based on configuration.
///
/// `RUST_LOG` takes precedence over [`LogConfig::level`]. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = env_filter(config.level)?;

    match config.log_file {
        Some(ref log_path) => init_file_logging(log_path, env_filter),
        None => init_stderr_logging(env_filter),
    }
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("siphon={}", level)))
        .map_err(|e| Error::Internal(format!("Failed to create log filter: {}", e)))
}

/// Initialize logging to stderr.
fn init_stderr_logging(env_filter: EnvFilter) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install logger: {}", e)))
}

/// Initialize logging to a file.
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)?;

    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_with_file() {
        let config = LogConfig::new(Level::DEBUG).with_file("/tmp/siphon.log");
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/siphon.log")));
    }

    #[test]
    fn test_filter_for_level() {
        assert!(env_filter(Level::TRACE).is_ok());
    }
}
