//! Logging infrastructure for linechat
//!
//! Provides unified logging setup using the tracing ecosystem. Both the
//! server daemon and the terminal client log to stderr so chat output on
//! stdout stays clean.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::{ChatError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "info", "debug", "linechat=debug,tokio=warn")
    pub filter: String,
    /// Include file/line in logs
    pub file_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("LINECHAT_LOG").unwrap_or_else(|_| "info".into()),
            file_line: false,
        }
    }
}

impl LogConfig {
    /// Create config for the terminal client (quiet by default)
    pub fn client() -> Self {
        Self {
            filter: std::env::var("LINECHAT_LOG").unwrap_or_else(|_| "warn".into()),
            file_line: false,
        }
    }

    /// Create config for the server daemon
    pub fn server() -> Self {
        Self {
            filter: std::env::var("LINECHAT_LOG").unwrap_or_else(|_| "info".into()),
            file_line: false,
        }
    }

    /// Create config for development (verbose)
    pub fn development() -> Self {
        Self {
            filter: "debug".into(),
            file_line: true,
        }
    }
}

/// Initialize logging with default configuration
///
/// Uses the LINECHAT_LOG env var for the filter, defaults to "info".
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ChatError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ChatError::internal(format!("Failed to init logging: {}", e)))?;

    Ok(())
}
