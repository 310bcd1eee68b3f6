//! linechat-utils: Common utilities shared across linechat crates
//!
//! This crate provides:
//! - Unified error types ([`ChatError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])

pub mod error;
pub mod logging;

// Re-export main types at crate root for convenience
pub use error::{ChatError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig};
