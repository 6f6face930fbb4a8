//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - pretty or JSON console output on stderr
//! - JSON log files with rotation
pub mod logger;

pub use logger::{parse_log_level, LoggerImpl};
