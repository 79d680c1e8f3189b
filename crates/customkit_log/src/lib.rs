//! `customkit_log` v1:
//! Named logger registry with file + console sinks.
//!
//! Architecture:
//! - `conf`   : constants and default presets
//! - `spec`   : levels/options/errors
//! - `logger` : registry, sinks and line formatter
pub mod conf;
pub mod logger;
pub mod spec;

pub use conf::{C_FMT_LOG_TIMESTAMP, C_PATH_LOG_FILE_DEFAULT};
pub use logger::{Logger, get_logger, get_logger_with_options};
pub use spec::{EnumLogLevel, LogError, SpecLoggerOptions};
