//! Logger levels, options and error types.

use std::fmt;
use std::path::PathBuf;

use crate::conf::C_PATH_LOG_FILE_DEFAULT;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Message severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EnumLogLevel {
    /// Diagnostic detail.
    #[default]
    Debug,
    /// Normal progress messages.
    Info,
    /// Something unexpected that the caller recovered from.
    Warning,
    /// An operation failed.
    Error,
    /// The process cannot continue the current task.
    Critical,
}

impl EnumLogLevel {
    /// Upper-case level name written in every log line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for EnumLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `get_logger_with_options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLoggerOptions {
    /// Append-mode log file.
    pub path_file_log: PathBuf,
    /// Minimum severity written to the sinks.
    pub level: EnumLogLevel,
    /// Mirror every line to stderr.
    pub if_console: bool,
}

impl Default for SpecLoggerOptions {
    fn default() -> Self {
        Self {
            path_file_log: PathBuf::from(C_PATH_LOG_FILE_DEFAULT),
            level: EnumLogLevel::Debug,
            if_console: true,
        }
    }
}

/// Logger setup failures.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log file could not be opened for appending.
    #[error("Failed to open log file {}: {source}", .path.display())]
    OpenFile {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_order_from_debug_to_critical() {
        assert!(EnumLogLevel::Debug < EnumLogLevel::Info);
        assert!(EnumLogLevel::Info < EnumLogLevel::Warning);
        assert!(EnumLogLevel::Warning < EnumLogLevel::Error);
        assert!(EnumLogLevel::Error < EnumLogLevel::Critical);
        assert_eq!(EnumLogLevel::Warning.to_string(), "WARNING");
    }
}
