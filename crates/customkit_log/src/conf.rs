//! Logging constants and default preset factories.

use crate::spec::SpecLoggerOptions;

/// Default log file shared by every named logger.
pub const C_PATH_LOG_FILE_DEFAULT: &str = "./Custom-Python_Tools.log";
/// `chrono` format of the leading timestamp of each log line.
pub const C_FMT_LOG_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S,%3f";
/// Field carrying the façade level name on emitted events.
pub(crate) const C_FIELD_SEVERITY: &str = "severity";

/// Build default logger options.
pub fn derive_default_logger_options() -> SpecLoggerOptions {
    SpecLoggerOptions::default()
}
