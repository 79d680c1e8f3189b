//! Named loggers backed by per-logger `tracing` dispatchers.
//!
//! Every [`Logger`] owns its own dispatcher (file layer + optional stderr
//! layer) so several named loggers can write to different files inside one
//! process without installing a global subscriber.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::conf::{C_FIELD_SEVERITY, C_FMT_LOG_TIMESTAMP};
use crate::spec::{EnumLogLevel, LogError, SpecLoggerOptions};

static DICT_LOGGERS: OnceLock<Mutex<BTreeMap<String, Arc<Logger>>>> = OnceLock::new();

////////////////////////////////////////////////////////////////////////////////
// #region Registry

/// Return the logger registered under `name`, creating it on first use.
///
/// The registry holds at most one logger per name: later calls return the
/// same instance and never attach extra sinks, so lines are not duplicated.
/// `path_file_log` and `level` only apply to the call that creates it.
pub fn get_logger(
    name: &str,
    path_file_log: impl AsRef<Path>,
    level: EnumLogLevel,
) -> Result<Arc<Logger>, LogError> {
    get_logger_with_options(
        name,
        &SpecLoggerOptions {
            path_file_log: path_file_log.as_ref().to_path_buf(),
            level,
            ..Default::default()
        },
    )
}

/// Options-based variant of [`get_logger`].
pub fn get_logger_with_options(
    name: &str,
    options: &SpecLoggerOptions,
) -> Result<Arc<Logger>, LogError> {
    let mut dict_loggers = DICT_LOGGERS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(logger) = dict_loggers.get(name) {
        return Ok(Arc::clone(logger));
    }

    let logger = Arc::new(Logger::new(name, options)?);
    dict_loggers.insert(name.to_string(), Arc::clone(&logger));
    Ok(logger)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Logger

/// Named sink writing `timestamp - name - LEVEL - message` lines.
#[derive(Debug)]
pub struct Logger {
    name: String,
    path_file_log: PathBuf,
    level: EnumLogLevel,
    dispatch: Dispatch,
}

impl Logger {
    fn new(name: &str, options: &SpecLoggerOptions) -> Result<Self, LogError> {
        Ok(Self {
            name: name.to_string(),
            path_file_log: options.path_file_log.clone(),
            level: options.level,
            dispatch: build_dispatch(name, options)?,
        })
    }

    /// Logger name as printed in each line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log file this logger appends to.
    pub fn file_log(&self) -> &Path {
        &self.path_file_log
    }

    /// Minimum severity that reaches the sinks.
    pub fn level(&self) -> EnumLogLevel {
        self.level
    }

    /// Emit `message` at `level`; dropped when below the logger threshold.
    pub fn log(&self, level: EnumLogLevel, message: impl AsRef<str>) {
        if level < self.level {
            return;
        }
        let c_message = message.as_ref();
        let c_severity = level.as_str();

        tracing::dispatcher::with_default(&self.dispatch, || match level {
            EnumLogLevel::Debug => tracing::debug!(severity = c_severity, "{c_message}"),
            EnumLogLevel::Info => tracing::info!(severity = c_severity, "{c_message}"),
            EnumLogLevel::Warning => tracing::warn!(severity = c_severity, "{c_message}"),
            EnumLogLevel::Error | EnumLogLevel::Critical => {
                tracing::error!(severity = c_severity, "{c_message}")
            }
        });
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(EnumLogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(EnumLogLevel::Info, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(EnumLogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(EnumLogLevel::Error, message);
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(EnumLogLevel::Critical, message);
    }
}

fn build_dispatch(name: &str, options: &SpecLoggerOptions) -> Result<Dispatch, LogError> {
    let file_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&options.path_file_log)
        .map_err(|source| LogError::OpenFile {
            path: options.path_file_log.clone(),
            source,
        })?;

    let layer_file = tracing_subscriber::fmt::layer()
        .event_format(FormatterLogLine::new(name))
        .with_writer(Arc::new(file_log));
    let layer_console = options.if_console.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(FormatterLogLine::new(name))
            .with_writer(std::io::stderr)
    });

    let subscriber = tracing_subscriber::registry()
        .with(layer_file)
        .with(layer_console);
    Ok(Dispatch::new(subscriber))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LineFormat

struct FormatterLogLine {
    name: String,
}

impl FormatterLogLine {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for FormatterLogLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = VisitorLogLine::default();
        event.record(&mut visitor);

        let c_severity = visitor
            .severity
            .unwrap_or_else(|| event.metadata().level().to_string());
        writeln!(
            writer,
            "{} - {} - {} - {}",
            derive_log_timestamp(),
            self.name,
            c_severity,
            visitor.message
        )
    }
}

#[derive(Default)]
struct VisitorLogLine {
    message: String,
    severity: Option<String>,
}

impl Visit for VisitorLogLine {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            C_FIELD_SEVERITY => self.severity = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

fn derive_log_timestamp() -> String {
    chrono::Local::now().format(C_FMT_LOG_TIMESTAMP).to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
