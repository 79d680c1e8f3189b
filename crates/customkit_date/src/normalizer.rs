//! Logged façade over the conversion helpers.

use std::path::Path;
use std::sync::Arc;

use customkit_log::{EnumLogLevel, LogError, Logger, get_logger};
use polars::prelude::DataFrame;

use crate::conf::C_NAME_LOGGER_DATE;
use crate::spec::DateError;
use crate::util::{
    convert_timestamp_column_to_date, convert_timestamp_columns_to_date,
    derive_timestamp_column_names,
};

/// Converts timestamp columns of a table to calendar dates.
///
/// The soft methods never fail: errors are logged and the input table is
/// returned as is.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    log: Arc<Logger>,
}

impl DateNormalizer {
    /// Create a normalizer logging to `path_file_log`.
    pub fn new(path_file_log: impl AsRef<Path>) -> Result<Self, LogError> {
        let log = get_logger(C_NAME_LOGGER_DATE, path_file_log, EnumLogLevel::Debug)?;
        Ok(Self::with_logger(log))
    }

    /// Create a normalizer sharing an existing logger.
    pub fn with_logger(log: Arc<Logger>) -> Self {
        log.info("DateNormalizer initialized.");
        Self { log }
    }

    /// Convert every timestamp column to `Date`.
    pub fn normalize_all(&self, df: &DataFrame) -> DataFrame {
        let l_columns = derive_timestamp_column_names(df);
        self.log.info(format!("Datetime columns: {l_columns:?}"));

        match convert_timestamp_columns_to_date(df, &l_columns) {
            Ok(df_out) => {
                for column in &l_columns {
                    self.log.debug(format!("Datetime column:{column} converted."));
                }
                df_out
            }
            Err(err) => {
                self.log.error(err.to_string());
                df.clone()
            }
        }
    }

    /// Convert one column to `Date`; logs and returns `df` unchanged on error.
    pub fn normalize_column(&self, column: &str, df: &DataFrame) -> DataFrame {
        self.try_normalize_column(column, df)
            .unwrap_or_else(|_| df.clone())
    }

    /// Typed variant of [`Self::normalize_column`]. Errors are still logged.
    pub fn try_normalize_column(
        &self,
        column: &str,
        df: &DataFrame,
    ) -> Result<DataFrame, DateError> {
        match convert_timestamp_column_to_date(df, column) {
            Ok(df_out) => {
                self.log.info(format!("Datetime column:{column} converted."));
                Ok(df_out)
            }
            Err(err) => {
                self.log.error(err.to_string());
                Err(err)
            }
        }
    }
}
