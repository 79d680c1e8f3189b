//! Date normalizer error types.

use polars::prelude::{DataType, PolarsError};

#[derive(Debug, thiserror::Error)]
pub enum DateError {
    #[error("The input table does not contain the datetime column: {0}")]
    ColumnNotFound(String),
    #[error("Column {column} has dtype {dtype}; expected a timestamp or date column")]
    ColumnNotTimestamp { column: String, dtype: DataType },
    #[error(transparent)]
    Polars(#[from] PolarsError),
}
