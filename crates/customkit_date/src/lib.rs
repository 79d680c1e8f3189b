//! `customkit_date` v1:
//! Timestamp-to-date column conversion for `polars` tables.
//!
//! Architecture
//! - `conf` : logger name and default presets
//! - `spec` : error types
//! - `util` : pure column planning and conversion helpers
//! - `normalizer` : logged façade (`DateNormalizer`)

pub mod conf;
pub mod normalizer;
pub mod spec;
pub mod util;

pub use normalizer::DateNormalizer;
pub use spec::DateError;
pub use util::{
    convert_timestamp_column_to_date, convert_timestamp_columns_to_date,
    derive_timestamp_column_names,
};
