//! Pure conversion helpers behind [`crate::DateNormalizer`].

use polars::prelude::{DataFrame, DataType};

use crate::spec::DateError;

/// Names of all `Datetime` columns, in table order.
pub fn derive_timestamp_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| matches!(col.dtype(), DataType::Datetime(_, _)))
        .map(|col| col.name().to_string())
        .collect()
}

/// Cast one column to `Date`, keeping only the calendar date.
///
/// A column that is already `Date` is returned unchanged.
pub fn convert_timestamp_column_to_date(
    df: &DataFrame,
    column: &str,
) -> Result<DataFrame, DateError> {
    let col = df
        .get_columns()
        .iter()
        .find(|col| col.name().as_str() == column)
        .ok_or_else(|| DateError::ColumnNotFound(column.to_string()))?;

    match col.dtype() {
        DataType::Date => Ok(df.clone()),
        DataType::Datetime(_, _) => {
            let col_date = col.cast(&DataType::Date)?;
            let mut df_out = df.clone();
            df_out.with_column(col_date)?;
            Ok(df_out)
        }
        dtype => Err(DateError::ColumnNotTimestamp {
            column: column.to_string(),
            dtype: dtype.clone(),
        }),
    }
}

/// Cast every listed column to `Date`.
pub fn convert_timestamp_columns_to_date(
    df: &DataFrame,
    columns: &[String],
) -> Result<DataFrame, DateError> {
    let mut df_out = df.clone();
    for column in columns {
        df_out = convert_timestamp_column_to_date(&df_out, column)?;
    }
    Ok(df_out)
}
