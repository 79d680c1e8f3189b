//! Stateless helpers shared by the reader, the writer and the manager.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{AnyValue, Column, DataFrame, DataType, TimeUnit};

use crate::conf::{C_PREFIX_COLUMN_UNNAMED, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumCellValue, ExcelError};

const N_MS_PER_DAY: i64 = 86_400_000;

////////////////////////////////////////////////////////////////////////////////
// #region SheetNames

/// Reject names Excel cannot store.
pub fn validate_sheet_name(name: &str) -> Result<(), ExcelError> {
    let invalid = |c_reason: &str| {
        Err(ExcelError::InvalidSheetName(
            name.to_string(),
            c_reason.to_string(),
        ))
    };

    if name.is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return invalid("name is longer than 31 characters");
    }
    if let Some(c_illegal) = name.chars().find(|c| TUP_EXCEL_ILLEGAL.contains(c)) {
        return invalid(&format!("name contains illegal character {c_illegal:?}"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("name starts or ends with an apostrophe");
    }
    Ok(())
}

/// Name a new sheet the way Excel-compatible writers resolve collisions.
///
/// Names compare case-insensitively. On a clash the new name gets the highest
/// numeric suffix found on names sharing the prefix, plus one, so `Sheet1`
/// next to `Sheet1` becomes `Sheet11`. The base is cut short when the suffix
/// would push the name past 31 characters.
pub fn derive_available_sheet_name(l_names_existing: &[String], name: &str) -> String {
    let c_name_lower = name.to_lowercase();
    let l_names_lower: Vec<String> = l_names_existing
        .iter()
        .map(|c_existing| c_existing.to_lowercase())
        .collect();
    if !l_names_lower.contains(&c_name_lower) {
        return name.to_string();
    }

    let n_suffix_max = l_names_lower
        .iter()
        .filter_map(|c_existing| c_existing.strip_prefix(c_name_lower.as_str()))
        .filter(|c_rest| c_rest.chars().all(|c| c.is_ascii_digit()))
        .map(|c_rest| c_rest.parse::<u64>().unwrap_or(0))
        .max()
        .unwrap_or(0);

    let mut n_suffix = n_suffix_max.saturating_add(1);
    loop {
        let c_suffix = n_suffix.to_string();
        let n_len_base = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len());
        let c_base: String = name.chars().take(n_len_base).collect();
        let c_candidate = format!("{c_base}{c_suffix}");
        if !l_names_lower.contains(&c_candidate.to_lowercase()) {
            return c_candidate;
        }
        n_suffix = n_suffix.saturating_add(1);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Protection

/// Legacy 16-bit sheet protection hash, upper-case hex.
pub fn derive_excel_password_hash(password: &str) -> String {
    let rotate = |n_hash: u16| ((n_hash >> 14) & 0x0001) | ((n_hash << 1) & 0x7fff);

    let v_bytes = password.as_bytes();
    let mut n_hash: u16 = 0;
    for n_byte in v_bytes.iter().rev() {
        n_hash = rotate(n_hash) ^ u16::from(*n_byte);
    }
    n_hash = rotate(n_hash);
    n_hash ^= v_bytes.len() as u16;
    n_hash ^= 0xce4b;

    format!("{n_hash:X}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Midnight timestamps read back as dates.
pub fn derive_cell_value_from_datetime(datetime: NaiveDateTime) -> EnumCellValue {
    if datetime.time() == NaiveTime::MIN {
        EnumCellValue::Date(datetime.date())
    } else {
        EnumCellValue::DateTime(datetime)
    }
}

fn derive_datetime_from_timestamp(n_value: i64, unit: &TimeUnit) -> Option<NaiveDateTime> {
    let datetime = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(n_value)?,
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(n_value)?,
        TimeUnit::Nanoseconds => DateTime::from_timestamp_nanos(n_value),
    };
    Some(datetime.naive_utc())
}

fn derive_date_from_days(n_days: i32) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(i64::from(n_days) * N_MS_PER_DAY)
        .map(|datetime| datetime.date_naive())
}

/// Convert one table value into a cell value.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int128(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        AnyValue::Date(n_days) => derive_date_from_days(n_days)
            .map_or(EnumCellValue::None, EnumCellValue::Date),
        AnyValue::Datetime(n_value, unit, _) => derive_datetime_from_timestamp(n_value, &unit)
            .map_or(EnumCellValue::None, EnumCellValue::DateTime),
        AnyValue::DatetimeOwned(n_value, unit, _) => {
            derive_datetime_from_timestamp(n_value, &unit)
                .map_or(EnumCellValue::None, EnumCellValue::DateTime)
        }
        other => EnumCellValue::String(other.to_string()),
    }
}

/// Text shown for a cell when a column has to fall back to strings.
pub fn derive_cell_text(value: &EnumCellValue) -> Option<String> {
    match value {
        EnumCellValue::None => None,
        EnumCellValue::String(val) => Some(val.clone()),
        EnumCellValue::Number(val) if val.fract() == 0.0 && val.abs() < 1e15 => {
            Some(format!("{val:.0}"))
        }
        EnumCellValue::Number(val) => Some(val.to_string()),
        EnumCellValue::Boolean(val) => Some(if *val { "True" } else { "False" }.to_string()),
        EnumCellValue::Date(val) => Some(val.format("%Y-%m-%d").to_string()),
        EnumCellValue::DateTime(val) => Some(val.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableConversion

/// Validate that column names are unique.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), ExcelError> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(ExcelError::Invalid(format!("Duplicate column names: {c_msg}")))
}

/// Lay a table out as rows of cells, optionally preceded by a header row.
pub fn derive_grid_from_dataframe(
    df: &DataFrame,
    if_header: bool,
) -> Result<Vec<Vec<EnumCellValue>>, ExcelError> {
    let l_colnames: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    validate_unique_columns(&l_colnames)?;

    let mut l_rows = Vec::with_capacity(df.height() + usize::from(if_header));
    if if_header {
        l_rows.push(
            l_colnames
                .into_iter()
                .map(EnumCellValue::String)
                .collect::<Vec<_>>(),
        );
    }

    let l_columns = df.get_columns();
    for n_idx_row in 0..df.height() {
        let mut row = Vec::with_capacity(l_columns.len());
        for col in l_columns {
            row.push(derive_cell_value_from_any_value(col.get(n_idx_row)?));
        }
        l_rows.push(row);
    }
    Ok(l_rows)
}

/// Header names with blanks and duplicates resolved.
///
/// Blank cells become `Unnamed: {idx}`; repeats get `.1`, `.2`, ...
pub fn derive_header_names(row_header: &[EnumCellValue]) -> Vec<String> {
    let mut set_names_used: BTreeSet<String> = BTreeSet::new();
    let mut dict_count_by_name: BTreeMap<String, usize> = BTreeMap::new();
    let mut l_names = Vec::with_capacity(row_header.len());

    for (n_idx, value) in row_header.iter().enumerate() {
        let c_base = derive_cell_text(value)
            .filter(|c_text| !c_text.is_empty())
            .unwrap_or_else(|| format!("{C_PREFIX_COLUMN_UNNAMED}{n_idx}"));

        let mut c_name = c_base.clone();
        while set_names_used.contains(&c_name) {
            let n_count = dict_count_by_name.entry(c_base.clone()).or_insert(0);
            *n_count += 1;
            c_name = format!("{c_base}.{n_count}");
        }
        set_names_used.insert(c_name.clone());
        l_names.push(c_name);
    }
    l_names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumColumnKind {
    Empty,
    Integer,
    Float,
    Boolean,
    Temporal,
    Text,
}

fn derive_column_kind(l_values: &[&EnumCellValue]) -> EnumColumnKind {
    let mut kind = EnumColumnKind::Empty;
    for value in l_values {
        let kind_value = match value {
            EnumCellValue::None => continue,
            EnumCellValue::Number(val) if val.fract() == 0.0 && val.abs() < 9.0e15 => {
                EnumColumnKind::Integer
            }
            EnumCellValue::Number(_) => EnumColumnKind::Float,
            EnumCellValue::Boolean(_) => EnumColumnKind::Boolean,
            EnumCellValue::Date(_) | EnumCellValue::DateTime(_) => EnumColumnKind::Temporal,
            EnumCellValue::String(_) => EnumColumnKind::Text,
        };
        kind = match (kind, kind_value) {
            (EnumColumnKind::Empty, next) => next,
            (prev, next) if prev == next => prev,
            (EnumColumnKind::Integer, EnumColumnKind::Float)
            | (EnumColumnKind::Float, EnumColumnKind::Integer) => EnumColumnKind::Float,
            _ => return EnumColumnKind::Text,
        };
    }
    kind
}

fn derive_column(c_name: &str, l_values: &[&EnumCellValue]) -> Result<Column, ExcelError> {
    let name = c_name.into();
    let col = match derive_column_kind(l_values) {
        EnumColumnKind::Integer => Column::new(
            name,
            l_values
                .iter()
                .map(|value| match value {
                    EnumCellValue::Number(val) => Some(*val as i64),
                    _ => None,
                })
                .collect::<Vec<Option<i64>>>(),
        ),
        EnumColumnKind::Float => Column::new(
            name,
            l_values
                .iter()
                .map(|value| match value {
                    EnumCellValue::Number(val) => Some(*val),
                    _ => None,
                })
                .collect::<Vec<Option<f64>>>(),
        ),
        EnumColumnKind::Boolean => Column::new(
            name,
            l_values
                .iter()
                .map(|value| match value {
                    EnumCellValue::Boolean(val) => Some(*val),
                    _ => None,
                })
                .collect::<Vec<Option<bool>>>(),
        ),
        EnumColumnKind::Temporal => Column::new(
            name,
            l_values
                .iter()
                .map(|value| match value {
                    EnumCellValue::Date(val) => {
                        Some(val.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
                    }
                    EnumCellValue::DateTime(val) => Some(val.and_utc().timestamp_millis()),
                    _ => None,
                })
                .collect::<Vec<Option<i64>>>(),
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        EnumColumnKind::Empty | EnumColumnKind::Text => Column::new(
            name,
            l_values
                .iter()
                .map(|value| derive_cell_text(value))
                .collect::<Vec<Option<String>>>(),
        ),
    };
    Ok(col)
}

static CELL_NONE: EnumCellValue = EnumCellValue::None;

fn derive_cell_at(row: &[EnumCellValue], n_col: usize) -> &EnumCellValue {
    row.get(n_col).unwrap_or(&CELL_NONE)
}

/// Build a table from a sheet grid: first used row is the header.
///
/// Leading blank rows and columns are skipped. Column dtypes are inferred
/// from the body: whole numbers give `Int64`, other numbers `Float64`,
/// booleans `Boolean`, dates and timestamps `Datetime(ms)`, anything else
/// or a mix gives `String`. An empty grid gives an empty table.
pub fn derive_dataframe_from_cells(
    cells: &[Vec<EnumCellValue>],
) -> Result<DataFrame, ExcelError> {
    let if_used = |row: &Vec<EnumCellValue>| row.iter().any(|value| !value.is_none());

    let Some(n_row_header) = cells.iter().position(if_used) else {
        return Ok(DataFrame::empty());
    };
    let n_row_end = cells
        .iter()
        .rposition(if_used)
        .map_or(n_row_header + 1, |n| n + 1);
    let l_rows = &cells[n_row_header..n_row_end];

    let n_col_start = l_rows
        .iter()
        .filter_map(|row| row.iter().position(|value| !value.is_none()))
        .min()
        .unwrap_or(0);
    let n_col_end = l_rows
        .iter()
        .filter_map(|row| row.iter().rposition(|value| !value.is_none()))
        .max()
        .map_or(n_col_start, |n| n + 1);

    let row_header: Vec<EnumCellValue> = (n_col_start..n_col_end)
        .map(|n_col| derive_cell_at(&l_rows[0], n_col).clone())
        .collect();
    let l_names = derive_header_names(&row_header);

    let mut l_columns = Vec::with_capacity(l_names.len());
    for (n_offset, c_name) in l_names.iter().enumerate() {
        let n_col = n_col_start + n_offset;
        let l_values: Vec<&EnumCellValue> = l_rows[1..]
            .iter()
            .map(|row| derive_cell_at(row, n_col))
            .collect();
        l_columns.push(derive_column(c_name, &l_values)?);
    }

    Ok(DataFrame::new(l_columns)?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn s(val: &str) -> EnumCellValue {
        EnumCellValue::String(val.to_string())
    }

    fn n(val: f64) -> EnumCellValue {
        EnumCellValue::Number(val)
    }

    #[test]
    fn test_validate_sheet_name_rules() {
        assert!(validate_sheet_name("Data 2024").is_ok());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name("[x]").is_err());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
        assert!(validate_sheet_name("'quoted").is_err());
    }

    #[test]
    fn test_derive_available_sheet_name_suffixes() {
        let l_names = vec!["Sheet1".to_string(), "Data".to_string()];
        assert_eq!(derive_available_sheet_name(&l_names, "New"), "New");
        assert_eq!(derive_available_sheet_name(&l_names, "Sheet1"), "Sheet11");
        assert_eq!(derive_available_sheet_name(&l_names, "data"), "data1");

        let l_names = vec!["Sheet1".to_string(), "sheet17".to_string()];
        assert_eq!(derive_available_sheet_name(&l_names, "Sheet1"), "Sheet18");
    }

    #[test]
    fn test_derive_available_sheet_name_stays_within_limit() {
        let c_long = "x".repeat(31);
        let l_names = vec![c_long.clone()];
        let c_name = derive_available_sheet_name(&l_names, &c_long);
        assert_eq!(c_name, format!("{}1", "x".repeat(30)));
        assert!(validate_sheet_name(&c_name).is_ok());

        let l_names = vec![c_long.clone(), c_name];
        let c_name = derive_available_sheet_name(&l_names, &c_long);
        assert_eq!(c_name, format!("{}2", "x".repeat(30)));

        let c_long_other = "y".repeat(30);
        let l_names = vec![c_long_other.clone(), format!("{c_long_other}9")];
        let c_name = derive_available_sheet_name(&l_names, &c_long_other);
        assert_eq!(c_name, format!("{}10", "y".repeat(29)));
        assert_eq!(c_name.chars().count(), 31);
    }

    #[test]
    fn test_derive_excel_password_hash_known_values() {
        assert_eq!(derive_excel_password_hash("password"), "83AF");
        assert_eq!(derive_excel_password_hash("abc"), "CC1A");
        assert_eq!(derive_excel_password_hash("pw"), "CF75");
        assert_eq!(derive_excel_password_hash(""), "CE4B");
    }

    #[test]
    fn test_derive_header_names_blank_and_duplicates() {
        let row = vec![s("a"), EnumCellValue::None, s("a"), s("a"), s("a.1")];
        assert_eq!(
            derive_header_names(&row),
            vec!["a", "Unnamed: 1", "a.1", "a.2", "a.1.1"]
        );
    }

    #[test]
    fn test_derive_dataframe_from_cells_infers_dtypes() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let cells = vec![
            vec![],
            vec![
                EnumCellValue::None,
                s("int"),
                s("float"),
                s("flag"),
                s("day"),
                s("mixed"),
                s("blank"),
            ],
            vec![
                EnumCellValue::None,
                n(1.0),
                n(1.5),
                EnumCellValue::Boolean(true),
                EnumCellValue::Date(date),
                s("x"),
            ],
            vec![
                EnumCellValue::None,
                n(2.0),
                n(3.0),
                EnumCellValue::Boolean(false),
                EnumCellValue::None,
                n(4.0),
            ],
        ];

        let df = derive_dataframe_from_cells(&cells).unwrap();
        assert_eq!(
            df.get_column_names_str(),
            vec!["int", "float", "flag", "day", "mixed", "blank"]
        );
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("int").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("float").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("flag").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(
            df.column("day").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
        assert_eq!(df.column("mixed").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("blank").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("blank").unwrap().null_count(), 2);
        assert_eq!(
            df.column("mixed").unwrap().get(1).unwrap(),
            AnyValue::String("4")
        );
    }

    #[test]
    fn test_derive_dataframe_from_cells_empty_and_header_only() {
        assert_eq!(derive_dataframe_from_cells(&[]).unwrap().shape(), (0, 0));
        assert_eq!(
            derive_dataframe_from_cells(&[vec![EnumCellValue::None]])
                .unwrap()
                .shape(),
            (0, 0)
        );

        let df = derive_dataframe_from_cells(&[vec![s("a"), s("b")]]).unwrap();
        assert_eq!(df.shape(), (0, 2));
    }

    #[test]
    fn test_derive_grid_from_dataframe_with_header() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), &[1i64, 2]),
            Column::new("b".into(), &["x", "y"]),
        ])
        .unwrap();

        let l_rows = derive_grid_from_dataframe(&df, true).unwrap();
        assert_eq!(l_rows.len(), 3);
        assert_eq!(l_rows[0], vec![s("a"), s("b")]);
        assert_eq!(l_rows[2], vec![n(2.0), s("y")]);

        let l_rows = derive_grid_from_dataframe(&df, false).unwrap();
        assert_eq!(l_rows[0], vec![n(1.0), s("x")]);
    }
}
