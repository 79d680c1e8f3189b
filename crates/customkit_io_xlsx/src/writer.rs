//! Serialize the values-only model back into an xlsx file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};

use crate::conf::{
    C_NUM_FORMAT_DATE, C_NUM_FORMAT_DATETIME, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    N_YEAR_EXCEL_MIN,
};
use crate::package::apply_sheet_protection_hashes;
use crate::spec::{EnumCellValue, ExcelError, SpecWorkbook};

struct SpecCellFormats {
    fmt_date: Format,
    fmt_datetime: Format,
}

/// Write `workbook` to `path`, replacing the file.
pub fn save_workbook(path: &Path, workbook: &SpecWorkbook) -> Result<(), ExcelError> {
    let v_bytes = derive_workbook_bytes(workbook)?;
    fs::write(path, v_bytes).map_err(|err| ExcelError::from_io(err, path))
}

/// Render the whole workbook, protection hashes included, into xlsx bytes.
pub fn derive_workbook_bytes(workbook: &SpecWorkbook) -> Result<Vec<u8>, ExcelError> {
    if workbook.sheets.is_empty() {
        return Err(ExcelError::Invalid(
            "A workbook must contain at least one sheet.".to_string(),
        ));
    }

    let formats = SpecCellFormats {
        fmt_date: Format::new().set_num_format(C_NUM_FORMAT_DATE),
        fmt_datetime: Format::new().set_num_format(C_NUM_FORMAT_DATETIME),
    };
    let mut workbook_xlsx = Workbook::new();
    let mut dict_hash_by_sheet = BTreeMap::new();

    for sheet in &workbook.sheets {
        let worksheet = workbook_xlsx.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (n_row, row) in sheet.cells.iter().enumerate() {
            for (n_col, value) in row.iter().enumerate() {
                write_cell(worksheet, n_row, n_col, value, &formats)?;
            }
        }

        if sheet.protection.if_protected {
            worksheet.protect();
            if let Some(password_hash) = &sheet.protection.password_hash {
                dict_hash_by_sheet.insert(sheet.name.clone(), password_hash.clone());
            }
        }
    }

    let v_bytes = workbook_xlsx.save_to_buffer()?;
    apply_sheet_protection_hashes(v_bytes, &dict_hash_by_sheet)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    formats: &SpecCellFormats,
) -> Result<(), ExcelError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {}
        EnumCellValue::String(val) => {
            worksheet.write_string(n_row, n_col, val)?;
        }
        EnumCellValue::Number(val) if !val.is_finite() => {}
        EnumCellValue::Number(val) => {
            worksheet.write_number(n_row, n_col, *val)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet.write_boolean(n_row, n_col, *val)?;
        }
        EnumCellValue::Date(val) => {
            let datetime = cast_excel_date(*val)?;
            worksheet.write_datetime_with_format(n_row, n_col, &datetime, &formats.fmt_date)?;
        }
        EnumCellValue::DateTime(val) => {
            let datetime = cast_excel_datetime(*val)?;
            worksheet.write_datetime_with_format(n_row, n_col, &datetime, &formats.fmt_datetime)?;
        }
    }
    Ok(())
}

/// Dates before 1900 have no serial number in the 1900 date system.
fn cast_excel_date(date: NaiveDate) -> Result<ExcelDateTime, ExcelError> {
    let n_year = u16::try_from(date.year())
        .ok()
        .filter(|n_year| *n_year >= N_YEAR_EXCEL_MIN)
        .ok_or_else(|| {
            ExcelError::Invalid(format!(
                "date {date} is before {N_YEAR_EXCEL_MIN} and cannot be stored in Excel"
            ))
        })?;
    // Month and day always fit in u8.
    Ok(ExcelDateTime::from_ymd(
        n_year,
        date.month() as u8,
        date.day() as u8,
    )?)
}

fn cast_excel_datetime(datetime: NaiveDateTime) -> Result<ExcelDateTime, ExcelError> {
    let time = datetime.time();
    let n_seconds =
        f64::from(time.second()) + f64::from(time.nanosecond() % 1_000_000_000) / 1e9;
    Ok(cast_excel_date(datetime.date())?.and_hms(
        time.hour() as u16,
        time.minute() as u8,
        n_seconds,
    )?)
}

fn cast_row_num(value: usize) -> Result<u32, ExcelError> {
    if value >= N_NROWS_EXCEL_MAX {
        return Err(ExcelError::Invalid(format!(
            "row index {value} exceeds the Excel limit of {N_NROWS_EXCEL_MAX} rows"
        )));
    }
    u32::try_from(value).map_err(|_| ExcelError::Invalid(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ExcelError> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(ExcelError::Invalid(format!(
            "column index {value} exceeds the Excel limit of {N_NCOLS_EXCEL_MAX} columns"
        )));
    }
    u16::try_from(value)
        .map_err(|_| ExcelError::Invalid(format!("column index overflow: {value}")))
}
