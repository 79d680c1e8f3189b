//! Load a workbook file into the values-only model.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};

use crate::package::read_sheet_protections;
use crate::spec::{EnumCellValue, ExcelError, SpecSheet, SpecWorkbook};
use crate::util::derive_cell_value_from_datetime;

/// Read every sheet of `path`: values, order and protection record.
pub fn load_workbook(path: &Path) -> Result<SpecWorkbook, ExcelError> {
    let v_bytes = fs::read(path).map_err(|err| ExcelError::from_io(err, path))?;
    let mut dict_protection = read_sheet_protections(&v_bytes)?;

    let mut workbook_xlsx: Xlsx<_> = Xlsx::new(Cursor::new(v_bytes))?;
    let mut workbook = SpecWorkbook::default();
    for name in workbook_xlsx.sheet_names() {
        let range = workbook_xlsx.worksheet_range(&name)?;
        let mut sheet = derive_sheet_from_range(&name, &range);
        sheet.protection = dict_protection.remove(&name).unwrap_or_default();
        workbook.push_sheet(sheet);
    }
    Ok(workbook)
}

fn derive_sheet_from_range(name: &str, range: &Range<Data>) -> SpecSheet {
    let mut sheet = SpecSheet::new(name);
    let Some((n_row_start, n_col_start)) = range.start() else {
        return sheet;
    };

    for (n_row, n_col, data) in range.used_cells() {
        let value = convert_data_to_cell_value(data);
        if value.is_none() {
            continue;
        }
        sheet.set_cell(
            n_row_start as usize + n_row,
            n_col_start as usize + n_col,
            value,
        );
    }
    sheet
}

fn convert_data_to_cell_value(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty | Data::Error(_) => EnumCellValue::None,
        Data::String(val) if val.is_empty() => EnumCellValue::None,
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Bool(val) => EnumCellValue::Boolean(*val),
        Data::DateTime(dt) if dt.is_duration() => EnumCellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(EnumCellValue::Number(dt.as_f64()), derive_cell_value_from_datetime),
        Data::DateTimeIso(val) => NaiveDateTime::parse_from_str(val, "%Y-%m-%dT%H:%M:%S%.f")
            .map(derive_cell_value_from_datetime)
            .or_else(|_| NaiveDate::parse_from_str(val, "%Y-%m-%d").map(EnumCellValue::Date))
            .unwrap_or_else(|_| EnumCellValue::String(val.clone())),
        Data::DurationIso(val) => EnumCellValue::String(val.clone()),
    }
}
