//! Workbook models, manager options and error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use customkit_log::{C_PATH_LOG_FILE_DEFAULT, EnumLogLevel};

use crate::conf::C_NAME_LOGGER_EXCEL;

////////////////////////////////////////////////////////////////////////////////
// #region WorkbookModel

/// Normalized cell value shared by the reader, the writer and table conversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Date with time of day.
    DateTime(NaiveDateTime),
}

impl EnumCellValue {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Per-sheet protection record.
///
/// `password_hash` is the legacy 16-bit Excel hash in upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSheetProtection {
    /// Whether the sheet protection gate is on.
    pub if_protected: bool,
    /// Stored password hash, kept even while the gate is off.
    pub password_hash: Option<String>,
}

/// One worksheet: values anchored at A1 plus its protection record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheet {
    pub name: String,
    pub cells: Vec<Vec<EnumCellValue>>,
    pub protection: SpecSheetProtection,
}

impl SpecSheet {
    /// Create an empty, unprotected sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of rows up to and including the last row holding a value.
    pub fn n_rows_used(&self) -> usize {
        self.cells
            .iter()
            .rposition(|row| row.iter().any(|value| !value.is_none()))
            .map_or(0, |n_idx| n_idx + 1)
    }

    /// Set one cell, growing the grid as needed.
    pub fn set_cell(&mut self, n_row: usize, n_col: usize, value: EnumCellValue) {
        if self.cells.len() <= n_row {
            self.cells.resize_with(n_row + 1, Vec::new);
        }
        let row = &mut self.cells[n_row];
        if row.len() <= n_col {
            row.resize(n_col + 1, EnumCellValue::None);
        }
        row[n_col] = value;
    }

    /// Overlay `grid` onto the sheet starting at column A of `row_start`.
    pub fn write_grid(&mut self, row_start: usize, grid: Vec<Vec<EnumCellValue>>) {
        for (n_offset, row) in grid.into_iter().enumerate() {
            for (n_col, value) in row.into_iter().enumerate() {
                self.set_cell(row_start + n_offset, n_col, value);
            }
        }
    }
}

/// Ordered set of sheets loaded from one workbook file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbook {
    pub sheets: Vec<SpecSheet>,
}

impl SpecWorkbook {
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    /// Index of the sheet named exactly `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|sheet| sheet.name == name)
    }

    pub fn sheet(&self, name: &str) -> Option<&SpecSheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut SpecSheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    pub fn push_sheet(&mut self, sheet: SpecSheet) {
        self.sheets.push(sheet);
    }

    /// Remove and return the sheet named exactly `name`.
    pub fn remove_sheet(&mut self, name: &str) -> Option<SpecSheet> {
        self.position(name).map(|n_idx| self.sheets.remove(n_idx))
    }

    /// Move the sheet to index 0; the others keep their relative order.
    pub fn move_sheet_to_front(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(n_idx) => {
                self.sheets[..=n_idx].rotate_right(1);
                true
            }
            None => false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ManagerOptions

/// Policy when `create_sheet` is asked for a name already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSheetNameConflictStrategy {
    /// Append the highest numeric suffix + 1 (`Sheet1` -> `Sheet11`).
    #[default]
    Rename,
    /// Fail with [`ExcelError::SheetExists`].
    Error,
}

/// How `overwrite_sheet` sequences its delete/create/write steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumOverwriteMode {
    /// Three saves against the target file; a mid-way failure is visible.
    #[default]
    Sequential,
    /// Run the steps on a sibling temp copy and rename it over the target.
    Shadow,
}

/// Construction options for [`crate::ExcelManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExcelManagerOptions {
    /// Log file shared with the embedded date normalizer.
    pub path_file_log: PathBuf,
    /// Minimum log severity.
    pub log_level: EnumLogLevel,
    /// Logger name.
    pub log_name: String,
    pub rule_sheet_name_conflict: EnumSheetNameConflictStrategy,
    pub rule_overwrite: EnumOverwriteMode,
}

impl Default for SpecExcelManagerOptions {
    fn default() -> Self {
        Self {
            path_file_log: PathBuf::from(C_PATH_LOG_FILE_DEFAULT),
            log_level: EnumLogLevel::Debug,
            log_name: C_NAME_LOGGER_EXCEL.to_string(),
            rule_sheet_name_conflict: EnumSheetNameConflictStrategy::default(),
            rule_overwrite: EnumOverwriteMode::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Coarse failure classes reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumExcelErrorKind {
    FileNotFound,
    SheetNotFound,
    PermissionDenied,
    Unknown,
}

impl fmt::Display for EnumExcelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FileNotFound => "FileNotFound",
            Self::SheetNotFound => "SheetNotFound",
            Self::PermissionDenied => "PermissionDenied",
            Self::Unknown => "Unknown",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExcelError {
    #[error("File '{}' not found.", .0.display())]
    FileNotFound(PathBuf),
    #[error("Sheet '{sheet}' not found in workbook '{}'.", .workbook.display())]
    SheetNotFound { workbook: PathBuf, sheet: String },
    #[error("Sheet '{sheet}' already exists in workbook '{}'.", .workbook.display())]
    SheetExists { workbook: PathBuf, sheet: String },
    #[error("Invalid sheet name '{0}': {1}")]
    InvalidSheetName(String, String),
    #[error("Cannot delete '{sheet}': it is the last sheet of '{}'.", .workbook.display())]
    LastSheet { workbook: PathBuf, sheet: String },
    #[error("Permission error while accessing '{}'.", .0.display())]
    PermissionDenied(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("xlsx read error: {0}")]
    Read(#[from] calamine::XlsxError),
    #[error("xlsx write error: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("xlsx package error: {0}")]
    Package(#[from] zip::result::ZipError),
    #[error("xlsx xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xlsx xml attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("table error: {0}")]
    Table(#[from] polars::prelude::PolarsError),
    #[error("{0}")]
    Invalid(String),
}

impl ExcelError {
    /// Map the error onto the logged failure taxonomy.
    pub fn kind(&self) -> EnumExcelErrorKind {
        match self {
            Self::FileNotFound(_) => EnumExcelErrorKind::FileNotFound,
            Self::SheetNotFound { .. } => EnumExcelErrorKind::SheetNotFound,
            Self::PermissionDenied(_) => EnumExcelErrorKind::PermissionDenied,
            Self::Io(err) => match err.kind() {
                io::ErrorKind::NotFound => EnumExcelErrorKind::FileNotFound,
                io::ErrorKind::PermissionDenied => EnumExcelErrorKind::PermissionDenied,
                _ => EnumExcelErrorKind::Unknown,
            },
            _ => EnumExcelErrorKind::Unknown,
        }
    }

    /// Attach `path` to file-level io failures.
    pub(crate) fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_workbook(l_names: &[&str]) -> SpecWorkbook {
        SpecWorkbook {
            sheets: l_names.iter().map(|name| SpecSheet::new(*name)).collect(),
        }
    }

    #[test]
    fn test_move_sheet_to_front_keeps_relative_order() {
        let mut workbook = derive_workbook(&["A", "B", "C", "D"]);
        assert!(workbook.move_sheet_to_front("C"));
        assert_eq!(workbook.sheet_names(), vec!["C", "A", "B", "D"]);
        assert!(!workbook.move_sheet_to_front("Z"));
    }

    #[test]
    fn test_sheet_lookup_is_case_sensitive() {
        let workbook = derive_workbook(&["Data"]);
        assert!(workbook.sheet("data").is_none());
        assert_eq!(workbook.position("Data"), Some(0));
    }

    #[test]
    fn test_write_grid_overlays_and_counts_rows() {
        let mut sheet = SpecSheet::new("S");
        assert_eq!(sheet.n_rows_used(), 0);

        sheet.write_grid(
            1,
            vec![vec![EnumCellValue::Number(1.0), EnumCellValue::Number(2.0)]],
        );
        sheet.write_grid(3, vec![vec![EnumCellValue::None]]);
        assert_eq!(sheet.n_rows_used(), 2);
        assert_eq!(sheet.cells[1][1], EnumCellValue::Number(2.0));
    }

    #[test]
    fn test_error_kind_classifies_io() {
        let err = ExcelError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            Path::new("a.xlsx"),
        );
        assert_eq!(err.kind(), EnumExcelErrorKind::PermissionDenied);

        let err = ExcelError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind(), EnumExcelErrorKind::FileNotFound);
        assert_eq!(EnumExcelErrorKind::SheetNotFound.to_string(), "SheetNotFound");
    }
}
