//! XLSX constants and default preset factories.

use crate::spec::SpecExcelManagerOptions;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// First year representable in the 1900 date system.
pub const N_YEAR_EXCEL_MIN: u16 = 1900;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];

/// Logger name used by [`crate::ExcelManager`] unless overridden.
pub const C_NAME_LOGGER_EXCEL: &str = "ExcelManager";
/// Header prefix for blank header cells, followed by the column index.
pub const C_PREFIX_COLUMN_UNNAMED: &str = "Unnamed: ";

/// Number format applied to date cells.
pub const C_NUM_FORMAT_DATE: &str = "yyyy-mm-dd";
/// Number format applied to timestamp cells.
pub const C_NUM_FORMAT_DATETIME: &str = "yyyy-mm-dd hh:mm:ss";

pub(crate) const C_PATH_PART_WORKBOOK: &str = "xl/workbook.xml";
pub(crate) const C_PATH_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const C_TAG_SHEET_PROTECTION: &str = "sheetProtection";

/// Build default manager options.
pub fn derive_default_excel_manager_options() -> SpecExcelManagerOptions {
    SpecExcelManagerOptions::default()
}
