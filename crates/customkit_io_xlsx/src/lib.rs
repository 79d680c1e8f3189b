//! `customkit_io_xlsx` v1:
//! Sheet lifecycle management for `.xlsx` workbooks.
//!
//! Architecture:
//! - `conf`    : constants and default presets
//! - `spec`    : workbook model, options and errors
//! - `util`    : pure helpers (names, hashing, cell/table conversion)
//! - `package` : zip/xml access to the per-sheet protection record
//! - `reader`  : file -> workbook model (`calamine`)
//! - `writer`  : workbook model -> file (`rust_xlsxwriter`)
//! - `manager` : logged façade (`ExcelManager`)
pub mod conf;
pub mod manager;
pub mod package;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_NAME_LOGGER_EXCEL, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL, derive_default_excel_manager_options,
};
pub use manager::ExcelManager;
pub use reader::load_workbook;
pub use spec::{
    EnumCellValue, EnumExcelErrorKind, EnumOverwriteMode, EnumSheetNameConflictStrategy,
    ExcelError, SpecExcelManagerOptions, SpecSheet, SpecSheetProtection, SpecWorkbook,
};
pub use util::{
    derive_available_sheet_name, derive_dataframe_from_cells, derive_excel_password_hash,
    derive_grid_from_dataframe, validate_sheet_name,
};
pub use writer::save_workbook;
