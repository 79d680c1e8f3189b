//! Logged sheet lifecycle operations over a workbook file.
//!
//! Every public operation is one or more full load -> mutate -> save trips
//! against the file; nothing is cached between calls. Failures are logged
//! with their kind before they are returned.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use customkit_date::DateNormalizer;
use customkit_log::{LogError, Logger, get_logger};
use polars::prelude::DataFrame;

use crate::reader::load_workbook;
use crate::spec::{
    EnumCellValue, EnumOverwriteMode, EnumSheetNameConflictStrategy, ExcelError,
    SpecExcelManagerOptions, SpecSheet, SpecSheetProtection,
};
use crate::util::{
    derive_available_sheet_name, derive_dataframe_from_cells, derive_excel_password_hash,
    derive_grid_from_dataframe, validate_sheet_name,
};
use crate::writer::save_workbook;

fn derive_sheet_not_found(path: &Path, sheet: &str) -> ExcelError {
    ExcelError::SheetNotFound {
        workbook: path.to_path_buf(),
        sheet: sheet.to_string(),
    }
}

/// Sheet-level CRUD, overwrite, append and protection over `.xlsx` files.
#[derive(Debug, Clone)]
pub struct ExcelManager {
    log: Arc<Logger>,
    normalizer: DateNormalizer,
    options: SpecExcelManagerOptions,
}

impl ExcelManager {
    pub fn new(options: SpecExcelManagerOptions) -> Result<Self, LogError> {
        let log = get_logger(&options.log_name, &options.path_file_log, options.log_level)?;
        log.info("ExcelManager initialized.");
        // Normalizer lines share the manager's file and threshold.
        let normalizer = DateNormalizer::with_logger(Arc::clone(&log));
        Ok(Self {
            log,
            normalizer,
            options,
        })
    }

    /// Manager with default options logging to `path_file_log`.
    pub fn from_log_file(path_file_log: impl AsRef<Path>) -> Result<Self, LogError> {
        Self::new(SpecExcelManagerOptions {
            path_file_log: path_file_log.as_ref().to_path_buf(),
            ..Default::default()
        })
    }

    pub fn options(&self) -> &SpecExcelManagerOptions {
        &self.options
    }

    fn report<T>(&self, result: Result<T, ExcelError>) -> Result<T, ExcelError> {
        if let Err(err) = &result {
            self.log.error(format!("{}: {err}", err.kind()));
        }
        result
    }

    ////////////////////////////////////////////////////////////////////////////
    // #region ReadPath

    /// Sheet contents as a table, or an empty table on any failure.
    pub fn get_table(&self, path_workbook: impl AsRef<Path>, sheet: &str) -> DataFrame {
        self.read_table(path_workbook, sheet).unwrap_or_else(|_| {
            self.log.warning("Initializing empty table.");
            DataFrame::empty()
        })
    }

    /// Sheet contents as a table with timestamp columns reduced to dates.
    pub fn read_table(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
    ) -> Result<DataFrame, ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "read_table: workbook={}, sheet={sheet}.",
            path.display()
        ));
        self.report(self.read_table_at(path, sheet))
    }

    fn read_table_at(&self, path: &Path, sheet: &str) -> Result<DataFrame, ExcelError> {
        let workbook = load_workbook(path)?;
        let sheet_source = workbook
            .sheet(sheet)
            .ok_or_else(|| derive_sheet_not_found(path, sheet))?;
        let df = derive_dataframe_from_cells(&sheet_source.cells)?;
        let df = self.normalizer.normalize_all(&df);
        self.log.info(format!(
            "Table {:?} created and timestamp columns modified.",
            df.shape()
        ));
        Ok(df)
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self, path_workbook: impl AsRef<Path>) -> Result<Vec<String>, ExcelError> {
        let path = path_workbook.as_ref();
        self.report(load_workbook(path).map(|workbook| workbook.sheet_names()))
    }

    /// Protection record of one sheet as stored in the file.
    pub fn sheet_protection(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
    ) -> Result<SpecSheetProtection, ExcelError> {
        let path = path_workbook.as_ref();
        let result = load_workbook(path).and_then(|workbook| {
            workbook
                .sheet(sheet)
                .map(|sheet_found| sheet_found.protection.clone())
                .ok_or_else(|| derive_sheet_not_found(path, sheet))
        });
        self.report(result)
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region SheetLifecycle

    /// Remove the sheet named exactly `sheet`.
    pub fn delete_sheet(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
    ) -> Result<(), ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "delete_sheet: workbook={}, sheet={sheet}.",
            path.display()
        ));
        self.report(self.delete_sheet_at(path, sheet))
    }

    fn delete_sheet_at(&self, path: &Path, sheet: &str) -> Result<(), ExcelError> {
        let mut workbook = load_workbook(path)?;
        self.log.info(format!(
            "{} loaded and sheet names: {:?}.",
            path.display(),
            workbook.sheet_names()
        ));

        if workbook.position(sheet).is_none() {
            return Err(derive_sheet_not_found(path, sheet));
        }
        if workbook.sheets.len() == 1 {
            return Err(ExcelError::LastSheet {
                workbook: path.to_path_buf(),
                sheet: sheet.to_string(),
            });
        }

        workbook.remove_sheet(sheet);
        save_workbook(path, &workbook)?;
        self.log.info(format!("{sheet} deleted from {}.", path.display()));
        Ok(())
    }

    /// Append an empty sheet; returns the name actually used.
    pub fn create_sheet(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
    ) -> Result<String, ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "create_sheet: workbook={}, sheet={sheet}.",
            path.display()
        ));
        self.report(self.create_sheet_at(path, sheet))
    }

    fn create_sheet_at(&self, path: &Path, sheet: &str) -> Result<String, ExcelError> {
        let mut workbook = load_workbook(path)?;
        validate_sheet_name(sheet)?;

        let l_names = workbook.sheet_names();
        let name_used = match self.options.rule_sheet_name_conflict {
            EnumSheetNameConflictStrategy::Rename => derive_available_sheet_name(&l_names, sheet),
            EnumSheetNameConflictStrategy::Error => {
                let c_lower = sheet.to_lowercase();
                if l_names.iter().any(|name| name.to_lowercase() == c_lower) {
                    return Err(ExcelError::SheetExists {
                        workbook: path.to_path_buf(),
                        sheet: sheet.to_string(),
                    });
                }
                sheet.to_string()
            }
        };
        if name_used != sheet {
            validate_sheet_name(&name_used)?;
            self.log.warning(format!(
                "Sheet name {sheet} already in use; creating {name_used} instead."
            ));
        }

        workbook.push_sheet(SpecSheet::new(name_used.clone()));
        save_workbook(path, &workbook)?;
        self.log.info(format!("{name_used} created in {}.", path.display()));
        Ok(name_used)
    }

    /// Move the sheet to the first position.
    pub fn reposition_sheet(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
    ) -> Result<(), ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "reposition_sheet: workbook={}, sheet={sheet}.",
            path.display()
        ));
        self.report(self.reposition_sheet_at(path, sheet))
    }

    fn reposition_sheet_at(&self, path: &Path, sheet: &str) -> Result<(), ExcelError> {
        let mut workbook = load_workbook(path)?;
        if !workbook.move_sheet_to_front(sheet) {
            return Err(derive_sheet_not_found(path, sheet));
        }
        save_workbook(path, &workbook)?;
        self.log.info(format!(
            "{sheet} moved to the start of {}.",
            path.display()
        ));
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Overwrite

    /// Replace the sheet with `df`, header row first.
    ///
    /// Runs delete, create and write as separate saves. In
    /// [`EnumOverwriteMode::Sequential`] a failure part-way leaves the file
    /// in the intermediate state; [`EnumOverwriteMode::Shadow`] runs the same
    /// steps on a sibling copy and only replaces the file once all succeed.
    pub fn overwrite_sheet(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
        df: &DataFrame,
    ) -> Result<(), ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "overwrite_sheet: workbook={}, sheet={sheet}, table_shape={:?}.",
            path.display(),
            df.shape()
        ));
        let result = match self.options.rule_overwrite {
            EnumOverwriteMode::Sequential => self.overwrite_sheet_at(path, sheet, df),
            EnumOverwriteMode::Shadow => self.overwrite_sheet_shadow(path, sheet, df),
        };
        self.report(result)
    }

    fn overwrite_sheet_at(
        &self,
        path: &Path,
        sheet: &str,
        df: &DataFrame,
    ) -> Result<(), ExcelError> {
        let grid = derive_grid_from_dataframe(df, true)?;

        let if_removed = match self.delete_sheet_at(path, sheet) {
            Ok(()) => true,
            Err(ExcelError::SheetNotFound { .. }) => {
                self.log.info(format!("{sheet} not present; nothing to delete."));
                true
            }
            Err(ExcelError::LastSheet { .. }) => {
                self.clear_sheet_at(path, sheet)?;
                false
            }
            Err(err) => return Err(err),
        };
        let name_target = if if_removed {
            self.create_sheet_at(path, sheet)?
        } else {
            sheet.to_string()
        };

        self.write_rows_at(path, &name_target, grid, false)?;
        self.log.info(format!(
            "{name_target} overwritten in {}.",
            path.display()
        ));
        Ok(())
    }

    /// Empty the only sheet in place, since a workbook cannot lose its last sheet.
    fn clear_sheet_at(&self, path: &Path, sheet: &str) -> Result<(), ExcelError> {
        let mut workbook = load_workbook(path)?;
        let sheet_target = workbook
            .sheet_mut(sheet)
            .ok_or_else(|| derive_sheet_not_found(path, sheet))?;
        *sheet_target = SpecSheet::new(sheet);
        save_workbook(path, &workbook)?;
        self.log.info(format!(
            "{sheet} is the last sheet of {}; cleared instead of deleted.",
            path.display()
        ));
        Ok(())
    }

    fn overwrite_sheet_shadow(
        &self,
        path: &Path,
        sheet: &str,
        df: &DataFrame,
    ) -> Result<(), ExcelError> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_shadow = tempfile::Builder::new()
            .prefix(".shadow-")
            .suffix(".xlsx")
            .tempfile_in(dir)
            .map_err(|err| ExcelError::from_io(err, dir))?;

        fs::copy(path, file_shadow.path()).map_err(|err| ExcelError::from_io(err, path))?;
        // The tempfile is created 0600; the committed workbook keeps the original mode.
        let permissions = fs::metadata(path)
            .map_err(|err| ExcelError::from_io(err, path))?
            .permissions();
        fs::set_permissions(file_shadow.path(), permissions)
            .map_err(|err| ExcelError::from_io(err, file_shadow.path()))?;
        self.overwrite_sheet_at(file_shadow.path(), sheet, df)?;

        file_shadow
            .persist(path)
            .map_err(|err| ExcelError::from_io(err.error, path))?;
        self.log.info(format!(
            "Shadow copy committed over {}.",
            path.display()
        ));
        Ok(())
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region AppendAndProtection

    /// Append the rows of `df` below the last used row, without a header.
    ///
    /// A missing sheet is created at the end. With a password, protection is
    /// lifted first and restored afterwards; if the append fails in between,
    /// the sheet stays unprotected and a warning is logged.
    pub fn append_table(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
        df: &DataFrame,
        password: Option<&str>,
    ) -> Result<(), ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "append_table: workbook={}, sheet={sheet}, table_shape={:?}.",
            path.display(),
            df.shape()
        ));
        self.report(self.append_table_at(path, sheet, df, password))
    }

    fn append_table_at(
        &self,
        path: &Path,
        sheet: &str,
        df: &DataFrame,
        password: Option<&str>,
    ) -> Result<(), ExcelError> {
        let grid = derive_grid_from_dataframe(df, false)?;
        let password = password.filter(|c_password| !c_password.is_empty());

        if let Some(c_password) = password {
            match self.set_sheet_protection_at(path, sheet, false, Some(c_password)) {
                Ok(()) | Err(ExcelError::SheetNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        if let Err(err) = self.write_rows_at(path, sheet, grid, true) {
            if password.is_some() {
                self.log.warning(format!(
                    "Append to {sheet} failed; its protection stays disabled in {}.",
                    path.display()
                ));
            }
            return Err(err);
        }
        self.log.info(format!(
            "Table appended to {sheet} in {}.",
            path.display()
        ));

        if let Some(c_password) = password {
            self.set_sheet_protection_at(path, sheet, true, Some(c_password))?;
        }
        Ok(())
    }

    /// Write `grid` into `sheet`, at row 0 or below the last used row.
    ///
    /// With `if_append`, a missing sheet is created at the end.
    fn write_rows_at(
        &self,
        path: &Path,
        sheet: &str,
        grid: Vec<Vec<EnumCellValue>>,
        if_append: bool,
    ) -> Result<(), ExcelError> {
        let mut workbook = load_workbook(path)?;
        if if_append && workbook.position(sheet).is_none() {
            validate_sheet_name(sheet)?;
            workbook.push_sheet(SpecSheet::new(sheet));
            self.log.info(format!(
                "{sheet} not present; created at the end of {}.",
                path.display()
            ));
        }

        let sheet_target = workbook
            .sheet_mut(sheet)
            .ok_or_else(|| derive_sheet_not_found(path, sheet))?;
        let n_row_start = if if_append {
            sheet_target.n_rows_used()
        } else {
            0
        };
        sheet_target.write_grid(n_row_start, grid);

        save_workbook(path, &workbook)?;
        self.log.debug(format!(
            "Rows written to {sheet} from row {n_row_start}."
        ));
        Ok(())
    }

    /// Turn protection on or off; a password is hashed and stored when enabling.
    pub fn set_sheet_protection(
        &self,
        path_workbook: impl AsRef<Path>,
        sheet: &str,
        enabled: bool,
        password: Option<&str>,
    ) -> Result<(), ExcelError> {
        let path = path_workbook.as_ref();
        self.log.info(format!(
            "set_sheet_protection: workbook={}, sheet={sheet}, enable_protection={enabled}.",
            path.display()
        ));
        self.report(self.set_sheet_protection_at(path, sheet, enabled, password))
    }

    fn set_sheet_protection_at(
        &self,
        path: &Path,
        sheet: &str,
        enabled: bool,
        password: Option<&str>,
    ) -> Result<(), ExcelError> {
        let mut workbook = load_workbook(path)?;
        let sheet_target = workbook
            .sheet_mut(sheet)
            .ok_or_else(|| derive_sheet_not_found(path, sheet))?;

        sheet_target.protection.if_protected = enabled;
        if enabled && let Some(c_password) = password.filter(|c_password| !c_password.is_empty())
        {
            sheet_target.protection.password_hash = Some(derive_excel_password_hash(c_password));
        }

        save_workbook(path, &workbook)?;
        self.log.info(format!(
            "Protection {} for {sheet} in {}.",
            if enabled { "enabled" } else { "disabled" },
            path.display()
        ));
        Ok(())
    }

    // #endregion
}
