use std::path::{Path, PathBuf};

use customkit_date::DateNormalizer;
use customkit_io_xlsx::{
    EnumCellValue, EnumExcelErrorKind, EnumOverwriteMode, EnumSheetNameConflictStrategy,
    ExcelError, ExcelManager, SpecExcelManagerOptions, SpecSheetProtection, load_workbook,
};
use customkit_log::EnumLogLevel;
use polars::prelude::{AnyValue, Column, DataFrame, DataType, TimeUnit};
use tempfile::TempDir;

const N_MS_PER_DAY: i64 = 86_400_000;
// 2022-01-01 as days since the unix epoch.
const N_DAYS_2022_01_01: i32 = 18_993;

fn derive_manager(
    dir: &TempDir,
    log_name: &str,
    rule_sheet_name_conflict: EnumSheetNameConflictStrategy,
    rule_overwrite: EnumOverwriteMode,
) -> ExcelManager {
    ExcelManager::new(SpecExcelManagerOptions {
        path_file_log: dir.path().join(format!("{log_name}.log")),
        log_name: log_name.to_string(),
        rule_sheet_name_conflict,
        rule_overwrite,
        ..Default::default()
    })
    .unwrap()
}

fn derive_manager_default(dir: &TempDir, log_name: &str) -> ExcelManager {
    derive_manager(
        dir,
        log_name,
        EnumSheetNameConflictStrategy::Rename,
        EnumOverwriteMode::Sequential,
    )
}

/// Workbook whose sheets hold the given rows of strings/numbers.
fn create_workbook(path: &Path, l_sheets: &[(&str, Vec<Vec<EnumCellValue>>)]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    for (name, l_rows) in l_sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (n_row, row) in l_rows.iter().enumerate() {
            for (n_col, value) in row.iter().enumerate() {
                match value {
                    EnumCellValue::String(val) => {
                        worksheet
                            .write_string(n_row as u32, n_col as u16, val)
                            .unwrap();
                    }
                    EnumCellValue::Number(val) => {
                        worksheet
                            .write_number(n_row as u32, n_col as u16, *val)
                            .unwrap();
                    }
                    _ => {}
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

fn derive_path(dir: &TempDir) -> PathBuf {
    dir.path().join("book.xlsx")
}

fn s(val: &str) -> EnumCellValue {
    EnumCellValue::String(val.to_string())
}

fn n(val: f64) -> EnumCellValue {
    EnumCellValue::Number(val)
}

fn derive_overlong_table() -> DataFrame {
    let c_overlong = "x".repeat(40_000);
    DataFrame::new(vec![Column::new("text".into(), &[c_overlong.as_str()])]).unwrap()
}

#[test]
fn test_get_table_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let manager = derive_manager_default(&dir, "test_get_table_missing_file");

    let df = manager.get_table(dir.path().join("absent.xlsx"), "Sheet1");
    assert_eq!(df.shape(), (0, 0));

    let err = manager
        .read_table(dir.path().join("absent.xlsx"), "Sheet1")
        .unwrap_err();
    assert_eq!(err.kind(), EnumExcelErrorKind::FileNotFound);
}

#[test]
fn test_create_sheet_then_get_table_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![])]);
    let manager = derive_manager_default(&dir, "test_create_sheet_then_get_table");

    let name = manager.create_sheet(&path, "Fresh").unwrap();
    assert_eq!(name, "Fresh");
    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Sheet1", "Fresh"]);
    assert_eq!(manager.get_table(&path, "Fresh").shape(), (0, 0));
}

#[test]
fn test_create_sheet_conflict_policies() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![])]);

    let manager = derive_manager_default(&dir, "test_create_sheet_conflict_rename");
    assert_eq!(manager.create_sheet(&path, "Sheet1").unwrap(), "Sheet11");
    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Sheet1", "Sheet11"]);

    let manager = derive_manager(
        &dir,
        "test_create_sheet_conflict_error",
        EnumSheetNameConflictStrategy::Error,
        EnumOverwriteMode::Sequential,
    );
    let err = manager.create_sheet(&path, "sheet1").unwrap_err();
    assert!(matches!(err, ExcelError::SheetExists { .. }));
    assert_eq!(err.kind(), EnumExcelErrorKind::Unknown);
    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Sheet1", "Sheet11"]);
}

#[test]
fn test_create_sheet_rejects_invalid_name_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![])]);
    let manager = derive_manager_default(&dir, "test_create_sheet_rejects_invalid");

    let err = manager.create_sheet(&path, "a/b").unwrap_err();
    assert!(matches!(err, ExcelError::InvalidSheetName(..)));

    let err = manager
        .create_sheet(dir.path().join("absent.xlsx"), "New")
        .unwrap_err();
    assert_eq!(err.kind(), EnumExcelErrorKind::FileNotFound);
}

#[test]
fn test_delete_sheet_twice_fails_second_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![]), ("Sheet2", vec![])]);
    let manager = derive_manager_default(&dir, "test_delete_sheet_twice");

    manager.delete_sheet(&path, "Sheet2").unwrap();
    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Sheet1"]);

    let err = manager.delete_sheet(&path, "Sheet2").unwrap_err();
    assert_eq!(err.kind(), EnumExcelErrorKind::SheetNotFound);
}

#[test]
fn test_delete_sheet_is_case_sensitive_and_keeps_last_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![])]);
    let manager = derive_manager_default(&dir, "test_delete_sheet_case_sensitive");

    let err = manager.delete_sheet(&path, "sheet1").unwrap_err();
    assert_eq!(err.kind(), EnumExcelErrorKind::SheetNotFound);

    let err = manager.delete_sheet(&path, "Sheet1").unwrap_err();
    assert!(matches!(err, ExcelError::LastSheet { .. }));
    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Sheet1"]);
}

#[test]
fn test_reposition_sheet_moves_to_front() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![]), ("Sheet2", vec![])]);
    let manager = derive_manager_default(&dir, "test_reposition_sheet_moves_to_front");

    manager.reposition_sheet(&path, "Sheet2").unwrap();
    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Sheet2", "Sheet1"]);

    manager.create_sheet(&path, "Sheet3").unwrap();
    manager.reposition_sheet(&path, "Sheet3").unwrap();
    assert_eq!(
        manager.sheet_names(&path).unwrap(),
        vec!["Sheet3", "Sheet2", "Sheet1"]
    );

    let err = manager.reposition_sheet(&path, "Nope").unwrap_err();
    assert_eq!(err.kind(), EnumExcelErrorKind::SheetNotFound);
}

#[test]
fn test_overwrite_then_get_table_matches_normalized_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![]), ("S", vec![vec![s("old")]])]);
    let manager = derive_manager_default(&dir, "test_overwrite_then_get_table");

    let l_ms: Vec<i64> = (0..3)
        .map(|n_day| (i64::from(N_DAYS_2022_01_01) + n_day) * N_MS_PER_DAY + 13 * 3_600_000)
        .collect();
    let df = DataFrame::new(vec![
        Column::new("int".into(), &[1i64, 2, 3]),
        Column::new("float".into(), &[Some(0.5f64), Some(1.25), None]),
        Column::new("text".into(), &[Some("x"), None, Some("z")]),
        Column::new("flag".into(), &[true, false, true]),
        Column::new("ts".into(), l_ms)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap(),
        Column::new("day".into(), &[N_DAYS_2022_01_01, N_DAYS_2022_01_01 + 31, N_DAYS_2022_01_01 + 59])
            .cast(&DataType::Date)
            .unwrap(),
    ])
    .unwrap();

    manager.overwrite_sheet(&path, "S", &df).unwrap();
    let df_read = manager.get_table(&path, "S");

    let normalizer = DateNormalizer::new(dir.path().join("normalizer.log")).unwrap();
    let df_expected = normalizer.normalize_all(&df);

    assert_eq!(df_read.get_column_names_str(), df_expected.get_column_names_str());
    assert_eq!(df_read.dtypes(), df_expected.dtypes());
    assert!(df_read.equals_missing(&df_expected));
    assert_eq!(
        df_read.column("ts").unwrap().get(1).unwrap(),
        AnyValue::Date(N_DAYS_2022_01_01 + 1)
    );
}

#[test]
fn test_dates_near_1900_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Dates", vec![])]);
    let manager = derive_manager_default(&dir, "test_dates_near_1900_round_trip");

    let date_epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let l_days: Vec<i32> = [(1900, 1, 15), (1900, 2, 28), (1900, 3, 1), (1950, 6, 1)]
        .into_iter()
        .map(|(n_year, n_month, n_day)| {
            let date = chrono::NaiveDate::from_ymd_opt(n_year, n_month, n_day).unwrap();
            (date - date_epoch).num_days() as i32
        })
        .collect();
    let df = DataFrame::new(vec![
        Column::new("day".into(), l_days.clone())
            .cast(&DataType::Date)
            .unwrap(),
    ])
    .unwrap();

    manager.overwrite_sheet(&path, "Dates", &df).unwrap();
    let df_read = manager.get_table(&path, "Dates");

    assert_eq!(df_read.column("day").unwrap().dtype(), &DataType::Date);
    for (n_idx, n_days) in l_days.iter().enumerate() {
        assert_eq!(
            df_read.column("day").unwrap().get(n_idx).unwrap(),
            AnyValue::Date(*n_days)
        );
    }
}

#[test]
fn test_overwrite_only_sheet_replaces_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Only", vec![vec![s("old"), s("cols")], vec![n(9.0), n(9.0)]])]);
    let manager = derive_manager_default(&dir, "test_overwrite_only_sheet");

    let df = DataFrame::new(vec![Column::new("a".into(), &[1i64])]).unwrap();
    manager.overwrite_sheet(&path, "Only", &df).unwrap();

    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Only"]);
    let df_read = manager.get_table(&path, "Only");
    assert_eq!(df_read.get_column_names_str(), vec!["a"]);
    assert_eq!(df_read.shape(), (1, 1));
}

#[test]
fn test_overwrite_failure_sequential_leaves_empty_recreated_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(
        &path,
        &[("Target", vec![vec![s("a")], vec![n(1.0)]]), ("Keep", vec![])],
    );
    let manager = derive_manager_default(&dir, "test_overwrite_failure_sequential");

    let err = manager
        .overwrite_sheet(&path, "Target", &derive_overlong_table())
        .unwrap_err();
    assert!(matches!(err, ExcelError::Write(_)));

    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Keep", "Target"]);
    assert_eq!(manager.get_table(&path, "Target").shape(), (0, 0));
}

#[test]
fn test_overwrite_failure_shadow_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(
        &path,
        &[("Target", vec![vec![s("a")], vec![n(1.0)]]), ("Keep", vec![])],
    );
    let manager = derive_manager(
        &dir,
        "test_overwrite_failure_shadow",
        EnumSheetNameConflictStrategy::Rename,
        EnumOverwriteMode::Shadow,
    );

    let err = manager
        .overwrite_sheet(&path, "Target", &derive_overlong_table())
        .unwrap_err();
    assert!(matches!(err, ExcelError::Write(_)));

    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Target", "Keep"]);
    assert_eq!(manager.get_table(&path, "Target").shape(), (1, 1));

    let l_leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".shadow-"))
        .collect();
    assert!(l_leftovers.is_empty());
}

#[test]
fn test_overwrite_shadow_success_replaces_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Target", vec![vec![s("a")]]), ("Keep", vec![])]);
    let manager = derive_manager(
        &dir,
        "test_overwrite_shadow_success",
        EnumSheetNameConflictStrategy::Rename,
        EnumOverwriteMode::Shadow,
    );

    let df = DataFrame::new(vec![Column::new("b".into(), &[2i64, 3])]).unwrap();
    manager.overwrite_sheet(&path, "Target", &df).unwrap();

    assert_eq!(manager.sheet_names(&path).unwrap(), vec!["Keep", "Target"]);
    assert_eq!(manager.get_table(&path, "Target").shape(), (2, 1));
}

#[cfg(unix)]
#[test]
fn test_overwrite_shadow_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Target", vec![vec![s("a")]])]);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    let manager = derive_manager(
        &dir,
        "test_overwrite_shadow_keeps_file_mode",
        EnumSheetNameConflictStrategy::Rename,
        EnumOverwriteMode::Shadow,
    );

    let df = DataFrame::new(vec![Column::new("b".into(), &[2i64])]).unwrap();
    manager.overwrite_sheet(&path, "Target", &df).unwrap();

    let n_mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(n_mode & 0o777, 0o644);
}

#[test]
fn test_append_table_adds_rows_without_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(
        &path,
        &[("Data", vec![vec![s("a"), s("b")], vec![n(0.0), n(0.0)]])],
    );
    let manager = derive_manager_default(&dir, "test_append_table_adds_rows");

    let df = DataFrame::new(vec![
        Column::new("a".into(), &[1i64, 2]),
        Column::new("b".into(), &[3i64, 4]),
    ])
    .unwrap();
    manager.append_table(&path, "Data", &df, None).unwrap();

    let df_read = manager.get_table(&path, "Data");
    assert_eq!(df_read.shape(), (3, 2));
    assert_eq!(df_read.get_column_names_str(), vec!["a", "b"]);

    let col_b = df_read.column("b").unwrap();
    assert_eq!(col_b.dtype(), &DataType::Int64);
    assert_eq!(col_b.get(0).unwrap(), AnyValue::Int64(0));
    assert_eq!(col_b.get(1).unwrap(), AnyValue::Int64(3));
    assert_eq!(col_b.get(2).unwrap(), AnyValue::Int64(4));
}

#[test]
fn test_append_table_creates_missing_sheet_at_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![])]);
    let manager = derive_manager_default(&dir, "test_append_table_creates_missing");

    let df = DataFrame::new(vec![
        Column::new("a".into(), &[1i64]),
        Column::new("b".into(), &[3i64]),
    ])
    .unwrap();
    manager.append_table(&path, "New", &df, None).unwrap();

    let workbook = load_workbook(&path).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Sheet1", "New"]);
    assert_eq!(
        workbook.sheet("New").unwrap().cells,
        vec![vec![n(1.0), n(3.0)]]
    );
}

#[test]
fn test_append_table_with_password_restores_protection() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Data", vec![vec![s("a")]])]);
    let manager = derive_manager_default(&dir, "test_append_table_with_password");

    manager
        .set_sheet_protection(&path, "Data", true, Some("pw"))
        .unwrap();
    let df = DataFrame::new(vec![Column::new("a".into(), &[5i64])]).unwrap();
    manager.append_table(&path, "Data", &df, Some("pw")).unwrap();

    assert_eq!(
        manager.sheet_protection(&path, "Data").unwrap(),
        SpecSheetProtection {
            if_protected: true,
            password_hash: Some("CF75".to_string()),
        }
    );
    assert_eq!(manager.get_table(&path, "Data").shape(), (1, 1));
}

#[test]
fn test_append_table_failure_leaves_protection_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Data", vec![vec![s("text")]])]);
    let log_name = "test_append_table_failure_protection";
    let manager = derive_manager_default(&dir, log_name);

    manager
        .set_sheet_protection(&path, "Data", true, Some("pw"))
        .unwrap();
    let err = manager
        .append_table(&path, "Data", &derive_overlong_table(), Some("pw"))
        .unwrap_err();
    assert!(matches!(err, ExcelError::Write(_)));

    assert!(!manager.sheet_protection(&path, "Data").unwrap().if_protected);

    let c_log = std::fs::read_to_string(dir.path().join(format!("{log_name}.log"))).unwrap();
    assert!(c_log.contains("WARNING - Append to Data failed; its protection stays disabled"));
    assert!(c_log.contains("ERROR - Unknown: xlsx write error"));
}

#[test]
fn test_set_sheet_protection_toggles() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Sheet1", vec![])]);
    let manager = derive_manager_default(&dir, "test_set_sheet_protection_toggles");

    manager
        .set_sheet_protection(&path, "Sheet1", true, Some("pw"))
        .unwrap();
    let protection = manager.sheet_protection(&path, "Sheet1").unwrap();
    assert!(protection.if_protected);
    assert_eq!(protection.password_hash.as_deref(), Some("CF75"));

    manager
        .set_sheet_protection(&path, "Sheet1", false, None)
        .unwrap();
    assert!(!manager.sheet_protection(&path, "Sheet1").unwrap().if_protected);

    let err = manager
        .set_sheet_protection(&path, "Missing", true, None)
        .unwrap_err();
    assert_eq!(err.kind(), EnumExcelErrorKind::SheetNotFound);
}

#[test]
fn test_protection_hash_survives_unrelated_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Locked", vec![vec![s("a")]]), ("Other", vec![])]);
    let manager = derive_manager_default(&dir, "test_protection_hash_survives");

    manager
        .set_sheet_protection(&path, "Locked", true, Some("password"))
        .unwrap();
    manager.create_sheet(&path, "Extra").unwrap();
    manager.reposition_sheet(&path, "Other").unwrap();

    assert_eq!(
        manager.sheet_protection(&path, "Locked").unwrap(),
        SpecSheetProtection {
            if_protected: true,
            password_hash: Some("83AF".to_string()),
        }
    );
    assert_eq!(manager.sheet_protection(&path, "Extra").unwrap(), SpecSheetProtection::default());
}

#[test]
fn test_log_level_applies_to_table_normalization() {
    let dir = tempfile::tempdir().unwrap();
    let path = derive_path(&dir);
    create_workbook(&path, &[("Data", vec![vec![s("a")], vec![n(1.0)]])]);
    let log_name = "test_log_level_applies_to_table_normalization";
    let path_log = dir.path().join(format!("{log_name}.log"));
    let manager = ExcelManager::new(SpecExcelManagerOptions {
        path_file_log: path_log.clone(),
        log_level: EnumLogLevel::Warning,
        log_name: log_name.to_string(),
        ..Default::default()
    })
    .unwrap();

    let df = manager.read_table(&path, "Data").unwrap();
    assert_eq!(df.shape(), (1, 1));
    assert!(manager.read_table(&path, "Missing").is_err());

    let c_log = std::fs::read_to_string(&path_log).unwrap();
    assert!(!c_log.contains(" - INFO - "));
    assert!(!c_log.contains("DateNormalizer initialized."));
    assert!(!c_log.contains("Datetime columns"));
    assert!(c_log.contains(" - ERROR - "));
}
