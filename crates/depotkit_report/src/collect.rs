//! Source discovery and per-file row extraction.
//!
//! Pipeline:
//! 1. Scan every workshop directory (configured order, deterministic walk).
//! 2. Read each file: match sheets to the target date and project rows onto
//!    the column table (serial, or a rayon pool when `num_workers_max > 1`).
//! 3. Fold per-file results in discovery order: failures are logged and
//!    recorded, rows go through the normalizer.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use depotkit_io_fs::{ReportScan, ScanTreeError, scan_tree};
use depotkit_io_xlsx::{
    EnumCellValue, SpecSheetGrid, SpecSheetTable, XlsxReader, derive_sheet_table,
};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::config::SpecReportConfig;
use crate::error::{ReportError, SourceFileError};
use crate::normalize::{
    EnumRowVerdict, SpecEmbeddedDateMatcher, derive_row_verdict, format_target_date,
};
use crate::report::ReportRunBuilder;
use crate::spec::{
    EnumQcMarkerRule, EnumSheetMatchRule, SpecCollectedRow, SpecColumnRef, SpecProductSchema,
    SpecRawRow, SpecSourceColumns, WorkshopCode,
};

/// One discovered source workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSourceFile {
    pub workshop: WorkshopCode,
    pub path: PathBuf,
}

/// Rows of one matched sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSourceSheet {
    pub sheet: String,
    pub rows: Vec<SpecRawRow>,
}

/// Read-only state shared by every file read of one run.
#[derive(Debug)]
pub struct SpecCollectContext<'a> {
    pub target_date: NaiveDate,
    pub schema: &'a SpecProductSchema,
    pub columns: &'a SpecSourceColumns,
    pub header_row_idx: usize,
    pub date_cell: (usize, usize),
    pub matcher: SpecEmbeddedDateMatcher,
}

impl<'a> SpecCollectContext<'a> {
    pub fn new(
        cfg: &'a SpecReportConfig,
        schema: &'a SpecProductSchema,
        target_date: NaiveDate,
    ) -> Result<Self, ReportError> {
        Ok(Self {
            target_date,
            schema,
            columns: &cfg.columns,
            header_row_idx: cfg.header_row_idx,
            date_cell: cfg.date_cell_index()?,
            matcher: SpecEmbeddedDateMatcher::new()?,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Discovery

/// List source files of every workshop, workshops in configured order.
///
/// Missing or unreadable workshop directories become warnings.
pub fn discover_source_files(
    cfg: &SpecReportConfig,
    builder_run: &mut ReportRunBuilder,
) -> Result<Vec<SpecSourceFile>, ReportError> {
    let mut l_sources = Vec::new();
    let mut report_scan = ReportScan::default();
    let spec_scan_options = cfg.derive_scan_options();
    for c_code in &cfg.workshops {
        let path_dir_workshop = cfg.input_root.join(c_code);
        let scan_result = match scan_tree(&path_dir_workshop, spec_scan_options.clone()) {
            Ok(scan_result) => scan_result,
            Err(ScanTreeError::RootNotDirectory(path)) => {
                builder_run.add_warning(format!(
                    "Workshop path is not a directory: {}",
                    path.display()
                ));
                continue;
            }
            Err(e) => return Err(ReportError::Config(e.to_string())),
        };
        tracing::debug!(
            "{}",
            scan_result.report.format(&format!("[SCAN {c_code}]"))
        );
        report_scan.absorb(scan_result.report);

        let workshop = WorkshopCode::new(c_code.as_str());
        l_sources.extend(scan_result.files.into_iter().map(|path| SpecSourceFile {
            workshop: workshop.clone(),
            path,
        }));
    }
    tracing::debug!("{report_scan}");
    builder_run.warnings.extend(report_scan.warnings);
    builder_run.add_counts(&["cnt_files_scanned"], l_sources.len() as u64);
    Ok(l_sources)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileRead

fn derive_column_idx(table: &SpecSheetTable, column: &SpecColumnRef) -> Option<usize> {
    table.position(&column.label).map(|col_idx| col_idx + column.offset)
}

fn derive_required_column_idx(
    table: &SpecSheetTable,
    column: &SpecColumnRef,
    path_file: &Path,
    sheet: &str,
) -> Result<usize, SourceFileError> {
    derive_column_idx(table, column).ok_or_else(|| SourceFileError::MissingColumn {
        path: path_file.to_path_buf(),
        sheet: sheet.to_string(),
        label: column.label.clone(),
    })
}

/// Project table rows onto the column table.
///
/// The locomotive and work-name columns are required, and so is the QC
/// marker column when the product requires the marker. Other absent
/// columns read as empty cells.
pub fn derive_raw_rows(
    table: &SpecSheetTable,
    ctx: &SpecCollectContext<'_>,
    path_file: &Path,
    sheet: &str,
) -> Result<Vec<SpecRawRow>, SourceFileError> {
    let columns = ctx.columns;
    let col_locomotive = derive_required_column_idx(table, &columns.locomotive, path_file, sheet)?;
    let col_work_name = derive_required_column_idx(table, &columns.work_name, path_file, sheet)?;
    let col_qc_marker = if ctx.schema.qc_marker == EnumQcMarkerRule::Require {
        Some(derive_required_column_idx(
            table,
            &columns.qc_marker,
            path_file,
            sheet,
        )?)
    } else {
        derive_column_idx(table, &columns.qc_marker)
    };
    let col_completion = derive_column_idx(table, &columns.completion);
    let col_time_start = derive_column_idx(table, &columns.time_start);
    let col_time_end = derive_column_idx(table, &columns.time_end);

    let take = |row: &[EnumCellValue], col_idx: Option<usize>| -> EnumCellValue {
        col_idx
            .and_then(|col_idx| row.get(col_idx))
            .cloned()
            .unwrap_or_default()
    };

    Ok(table
        .rows
        .iter()
        .map(|row| SpecRawRow {
            locomotive: take(row, Some(col_locomotive)),
            work_name: take(row, Some(col_work_name)),
            completion: take(row, col_completion),
            qc_marker: take(row, col_qc_marker),
            time_start: take(row, col_time_start),
            time_end: take(row, col_time_end),
        })
        .collect())
}

fn should_match_embedded_date(
    grid: &SpecSheetGrid,
    ctx: &SpecCollectContext<'_>,
    path_file: &Path,
) -> bool {
    let (row_idx, col_idx) = ctx.date_cell;
    match ctx.matcher.derive_embedded_date(grid.value(row_idx, col_idx)) {
        Some(date) => date == ctx.target_date,
        None => {
            tracing::debug!(
                "{}: sheet {:?} carries no date; skipped",
                path_file.display(),
                grid.name()
            );
            false
        }
    }
}

/// Open one source workbook and extract the rows of its matching sheets.
pub fn read_source_file(
    path_file: &Path,
    ctx: &SpecCollectContext<'_>,
) -> Result<Vec<SpecSourceSheet>, SourceFileError> {
    let mut reader = XlsxReader::open(path_file)?;

    let mut l_grids = Vec::new();
    match ctx.schema.sheet_match {
        EnumSheetMatchRule::SheetName => {
            let c_sheet = format_target_date(ctx.target_date);
            if reader.sheet_names().contains(&c_sheet) {
                l_grids.push(reader.read_sheet_values(&c_sheet)?);
            }
        }
        EnumSheetMatchRule::EmbeddedDate => {
            for c_sheet in reader.sheet_names() {
                let grid = reader.read_sheet_values(&c_sheet)?;
                if should_match_embedded_date(&grid, ctx, path_file) {
                    l_grids.push(grid);
                }
            }
        }
    }

    let mut l_sheets = Vec::with_capacity(l_grids.len());
    for grid in l_grids {
        let table = derive_sheet_table(&grid, ctx.header_row_idx);
        let rows = derive_raw_rows(&table, ctx, path_file, grid.name())?;
        tracing::debug!(
            "{}: sheet {:?} matched ({} rows)",
            path_file.display(),
            grid.name(),
            rows.len()
        );
        l_sheets.push(SpecSourceSheet {
            sheet: grid.name().to_string(),
            rows,
        });
    }
    Ok(l_sheets)
}

type SourceReadResult = Result<Vec<SpecSourceSheet>, SourceFileError>;

fn read_source_files_serial(
    l_sources: &[SpecSourceFile],
    ctx: &SpecCollectContext<'_>,
) -> Vec<SourceReadResult> {
    l_sources
        .iter()
        .map(|source| read_source_file(&source.path, ctx))
        .collect()
}

/// Read every source file; results keep discovery order.
pub fn read_source_files(
    l_sources: &[SpecSourceFile],
    ctx: &SpecCollectContext<'_>,
    n_workers_max: usize,
    builder_run: &mut ReportRunBuilder,
) -> Vec<SourceReadResult> {
    if n_workers_max <= 1 || l_sources.len() <= 1 {
        return read_source_files_serial(l_sources, ctx);
    }

    let thread_pool = ThreadPoolBuilder::new().num_threads(n_workers_max).build();
    let Ok(thread_pool) = thread_pool else {
        builder_run.add_warning(format!(
            "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial read."
        ));
        return read_source_files_serial(l_sources, ctx);
    };

    thread_pool.install(|| {
        l_sources
            .par_iter()
            .map(|source| read_source_file(&source.path, ctx))
            .collect()
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Fold

/// Discover, read and normalize every source row of one run.
///
/// The returned rows are in discovery order, then sheet order, then row
/// order, whatever the worker count.
pub fn collect_rows(
    cfg: &SpecReportConfig,
    ctx: &SpecCollectContext<'_>,
    builder_run: &mut ReportRunBuilder,
) -> Result<Vec<SpecCollectedRow>, ReportError> {
    let l_sources = discover_source_files(cfg, builder_run)?;
    tracing::info!(
        "Reading {} source file(s) for {}",
        l_sources.len(),
        format_target_date(ctx.target_date)
    );
    let l_results = read_source_files(&l_sources, ctx, cfg.num_workers_max, builder_run);

    let mut l_rows = Vec::new();
    for (source, res_read) in l_sources.iter().zip(l_results) {
        let l_sheets = match res_read {
            Ok(l_sheets) => l_sheets,
            Err(err) => {
                builder_run.add_source_error(&err);
                continue;
            }
        };
        builder_run.add_counts(&["cnt_files_read"], 1);
        builder_run.add_counts(&["cnt_sheets_matched"], l_sheets.len() as u64);

        for source_sheet in l_sheets {
            builder_run.add_counts(&["cnt_rows_read"], source_sheet.rows.len() as u64);
            for row_raw in &source_sheet.rows {
                match derive_row_verdict(row_raw, ctx.schema) {
                    EnumRowVerdict::Accepted(row) => {
                        builder_run.add_counts(&["cnt_rows_accepted"], 1);
                        l_rows.push(SpecCollectedRow {
                            workshop: source.workshop.clone(),
                            row,
                        });
                    }
                    EnumRowVerdict::Insignificant => {
                        builder_run.add_counts(&["cnt_rows_insignificant"], 1);
                    }
                    EnumRowVerdict::Excluded => {
                        builder_run.add_counts(&["cnt_rows_excluded"], 1);
                    }
                }
            }
        }
    }
    Ok(l_rows)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{derive_default_plan_schema, derive_default_qc_schema};

    fn derive_table(headers: &[&str], rows: Vec<Vec<EnumCellValue>>) -> SpecSheetTable {
        SpecSheetTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows,
        }
    }

    fn derive_context<'a>(
        cfg: &'a SpecReportConfig,
        schema: &'a SpecProductSchema,
    ) -> SpecCollectContext<'a> {
        let target_date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("date");
        SpecCollectContext::new(cfg, schema, target_date).expect("context")
    }

    #[test]
    fn raw_rows_follow_labels_and_offsets() {
        let cfg = SpecReportConfig::default();
        let schema = derive_default_plan_schema();
        let ctx = derive_context(&cfg, &schema);
        let table = derive_table(
            &[
                "Наименование",
                "№ тепловоза",
                "План",
                "Unnamed: 3",
                "Процент выполнения работы",
            ],
            vec![vec![
                EnumCellValue::from("Ремонт"),
                EnumCellValue::from("0042"),
                EnumCellValue::from("8:00"),
                EnumCellValue::from("12:00"),
                EnumCellValue::Number(0.25),
            ]],
        );

        let l_rows = derive_raw_rows(&table, &ctx, Path::new("a.xlsx"), "s").expect("rows");
        assert_eq!(l_rows.len(), 1);
        assert_eq!(l_rows[0].locomotive, EnumCellValue::from("0042"));
        assert_eq!(l_rows[0].time_start, EnumCellValue::from("8:00"));
        assert_eq!(l_rows[0].time_end, EnumCellValue::from("12:00"));
        assert_eq!(l_rows[0].completion, EnumCellValue::Number(0.25));
        assert!(l_rows[0].qc_marker.is_none());
    }

    #[test]
    fn missing_required_column_names_the_label() {
        let cfg = SpecReportConfig::default();
        let schema_plan = derive_default_plan_schema();
        let ctx = derive_context(&cfg, &schema_plan);
        let table = derive_table(&["№ тепловоза"], vec![]);
        let err = derive_raw_rows(&table, &ctx, Path::new("a.xlsx"), "s").expect_err("missing");
        assert!(matches!(
            err,
            SourceFileError::MissingColumn { ref label, .. } if label == "Наименование"
        ));

        let schema_qc = derive_default_qc_schema();
        let ctx_qc = derive_context(&cfg, &schema_qc);
        let table = derive_table(&["№ тепловоза", "Наименование"], vec![]);
        let err = derive_raw_rows(&table, &ctx_qc, Path::new("a.xlsx"), "s").expect_err("qc");
        assert!(matches!(
            err,
            SourceFileError::MissingColumn { ref label, .. }
                if label == "Количество номенклатуры предъявляемая ОТК"
        ));
    }

    #[test]
    fn unreadable_file_is_a_source_error() {
        let cfg = SpecReportConfig::default();
        let schema = derive_default_plan_schema();
        let ctx = derive_context(&cfg, &schema);
        let err = read_source_file(Path::new("/nonexistent/dir/file.xlsx"), &ctx)
            .expect_err("missing file");
        assert!(matches!(err, SourceFileError::Open { .. }));
    }

    #[test]
    fn missing_workshop_directories_are_warnings() {
        let cfg = SpecReportConfig {
            input_root: PathBuf::from("/nonexistent/depotkit-input"),
            workshops: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        let mut builder_run = ReportRunBuilder::default();
        let l_sources = discover_source_files(&cfg, &mut builder_run).expect("discover");
        assert!(l_sources.is_empty());
        assert_eq!(builder_run.warnings.len(), 2);
        assert_eq!(builder_run.cnt_files_scanned, 0);
    }
}
