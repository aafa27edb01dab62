//! Workbook reader backed by `calamine`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xlsx, open_workbook};

use crate::grid::SpecSheetGrid;
use crate::spec::{EnumCellValue, SpecCellMerge, XlsxReadError};
use crate::util::derive_datetime_from_excel_serial;

/// Header labels plus the data rows below them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetTable {
    /// Column labels; blank labels become `Unnamed: {col}` and repeats get a
    /// `.N` suffix.
    pub headers: Vec<String>,
    /// Data rows, each padded to `headers.len()`.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecSheetTable {
    /// Index of the first column whose label equals `label` (trimmed).
    pub fn position(&self, label: &str) -> Option<usize> {
        let label = label.trim();
        self.headers.iter().position(|header| header.trim() == label)
    }
}

/// Read-only handle on one `.xlsx` workbook.
pub struct XlsxReader {
    path_file: PathBuf,
    workbook: Xlsx<BufReader<File>>,
    if_merges_loaded: bool,
}

impl XlsxReader {
    /// Open a workbook.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XlsxReadError> {
        let path_file = path.as_ref().to_path_buf();
        let workbook: Xlsx<BufReader<File>> = open_workbook(&path_file).map_err(|e: calamine::XlsxError| XlsxReadError::Open {
            path: path_file.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path_file,
            workbook,
            if_merges_loaded: false,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// Read cell values of a sheet (no merges).
    pub fn read_sheet_values(&mut self, sheet: &str) -> Result<SpecSheetGrid, XlsxReadError> {
        let range = self
            .workbook
            .worksheet_range(sheet)
            .map_err(|e| self.derive_sheet_error(sheet, e.to_string()))?;

        let mut grid = SpecSheetGrid::new(sheet);
        let Some((n_row_offset, n_col_offset)) = range.start() else {
            return Ok(grid);
        };
        for (row_idx, col_idx, data) in range.used_cells() {
            let value = derive_cell_value_from_data(data);
            if value.is_none() {
                continue;
            }
            let n_row = row_idx + n_row_offset as usize;
            let n_col = col_idx + n_col_offset as usize;
            grid.write(n_row, n_col, value)
                .map_err(|message| self.derive_sheet_error(sheet, message))?;
        }
        Ok(grid)
    }

    /// Read cell values, formulas and merged ranges of a sheet.
    ///
    /// Formatting is not restored. Formula cells keep their cached value as
    /// the result. Merges Excel would refuse (single-cell or
    /// overlapping) are dropped with a debug log.
    pub fn read_sheet_grid(&mut self, sheet: &str) -> Result<SpecSheetGrid, XlsxReadError> {
        if !self.if_merges_loaded {
            self.workbook
                .load_merged_regions()
                .map_err(|e| self.derive_sheet_error(sheet, e.to_string()))?;
            self.if_merges_loaded = true;
        }

        let mut grid = self.read_sheet_values(sheet)?;
        self.read_sheet_formulas(sheet, &mut grid)?;
        let l_dimensions = match self.workbook.worksheet_merge_cells(sheet) {
            None => Vec::new(),
            Some(result) => result.map_err(|e| self.derive_sheet_error(sheet, e.to_string()))?,
        };
        for dimensions in l_dimensions {
            let merge = SpecCellMerge {
                row_idx_start: dimensions.start.0 as usize,
                row_idx_end: dimensions.end.0 as usize,
                col_idx_start: dimensions.start.1 as usize,
                col_idx_end: dimensions.end.1 as usize,
            };
            if let Err(message) = grid.merge(merge) {
                tracing::debug!("{}: {message}", self.path_file.display());
            }
        }
        Ok(grid)
    }

    fn read_sheet_formulas(
        &mut self,
        sheet: &str,
        grid: &mut SpecSheetGrid,
    ) -> Result<(), XlsxReadError> {
        let range = self
            .workbook
            .worksheet_formula(sheet)
            .map_err(|e| self.derive_sheet_error(sheet, e.to_string()))?;
        let Some((n_row_offset, n_col_offset)) = range.start() else {
            return Ok(());
        };
        for (row_idx, col_idx, c_formula) in range.used_cells() {
            if c_formula.trim().is_empty() {
                continue;
            }
            let n_row = row_idx + n_row_offset as usize;
            let n_col = col_idx + n_col_offset as usize;
            grid.set_formula(n_row, n_col, c_formula)
                .map_err(|message| self.derive_sheet_error(sheet, message))?;
        }
        Ok(())
    }

    fn derive_sheet_error(&self, sheet: &str, message: String) -> XlsxReadError {
        XlsxReadError::Sheet {
            path: self.path_file.clone(),
            sheet: sheet.to_string(),
            message,
        }
    }
}

/// Slice a grid into header labels and data rows.
///
/// Columns span `0..n_cols` of the whole grid; rows that are blank in every
/// column are skipped.
pub fn derive_sheet_table(grid: &SpecSheetGrid, header_row_idx: usize) -> SpecSheetTable {
    let n_cols = grid.n_cols();
    let mut dict_label_count: BTreeMap<String, usize> = BTreeMap::new();

    let mut headers = Vec::with_capacity(n_cols);
    for col_idx in 0..n_cols {
        let value = grid.value(header_row_idx, col_idx);
        let c_label = if value.is_blank() {
            format!("Unnamed: {col_idx}")
        } else {
            value.to_text().into_owned()
        };

        let n_seen = dict_label_count.entry(c_label.clone()).or_insert(0);
        let c_label_unique = if *n_seen == 0 {
            c_label
        } else {
            format!("{c_label}.{n_seen}")
        };
        *n_seen += 1;
        headers.push(c_label_unique);
    }

    let mut rows = Vec::new();
    for row_idx in (header_row_idx + 1)..grid.n_rows() {
        let row: Vec<EnumCellValue> = (0..n_cols)
            .map(|col_idx| grid.value(row_idx, col_idx).clone())
            .collect();
        if row.iter().all(EnumCellValue::is_none) {
            continue;
        }
        rows.push(row);
    }

    SpecSheetTable { headers, rows }
}

fn derive_cell_value_from_data(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty | Data::Error(_) => EnumCellValue::None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            EnumCellValue::String(s.clone())
        }
        Data::Float(n) => EnumCellValue::Number(*n),
        Data::Int(n) => EnumCellValue::Number(*n as f64),
        Data::Bool(b) => EnumCellValue::String(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match derive_datetime_from_excel_serial(serial) {
                Some(value) => EnumCellValue::DateTime(value),
                None => EnumCellValue::Number(serial),
            }
        }
    }
}
