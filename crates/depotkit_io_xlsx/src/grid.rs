//! In-memory worksheet/workbook model.
//!
//! `rust_xlsxwriter` only writes new files, so every workbook edit (restore,
//! replace a sheet, delete rows, reorder sheets) happens on this model and
//! [`crate::writer::XlsxWriter`] serializes the final state in one pass.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{C_SHEET_NAME_DEFAULT, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{EnumCellValue, SpecCellMerge};

////////////////////////////////////////////////////////////////////////////////
// #region SheetGrid

/// One stored cell: value, optional formula and optional format preset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecGridCell {
    /// Cell value; the cached result when `formula` is set.
    pub value: EnumCellValue,
    /// Format preset key, resolved by the writer.
    pub fmt_key: Option<String>,
    /// Formula text without the leading `=`.
    pub formula: Option<String>,
}

/// Sparse worksheet: `(row, col) -> cell`, merged ranges and column widths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetGrid {
    name: String,
    dict_cells: BTreeMap<(usize, usize), SpecGridCell>,
    l_merges: Vec<SpecCellMerge>,
    dict_col_widths: BTreeMap<usize, f64>,
}

impl SpecSheetGrid {
    /// Create an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a value, keeping the cell's current format.
    pub fn write(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        value: impl Into<EnumCellValue>,
    ) -> Result<(), String> {
        validate_cell_index(row_idx, col_idx)?;
        self.dict_cells.entry((row_idx, col_idx)).or_default().value = value.into();
        Ok(())
    }

    /// Write a value together with its format preset.
    pub fn write_with_format(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        value: impl Into<EnumCellValue>,
        fmt_key: &str,
    ) -> Result<(), String> {
        validate_cell_index(row_idx, col_idx)?;
        self.dict_cells.insert(
            (row_idx, col_idx),
            SpecGridCell {
                value: value.into(),
                fmt_key: Some(fmt_key.to_string()),
                formula: None,
            },
        );
        Ok(())
    }

    /// Set the format preset of a cell, creating a blank cell if absent.
    pub fn set_format(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        fmt_key: &str,
    ) -> Result<(), String> {
        validate_cell_index(row_idx, col_idx)?;
        self.dict_cells.entry((row_idx, col_idx)).or_default().fmt_key = Some(fmt_key.to_string());
        Ok(())
    }

    /// Attach a formula to a cell, keeping its value as the cached result.
    pub fn set_formula(
        &mut self,
        row_idx: usize,
        col_idx: usize,
        formula: &str,
    ) -> Result<(), String> {
        validate_cell_index(row_idx, col_idx)?;
        let c_formula = formula.trim().trim_start_matches('=').to_string();
        self.dict_cells.entry((row_idx, col_idx)).or_default().formula = Some(c_formula);
        Ok(())
    }

    /// Stored cell at `(row_idx, col_idx)`.
    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<&SpecGridCell> {
        self.dict_cells.get(&(row_idx, col_idx))
    }

    /// Value at `(row_idx, col_idx)`; [`EnumCellValue::None`] when absent.
    pub fn value(&self, row_idx: usize, col_idx: usize) -> &EnumCellValue {
        static VALUE_NONE: EnumCellValue = EnumCellValue::None;
        self.dict_cells
            .get(&(row_idx, col_idx))
            .map(|cell| &cell.value)
            .unwrap_or(&VALUE_NONE)
    }

    /// Stored cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&(usize, usize), &SpecGridCell)> {
        self.dict_cells.iter()
    }

    /// Add a merged range.
    ///
    /// Single-cell ranges and ranges overlapping an existing merge are
    /// rejected, since Excel refuses both.
    pub fn merge(&mut self, merge: SpecCellMerge) -> Result<(), String> {
        if merge.row_idx_start > merge.row_idx_end || merge.col_idx_start > merge.col_idx_end {
            return Err(format!("Inverted merge range: {merge:?}"));
        }
        validate_cell_index(merge.row_idx_end, merge.col_idx_end)?;
        if merge.is_single_cell() {
            return Err(format!("Single-cell merge ignored: {merge:?}"));
        }
        if let Some(existing) = self.l_merges.iter().find(|m| m.overlaps(&merge)) {
            return Err(format!(
                "Merge {merge:?} overlaps existing merge {existing:?} on sheet {:?}",
                self.name
            ));
        }
        self.l_merges.push(merge);
        Ok(())
    }

    /// Merged ranges in insertion order.
    pub fn merges(&self) -> &[SpecCellMerge] {
        &self.l_merges
    }

    /// Set column width in Excel character units.
    pub fn set_col_width(&mut self, col_idx: usize, width: f64) {
        self.dict_col_widths.insert(col_idx, width);
    }

    /// Column widths by column index.
    pub fn col_widths(&self) -> &BTreeMap<usize, f64> {
        &self.dict_col_widths
    }

    /// Number of used rows (last used row index + 1), counting merges.
    pub fn n_rows(&self) -> usize {
        let n_rows_cells = self.dict_cells.keys().map(|(r, _)| r + 1).max().unwrap_or(0);
        let n_rows_merges = self.l_merges.iter().map(|m| m.row_idx_end + 1).max().unwrap_or(0);
        usize::max(n_rows_cells, n_rows_merges)
    }

    /// Number of used columns (last used column index + 1), counting merges.
    pub fn n_cols(&self) -> usize {
        let n_cols_cells = self.dict_cells.keys().map(|(_, c)| c + 1).max().unwrap_or(0);
        let n_cols_merges = self.l_merges.iter().map(|m| m.col_idx_end + 1).max().unwrap_or(0);
        usize::max(n_cols_cells, n_cols_merges)
    }

    /// `true` when no cell holds a value or formula and nothing is merged.
    pub fn is_empty(&self) -> bool {
        self.l_merges.is_empty()
            && self
                .dict_cells
                .values()
                .all(|cell| cell.value.is_none() && cell.formula.is_none())
    }

    /// Delete one row, shifting everything below it up by one.
    ///
    /// Merges covering the row shrink; merges that collapse to a single cell
    /// or lie entirely on the row are dropped.
    pub fn delete_row(&mut self, row_idx: usize) {
        let dict_cells = std::mem::take(&mut self.dict_cells);
        self.dict_cells = dict_cells
            .into_iter()
            .filter_map(|((r, c), cell)| match r.cmp(&row_idx) {
                std::cmp::Ordering::Less => Some(((r, c), cell)),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(((r - 1, c), cell)),
            })
            .collect();

        let l_merges = std::mem::take(&mut self.l_merges);
        self.l_merges = l_merges
            .into_iter()
            .filter_map(|mut merge| {
                if merge.row_idx_end < row_idx {
                    return Some(merge);
                }
                if merge.row_idx_start > row_idx {
                    merge.row_idx_start -= 1;
                    merge.row_idx_end -= 1;
                    return Some(merge);
                }
                if merge.row_idx_start == merge.row_idx_end {
                    return None;
                }
                merge.row_idx_end -= 1;
                (!merge.is_single_cell()).then_some(merge)
            })
            .collect();
    }
}

fn validate_cell_index(row_idx: usize, col_idx: usize) -> Result<(), String> {
    if row_idx >= N_NROWS_EXCEL_MAX {
        return Err(format!("row index overflow: {row_idx}"));
    }
    if col_idx >= N_NCOLS_EXCEL_MAX {
        return Err(format!("column index overflow: {col_idx}"));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workbook

/// Ordered collection of sheets with unique names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbook {
    l_sheets: Vec<SpecSheetGrid>,
}

impl SpecWorkbook {
    /// Create an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Workbook as a fresh spreadsheet application would create it: one empty
    /// default sheet.
    pub fn with_default_sheet() -> Self {
        Self {
            l_sheets: vec![SpecSheetGrid::new(C_SHEET_NAME_DEFAULT)],
        }
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &[SpecSheetGrid] {
        &self.l_sheets
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.l_sheets.iter().map(SpecSheetGrid::name).collect()
    }

    /// Number of sheets.
    pub fn len(&self) -> usize {
        self.l_sheets.len()
    }

    /// `true` when the workbook holds no sheet.
    pub fn is_empty(&self) -> bool {
        self.l_sheets.is_empty()
    }

    /// Position of the sheet named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.l_sheets.iter().position(|sheet| sheet.name() == name)
    }

    /// Sheet named `name`.
    pub fn sheet(&self, name: &str) -> Option<&SpecSheetGrid> {
        self.l_sheets.iter().find(|sheet| sheet.name() == name)
    }

    /// Append a sheet; fails when the name is already taken.
    pub fn push_sheet(&mut self, sheet: SpecSheetGrid) -> Result<&mut SpecSheetGrid, String> {
        if self.position(sheet.name()).is_some() {
            return Err(format!("Sheet already exists: {:?}", sheet.name()));
        }
        self.l_sheets.push(sheet);
        let n_idx_last = self.l_sheets.len() - 1;
        Ok(&mut self.l_sheets[n_idx_last])
    }

    /// Remove and return the sheet named `name`.
    pub fn remove_sheet(&mut self, name: &str) -> Option<SpecSheetGrid> {
        let n_idx = self.position(name)?;
        Some(self.l_sheets.remove(n_idx))
    }

    /// Reorder sheets so that new position `i` holds old sheet `order[i]`.
    pub fn reorder(&mut self, order: &[usize]) -> Result<(), String> {
        let set_idx: BTreeSet<usize> = order.iter().copied().collect();
        if order.len() != self.l_sheets.len()
            || set_idx.len() != order.len()
            || set_idx.iter().any(|idx| *idx >= self.l_sheets.len())
        {
            return Err(format!(
                "Sheet order {order:?} is not a permutation of {} sheets",
                self.l_sheets.len()
            ));
        }

        let mut l_slots: Vec<Option<SpecSheetGrid>> =
            std::mem::take(&mut self.l_sheets).into_iter().map(Some).collect();
        self.l_sheets = order
            .iter()
            .filter_map(|idx| l_slots[*idx].take())
            .collect();
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_format_are_independent() {
        let mut grid = SpecSheetGrid::new("01.02");
        grid.set_format(0, 0, "text").expect("format");
        grid.write(0, 0, "A").expect("write");
        let cell = grid.cell(0, 0).expect("cell");
        assert_eq!(cell.value, EnumCellValue::from("A"));
        assert_eq!(cell.fmt_key.as_deref(), Some("text"));
        assert_eq!(grid.value(5, 5), &EnumCellValue::None);
        assert_eq!(grid.n_rows(), 1);
        assert_eq!(grid.n_cols(), 1);
    }

    #[test]
    fn merge_rejects_single_cell_and_overlap() {
        let mut grid = SpecSheetGrid::new("s");
        assert!(grid.merge(SpecCellMerge::vertical(0, 1, 1)).is_err());
        grid.merge(SpecCellMerge::vertical(0, 1, 3)).expect("merge");
        assert!(grid.merge(SpecCellMerge::vertical(0, 3, 4)).is_err());
        grid.merge(SpecCellMerge::vertical(1, 1, 2)).expect("nested column");
        assert_eq!(grid.merges().len(), 2);
    }

    #[test]
    fn delete_row_shifts_cells_and_merges() {
        let mut grid = SpecSheetGrid::new("s");
        for row_idx in 0..5 {
            grid.write(row_idx, 0, format!("r{row_idx}")).expect("write");
        }
        grid.merge(SpecCellMerge::vertical(1, 0, 1)).expect("merge");
        grid.merge(SpecCellMerge::vertical(1, 2, 4)).expect("merge");
        grid.merge(SpecCellMerge::horizontal(3, 2, 4)).expect("merge");

        grid.delete_row(3);

        assert_eq!(grid.value(2, 0), &EnumCellValue::from("r2"));
        assert_eq!(grid.value(3, 0), &EnumCellValue::from("r4"));
        assert_eq!(grid.n_rows(), 4);
        assert_eq!(
            grid.merges(),
            &[SpecCellMerge::vertical(1, 0, 1), SpecCellMerge::vertical(1, 2, 3)]
        );

        grid.delete_row(0);
        assert_eq!(grid.merges(), &[SpecCellMerge::vertical(1, 1, 2)]);
    }

    #[test]
    fn empty_sheet_ignores_format_only_cells() {
        let mut grid = SpecSheetGrid::new(C_SHEET_NAME_DEFAULT);
        assert!(grid.is_empty());
        grid.set_format(0, 0, "text").expect("format");
        assert!(grid.is_empty());
        grid.write(0, 0, 1.0).expect("write");
        assert!(!grid.is_empty());
    }

    #[test]
    fn workbook_push_remove_reorder() {
        let mut workbook = SpecWorkbook::with_default_sheet();
        workbook.push_sheet(SpecSheetGrid::new("02.01")).expect("push");
        workbook.push_sheet(SpecSheetGrid::new("01.01")).expect("push");
        assert!(workbook.push_sheet(SpecSheetGrid::new("01.01")).is_err());

        workbook.reorder(&[0, 2, 1]).expect("reorder");
        assert_eq!(workbook.sheet_names(), vec!["Sheet", "01.01", "02.01"]);
        assert!(workbook.reorder(&[0, 0, 1]).is_err());

        let removed = workbook.remove_sheet("Sheet").expect("removed");
        assert_eq!(removed.name(), "Sheet");
        assert_eq!(workbook.position("02.01"), Some(1));
        assert!(workbook.remove_sheet("Sheet").is_none());
    }
}
