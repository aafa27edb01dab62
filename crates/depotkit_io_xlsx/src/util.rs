//! Stateless helper utilities shared by the reader, the writer and renderers.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::conf::{
    C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL,
};
use crate::spec::SpecCellMerge;

////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = C_SHEET_NAME_DEFAULT.to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Create suffixed sheet name (`base__2`, `base__3`, ...) not yet in `existing`.
pub fn derive_unique_sheet_name(name: &str, existing: &BTreeSet<String>) -> String {
    if !existing.contains(name) {
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if !existing.contains(&candidate) {
            return candidate;
        }
        n_idx += 1;
    }
}

/// Convert an `A1`-style reference to zero-based `(row, col)`.
pub fn derive_cell_index_from_ref(cell_ref: &str) -> Option<(usize, usize)> {
    let cell_ref = cell_ref.trim();
    let n_letters = cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if n_letters == 0 || n_letters > 3 {
        return None;
    }
    let (c_col, c_row) = cell_ref.split_at(n_letters);
    if c_row.is_empty() || !c_row.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut n_col = 0usize;
    for chr in c_col.chars() {
        n_col = n_col * 26 + (chr.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let n_row: usize = c_row.parse().ok()?;
    if n_row == 0 || n_row > N_NROWS_EXCEL_MAX || n_col > N_NCOLS_EXCEL_MAX {
        return None;
    }
    Some((n_row - 1, n_col - 1))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergeUtils

/// Contiguous runs of equal, non-empty keys as inclusive `(start, end)` index
/// pairs; only runs of two or more entries are returned.
pub fn derive_vertical_runs<T: PartialEq>(keys: &[Option<T>]) -> Vec<(usize, usize)> {
    let mut l_runs = Vec::new();
    let n_len = keys.len();

    let mut n_idx_start = 0;
    while n_idx_start < n_len {
        let Some(key_current) = &keys[n_idx_start] else {
            n_idx_start += 1;
            continue;
        };

        let mut n_idx_next = n_idx_start + 1;
        while n_idx_next < n_len && keys[n_idx_next].as_ref() == Some(key_current) {
            n_idx_next += 1;
        }

        if n_idx_next - n_idx_start > 1 {
            l_runs.push((n_idx_start, n_idx_next - 1));
        }
        n_idx_start = n_idx_next;
    }

    l_runs
}

/// Cells covered by a merge, excluding each merge's top-left anchor.
pub fn derive_merge_tracker(merges: &[SpecCellMerge]) -> BTreeSet<(usize, usize)> {
    let mut set_covered = BTreeSet::new();
    for merge in merges {
        for row_idx in merge.row_idx_start..=merge.row_idx_end {
            for col_idx in merge.col_idx_start..=merge.col_idx_end {
                if (row_idx, col_idx) != (merge.row_idx_start, merge.col_idx_start) {
                    set_covered.insert((row_idx, col_idx));
                }
            }
        }
    }
    set_covered
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExcelSerialDates

fn derive_excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Convert an Excel serial date (1900 date system) to a calendar date-time.
pub fn derive_datetime_from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let n_ms = (serial * 86_400_000.0).round() as i64;
    derive_excel_epoch()?.checked_add_signed(TimeDelta::try_milliseconds(n_ms)?)
}

/// Convert a calendar date-time to an Excel serial date (1900 date system).
pub fn derive_excel_serial_from_datetime(value: &NaiveDateTime) -> Option<f64> {
    let delta = value.signed_duration_since(derive_excel_epoch()?);
    Some(delta.num_milliseconds() as f64 / 86_400_000.0)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

pub(crate) fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

pub(crate) fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_vertical_runs_detects_only_contiguous_non_empty_runs() {
        let keys = vec![
            Some("A"),
            Some("A"),
            Some("A"),
            None,
            Some("B"),
            Some("B"),
            Some("C"),
        ];
        assert_eq!(derive_vertical_runs(&keys), vec![(0, 2), (4, 5)]);
        assert!(derive_vertical_runs::<&str>(&[]).is_empty());
        assert!(derive_vertical_runs(&[Some(1)]).is_empty());
    }

    #[test]
    fn test_derive_merge_tracker_skips_anchor() {
        let set_covered = derive_merge_tracker(&[
            SpecCellMerge::vertical(0, 2, 4),
            SpecCellMerge::horizontal(0, 0, 1),
        ]);
        assert_eq!(
            set_covered.into_iter().collect::<Vec<_>>(),
            vec![(0, 1), (3, 0), (4, 0)]
        );
    }

    #[test]
    fn test_sanitize_and_unique_sheet_names() {
        assert_eq!(sanitize_sheet_name("01/02", "_"), "01_02");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");

        let existing: BTreeSet<String> = ["01.02".to_string(), "01.02__2".to_string()].into();
        assert_eq!(derive_unique_sheet_name("01.02", &existing), "01.02__3");
        assert_eq!(derive_unique_sheet_name("03.02", &existing), "03.02");
    }

    #[test]
    fn test_cell_refs() {
        assert_eq!(derive_cell_index_from_ref("A1"), Some((0, 0)));
        assert_eq!(derive_cell_index_from_ref("c12"), Some((11, 2)));
        assert_eq!(derive_cell_index_from_ref("AA3"), Some((2, 26)));
        assert_eq!(derive_cell_index_from_ref("A0"), None);
        assert_eq!(derive_cell_index_from_ref("12"), None);
        assert_eq!(derive_cell_index_from_ref("A1B"), None);
    }

    #[test]
    fn test_excel_serial_conversion() {
        let dt = derive_datetime_from_excel_serial(45_292.5).expect("serial");
        assert_eq!(dt.format("%d.%m.%Y %H:%M").to_string(), "01.01.2024 12:00");
        let serial = derive_excel_serial_from_datetime(&dt).expect("serial back");
        assert!((serial - 45_292.5).abs() < 1e-9);
        assert!(derive_datetime_from_excel_serial(f64::NAN).is_none());
    }
}
