//! Dated sheet layout: titles, header, body rows, key-run merges, cleanup.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use depotkit_io_xlsx::util::derive_vertical_runs;
use depotkit_io_xlsx::{EnumCellValue, EnumFmtKey, SpecCellMerge, SpecSheetGrid};

use crate::conf::L_PLACEHOLDERS;
use crate::error::ReportError;
use crate::spec::{EnumOutputField, EnumQuantity, SpecProductSchema, SpecReportRow};

/// Counters of one rendered sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecLayoutStats {
    /// Body rows kept after trailing cleanup.
    pub n_rows_body: usize,
    /// Trailing rows removed by cleanup.
    pub n_rows_trimmed: usize,
    /// Key-run merges applied.
    pub n_merges: usize,
}

////////////////////////////////////////////////////////////////////////////////
// #region FieldValues

/// Cell value of `field` for one output row.
pub fn derive_field_value(row: &SpecReportRow, field: EnumOutputField) -> EnumCellValue {
    let item = &row.item;
    match field {
        EnumOutputField::Locomotive => EnumCellValue::from(row.locomotive.as_str()),
        EnumOutputField::ProductNumber => EnumCellValue::from(item.product_number.as_str()),
        EnumOutputField::Workshop => EnumCellValue::from(row.workshop.as_str()),
        EnumOutputField::WorkName => EnumCellValue::from(item.work_name.as_str()),
        EnumOutputField::Completion => match item.completion {
            Some(n_percent) => EnumCellValue::String(format!("{n_percent}%")),
            None => EnumCellValue::from(""),
        },
        EnumOutputField::TimeStart => EnumCellValue::from(item.time_start.as_str()),
        EnumOutputField::TimeEnd => EnumCellValue::from(item.time_end.as_str()),
        EnumOutputField::Quantity => match &item.quantity {
            Some(EnumQuantity::Count(n_count)) => EnumCellValue::Number(*n_count as f64),
            Some(EnumQuantity::Text(c_text)) => EnumCellValue::from(c_text.as_str()),
            None => EnumCellValue::None,
        },
        EnumOutputField::Blank => EnumCellValue::None,
    }
}

/// Grouping key of `field`; `None` for fields that never merge.
fn derive_field_key(row: &SpecReportRow, field: EnumOutputField) -> Option<String> {
    match field {
        EnumOutputField::Blank => None,
        EnumOutputField::Locomotive => Some(row.locomotive.as_str().to_string()),
        EnumOutputField::Workshop => Some(row.workshop.as_str().to_string()),
        _ => Some(derive_field_value(row, field).to_text().into_owned()),
    }
}

/// Render a chrono template against `date`.
pub fn render_title(template: &str, date: NaiveDate) -> Result<String, String> {
    let l_items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if l_items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("Invalid date template {template:?}"));
    }
    let mut c_title = String::new();
    write!(c_title, "{}", date.format_with_items(l_items.into_iter()))
        .map_err(|_| format!("Failed to render date template {template:?}"))?;
    Ok(c_title)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Merges

/// Inclusive `(start, end)` row-index runs per merge level.
///
/// Level 0 runs over all rows; every deeper level runs independently inside
/// each run (or single row) of its parent, so runs nest and never overlap.
/// Only runs of two or more rows are returned.
pub fn derive_key_runs(
    rows: &[SpecReportRow],
    merge_levels: &[EnumOutputField],
) -> Vec<Vec<(usize, usize)>> {
    let mut l_runs_by_level = vec![Vec::new(); merge_levels.len()];
    collect_key_runs(rows, merge_levels, 0, 0, rows.len(), &mut l_runs_by_level);
    l_runs_by_level
}

fn collect_key_runs(
    rows: &[SpecReportRow],
    merge_levels: &[EnumOutputField],
    n_level: usize,
    n_idx_start: usize,
    n_idx_end: usize,
    l_runs_by_level: &mut [Vec<(usize, usize)>],
) {
    let Some(field) = merge_levels.get(n_level) else {
        return;
    };
    let l_keys: Vec<Option<String>> = rows[n_idx_start..n_idx_end]
        .iter()
        .map(|row| derive_field_key(row, *field))
        .collect();

    // Every parent segment, including single rows, bounds the next level.
    let mut n_idx_seg = n_idx_start;
    for (n_run_start, n_run_end) in derive_vertical_runs(&l_keys) {
        let (n_abs_start, n_abs_end) = (n_idx_start + n_run_start, n_idx_start + n_run_end);
        for n_idx_single in n_idx_seg..n_abs_start {
            collect_key_runs(
                rows,
                merge_levels,
                n_level + 1,
                n_idx_single,
                n_idx_single + 1,
                l_runs_by_level,
            );
        }
        l_runs_by_level[n_level].push((n_abs_start, n_abs_end));
        collect_key_runs(
            rows,
            merge_levels,
            n_level + 1,
            n_abs_start,
            n_abs_end + 1,
            l_runs_by_level,
        );
        n_idx_seg = n_abs_end + 1;
    }
    for n_idx_single in n_idx_seg..n_idx_end {
        collect_key_runs(
            rows,
            merge_levels,
            n_level + 1,
            n_idx_single,
            n_idx_single + 1,
            l_runs_by_level,
        );
    }
}

/// Vertical merges for the key runs of `rows` laid out from `row_idx_start`.
pub fn plan_key_run_merges(
    rows: &[SpecReportRow],
    schema: &SpecProductSchema,
    row_idx_start: usize,
) -> Vec<SpecCellMerge> {
    let l_runs_by_level = derive_key_runs(rows, &schema.merge_levels);
    let mut l_merges = Vec::new();
    for (field, l_runs) in schema.merge_levels.iter().zip(l_runs_by_level) {
        let Some(col_idx) = schema.column_of(*field) else {
            continue;
        };
        for (n_start, n_end) in l_runs {
            l_merges.push(SpecCellMerge::vertical(
                col_idx,
                row_idx_start + n_start,
                row_idx_start + n_end,
            ));
        }
    }
    l_merges
}

/// Rows whose merge-level cell repeats the key of the row above within the
/// same run; those cells stay blank.
fn derive_covered_cells(
    rows: &[SpecReportRow],
    schema: &SpecProductSchema,
) -> BTreeSet<(usize, usize)> {
    let l_runs_by_level = derive_key_runs(rows, &schema.merge_levels);
    let mut set_covered = BTreeSet::new();
    for (field, l_runs) in schema.merge_levels.iter().zip(l_runs_by_level) {
        let Some(col_idx) = schema.column_of(*field) else {
            continue;
        };
        for (n_start, n_end) in l_runs {
            for n_idx in (n_start + 1)..=n_end {
                set_covered.insert((n_idx, col_idx));
            }
        }
    }
    set_covered
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Cleanup

fn is_placeholder_cell(value: &EnumCellValue, workshops: &[String]) -> bool {
    if value.is_none() {
        return true;
    }
    let c_text = value.to_text();
    let c_text = c_text.trim();
    c_text.is_empty()
        || L_PLACEHOLDERS.contains(&c_text)
        || workshops.iter().any(|c_code| c_code == c_text)
}

/// Remove trailing rows whose cells in `0..n_cols` are all empty, a lone
/// `_`/`-` or exactly one workshop code.
///
/// Scans upward from the last row and stops at the first row with content or
/// at `row_idx_first`; rows above it are never touched. Returns the number of
/// removed rows.
pub fn trim_trailing_rows(
    grid: &mut SpecSheetGrid,
    row_idx_first: usize,
    n_cols: usize,
    workshops: &[String],
) -> usize {
    let mut n_removed = 0;
    while grid.n_rows() > row_idx_first {
        let row_idx_last = grid.n_rows() - 1;
        let if_removable = (0..n_cols)
            .all(|col_idx| is_placeholder_cell(grid.value(row_idx_last, col_idx), workshops));
        if !if_removable {
            break;
        }
        grid.delete_row(row_idx_last);
        n_removed += 1;
    }
    n_removed
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Render

fn derive_err_render(grid: &SpecSheetGrid, message: String) -> ReportError {
    ReportError::Render {
        sheet: grid.name().to_string(),
        message,
    }
}

fn derive_full_width_merge(row_idx: usize, n_cols: usize) -> Option<SpecCellMerge> {
    (n_cols > 1).then(|| SpecCellMerge::horizontal(row_idx, 0, n_cols - 1))
}

fn derive_body_fmt(schema: &SpecProductSchema, col_idx: usize) -> &str {
    schema.columns[col_idx]
        .fmt
        .as_deref()
        .unwrap_or(EnumFmtKey::Text.as_str())
}

fn write_full_width_line(
    grid: &mut SpecSheetGrid,
    row_idx: usize,
    n_cols: usize,
    text: String,
    fmt_key: &str,
) -> Result<(), ReportError> {
    grid.write_with_format(row_idx, 0, text, fmt_key)
        .map_err(|message| derive_err_render(grid, message))?;
    if let Some(merge) = derive_full_width_merge(row_idx, n_cols) {
        grid.merge(merge)
            .map_err(|message| derive_err_render(grid, message))?;
    }
    Ok(())
}

/// Build a fresh dated sheet for `rows`.
pub fn render_dated_sheet(
    sheet_name: &str,
    target_date: NaiveDate,
    rows: &[SpecReportRow],
    schema: &SpecProductSchema,
    workshops: &[String],
) -> Result<(SpecSheetGrid, SpecLayoutStats), ReportError> {
    let mut grid = SpecSheetGrid::new(sheet_name);
    let n_cols = schema.columns.len();

    for (row_idx, title) in schema.titles.iter().enumerate() {
        let c_title =
            render_title(&title.template, target_date).map_err(|e| derive_err_render(&grid, e))?;
        write_full_width_line(&mut grid, row_idx, n_cols, c_title, &title.fmt)?;
    }

    let row_idx_header = schema.header_row_idx();
    for (col_idx, column) in schema.columns.iter().enumerate() {
        grid.set_col_width(col_idx, column.width);
        grid.write_with_format(
            row_idx_header,
            col_idx,
            column.caption.as_str(),
            EnumFmtKey::Header.as_str(),
        )
        .map_err(|message| derive_err_render(&grid, message))?;
    }

    let row_idx_body = row_idx_header + 1;
    let set_covered = derive_covered_cells(rows, schema);
    for (n_idx, row) in rows.iter().enumerate() {
        for (col_idx, column) in schema.columns.iter().enumerate() {
            let fmt_key = derive_body_fmt(schema, col_idx);
            let res_write = if set_covered.contains(&(n_idx, col_idx)) {
                grid.set_format(row_idx_body + n_idx, col_idx, fmt_key)
            } else {
                grid.write_with_format(
                    row_idx_body + n_idx,
                    col_idx,
                    derive_field_value(row, column.field),
                    fmt_key,
                )
            };
            res_write.map_err(|message| derive_err_render(&grid, message))?;
        }
    }

    let l_merges = plan_key_run_merges(rows, schema, row_idx_body);
    let n_merges = l_merges.len();
    for merge in l_merges {
        grid.merge(merge)
            .map_err(|message| derive_err_render(&grid, message))?;
    }

    let n_rows_trimmed = trim_trailing_rows(&mut grid, row_idx_body, n_cols, workshops);
    let n_rows_body = grid.n_rows().saturating_sub(row_idx_body);

    if let Some(c_footer) = &schema.footer {
        let row_idx_footer = row_idx_body + n_rows_body;
        write_full_width_line(
            &mut grid,
            row_idx_footer,
            n_cols,
            c_footer.clone(),
            EnumFmtKey::Signature.as_str(),
        )?;
    }

    Ok((
        grid,
        SpecLayoutStats {
            n_rows_body,
            n_rows_trimmed,
            n_merges,
        },
    ))
}

/// Re-apply the product's widths and formats to a sheet restored from disk.
///
/// Restored sheets carry values, formulas and merges but no formats. Title
/// rows get their title formats, the header row the header format, a trailing
/// footer line the signature format, and every other cell below the header
/// its column's body format.
///
/// Assumes the sheet was rendered by this product with the current schema.
/// The caller applies it to every `dd.mm` sheet of the output workbook, so a
/// hand-made sheet with a date-like name is restyled as a report too.
pub fn restyle_restored_sheet(grid: &mut SpecSheetGrid, schema: &SpecProductSchema) {
    let n_cols = schema.columns.len();
    for (col_idx, column) in schema.columns.iter().enumerate() {
        grid.set_col_width(col_idx, column.width);
    }

    let row_idx_header = schema.header_row_idx();
    let n_rows = grid.n_rows();
    let row_idx_footer = match &schema.footer {
        Some(c_footer) if n_rows > row_idx_header + 1 => {
            let row_idx_last = n_rows - 1;
            (grid.value(row_idx_last, 0).to_text().trim() == c_footer.trim())
                .then_some(row_idx_last)
        }
        _ => None,
    };

    let mut l_updates: Vec<(usize, usize, String)> = Vec::new();
    for (row_idx, title) in schema.titles.iter().enumerate() {
        if grid.cell(row_idx, 0).is_some() {
            l_updates.push((row_idx, 0, title.fmt.clone()));
        }
    }
    for row_idx in row_idx_header..n_rows {
        for col_idx in 0..n_cols {
            let fmt_key = if row_idx == row_idx_header {
                EnumFmtKey::Header.as_str()
            } else if Some(row_idx) == row_idx_footer {
                if col_idx > 0 {
                    continue;
                }
                EnumFmtKey::Signature.as_str()
            } else {
                derive_body_fmt(schema, col_idx)
            };
            l_updates.push((row_idx, col_idx, fmt_key.to_string()));
        }
    }

    for (row_idx, col_idx, fmt_key) in l_updates {
        if let Err(message) = grid.set_format(row_idx, col_idx, &fmt_key) {
            tracing::debug!("Restyle of sheet {:?} skipped a cell: {message}", grid.name());
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::{derive_default_plan_schema, derive_default_qc_schema};
    use crate::spec::{LocomotiveNumber, SpecWorkItem, WorkshopCode};

    fn derive_row(locomotive: &str, workshop: &str, work_name: &str) -> SpecReportRow {
        SpecReportRow {
            locomotive: LocomotiveNumber::new(locomotive),
            workshop: WorkshopCode::new(workshop),
            item: SpecWorkItem {
                work_name: work_name.to_string(),
                ..Default::default()
            },
        }
    }

    fn derive_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).expect("date")
    }

    fn derive_workshops() -> Vec<String> {
        ["ЦКТ", "ЦПМ", "МСЦ", "ЭМУ"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn locomotive_runs_of_two_or_more_rows_merge() {
        let rows = vec![
            derive_row("L1", "A", "a"),
            derive_row("L1", "A", "b"),
            derive_row("L1", "B", "c"),
            derive_row("L2", "A", "d"),
            derive_row("L2", "A", "e"),
        ];
        let l_runs = derive_key_runs(&rows, &[EnumOutputField::Locomotive]);
        assert_eq!(l_runs, vec![vec![(0, 2), (3, 4)]]);

        let l_single = derive_key_runs(&rows[2..4], &[EnumOutputField::Locomotive]);
        assert_eq!(l_single, vec![Vec::<(usize, usize)>::new()]);
    }

    #[test]
    fn workshop_runs_nest_inside_locomotive_runs() {
        let rows = vec![
            derive_row("L1", "A", "a"),
            derive_row("L1", "A", "b"),
            derive_row("L2", "A", "c"),
            derive_row("L2", "A", "d"),
            derive_row("L3", "A", "e"),
        ];
        let schema = derive_default_plan_schema();
        let l_runs = derive_key_runs(&rows, &schema.merge_levels);
        assert_eq!(l_runs[0], vec![(0, 1), (2, 3)]);
        // Workshop A spans L1 and L2 but must not cross the locomotive boundary.
        assert_eq!(l_runs[1], vec![(0, 1), (2, 3)]);

        let l_merges = plan_key_run_merges(&rows, &schema, 2);
        assert!(l_merges.contains(&SpecCellMerge::vertical(0, 2, 3)));
        assert!(l_merges.contains(&SpecCellMerge::vertical(1, 4, 5)));
        assert_eq!(l_merges.len(), 4);
    }

    #[test]
    fn plan_sheet_layout() {
        let schema = derive_default_plan_schema();
        let mut row = derive_row("12345", "A", "Ремонт");
        row.item.completion = Some(50);
        let rows = vec![row, derive_row("12345", "A", "Окраска")];
        let (grid, stats) =
            render_dated_sheet("05.03", derive_date(), &rows, &schema, &derive_workshops())
                .expect("render");

        assert_eq!(grid.value(0, 0).to_text(), "План-задание на 05.03.2024");
        assert!(grid.merges().contains(&SpecCellMerge::horizontal(0, 0, 5)));
        assert_eq!(grid.value(1, 0).to_text(), "№ тепловоза");
        assert_eq!(
            grid.cell(1, 0).and_then(|cell| cell.fmt_key.as_deref()),
            Some("header")
        );
        assert_eq!(grid.value(2, 0).to_text(), "12345");
        assert_eq!(grid.value(2, 1).to_text(), "A");
        assert_eq!(grid.value(2, 2).to_text(), "Ремонт");
        assert_eq!(grid.value(2, 3).to_text(), "50%");
        assert!(grid.value(3, 0).is_none());
        assert_eq!(
            grid.cell(3, 0).and_then(|cell| cell.fmt_key.as_deref()),
            Some("text")
        );
        assert!(grid.merges().contains(&SpecCellMerge::vertical(0, 2, 3)));
        assert_eq!(grid.col_widths()[&2], 50.0);
        assert_eq!(
            stats,
            SpecLayoutStats {
                n_rows_body: 2,
                n_rows_trimmed: 0,
                n_merges: 2
            }
        );
    }

    #[test]
    fn qc_sheet_layout_has_titles_gap_and_footer() {
        let schema = derive_default_qc_schema();
        let mut row = derive_row("0001", "ЦКТ", "Вал");
        row.item.product_number = "00-01".to_string();
        row.item.quantity = Some(EnumQuantity::Count(2));
        let rows = vec![row];
        let (grid, _) =
            render_dated_sheet("05.03", derive_date(), &rows, &schema, &derive_workshops())
                .expect("render");

        assert_eq!(grid.value(0, 0).to_text(), "ЗАЯВКА");
        assert_eq!(grid.value(2, 0).to_text(), "на «05» _03_ 2024 года.");
        assert!(grid.value(3, 0).is_none());
        assert_eq!(grid.value(4, 3).to_text(), "Наименование цеха");
        assert_eq!(grid.value(5, 1).to_text(), "00-01");
        assert_eq!(grid.value(5, 2), &EnumCellValue::Number(2.0));
        assert_eq!(
            grid.cell(5, 3).and_then(|cell| cell.fmt_key.as_deref()),
            Some("text_bold")
        );
        assert_eq!(grid.value(6, 0).to_text(), "Начальник смены");
        assert!(grid.merges().contains(&SpecCellMerge::horizontal(6, 0, 5)));
    }

    #[test]
    fn empty_run_renders_header_only() {
        let schema = derive_default_plan_schema();
        let (grid, stats) =
            render_dated_sheet("05.03", derive_date(), &[], &schema, &derive_workshops())
                .expect("render");
        assert_eq!(grid.n_rows(), 2);
        assert_eq!(stats.n_rows_body, 0);
    }

    #[test]
    fn trailing_cleanup_removes_tail_only() {
        let mut grid = SpecSheetGrid::new("s");
        grid.write(0, 0, "Header").expect("write");
        grid.write(1, 0, "content").expect("write");
        grid.write(2, 1, "-").expect("write");
        grid.write(3, 0, "kept").expect("write");
        grid.write(4, 1, "ЦКТ").expect("write");
        grid.write(5, 0, "_").expect("write");
        grid.set_format(6, 2, "text").expect("format");

        let n_removed = trim_trailing_rows(&mut grid, 1, 3, &derive_workshops());
        assert_eq!(n_removed, 3);
        assert_eq!(grid.n_rows(), 4);
        assert_eq!(grid.value(3, 0).to_text(), "kept");
        assert_eq!(grid.value(2, 1).to_text(), "-");
    }

    #[test]
    fn trailing_cleanup_keeps_last_row_with_real_content() {
        let mut grid = SpecSheetGrid::new("s");
        grid.write(0, 0, "row").expect("write");
        grid.write(1, 0, "ЦКТ ЦПМ").expect("write");
        grid.set_format(2, 0, "text").expect("format");
        grid.set_format(3, 0, "text").expect("format");
        assert_eq!(trim_trailing_rows(&mut grid, 0, 2, &derive_workshops()), 2);
        assert_eq!(grid.n_rows(), 2);
        assert_eq!(trim_trailing_rows(&mut grid, 0, 2, &derive_workshops()), 0);
    }

    #[test]
    fn restored_sheet_is_restyled() {
        let schema = derive_default_qc_schema();
        let mut grid = SpecSheetGrid::new("04.03");
        grid.write(0, 0, "ЗАЯВКА").expect("write");
        grid.write(4, 0, "Наименование предъявляемой продукции").expect("write");
        grid.write(5, 0, "Вал").expect("write");
        grid.write(6, 0, "Начальник смены").expect("write");

        restyle_restored_sheet(&mut grid, &schema);
        let fmt_at = |row_idx, col_idx| {
            grid.cell(row_idx, col_idx)
                .and_then(|cell| cell.fmt_key.clone())
        };
        assert_eq!(fmt_at(0, 0).as_deref(), Some("title"));
        assert_eq!(fmt_at(4, 5).as_deref(), Some("header"));
        assert_eq!(fmt_at(5, 3).as_deref(), Some("text_bold"));
        assert_eq!(fmt_at(6, 0).as_deref(), Some("signature"));
        assert_eq!(fmt_at(6, 1), None);
        assert_eq!(grid.col_widths()[&0], 40.0);
    }

    #[test]
    fn invalid_title_template_is_rejected() {
        assert!(render_title("%Q", derive_date()).is_err());
        assert_eq!(render_title("на %d.%m", derive_date()).expect("title"), "на 05.03");
    }
}
