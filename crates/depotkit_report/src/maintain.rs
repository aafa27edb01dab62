//! Output workbook maintenance: load, conflict policy, sheet order, persist.

use std::collections::BTreeMap;
use std::path::Path;

use depotkit_io_xlsx::conf::C_SHEET_NAME_DEFAULT;
use depotkit_io_xlsx::{SpecCellFormat, SpecWorkbook, SpecXlsxReport, XlsxReader, XlsxWriter};

use crate::error::ReportError;
use crate::layout::restyle_restored_sheet;
use crate::normalize::parse_sheet_name_date;
use crate::report::ReportRunBuilder;
use crate::spec::{EnumConflictPolicy, SpecProductSchema};

/// Load the output workbook, or a fresh one with an empty default sheet when
/// the file does not exist yet.
///
/// Sheets come back with values, formulas and merges; formatting is lost.
/// Dated sheets are restyled from `schema`; every other non-empty sheet is
/// reported as rewritten without formatting.
pub fn load_output_workbook(
    path_file: &Path,
    schema: &SpecProductSchema,
    builder_run: &mut ReportRunBuilder,
) -> Result<SpecWorkbook, ReportError> {
    if !path_file.exists() {
        tracing::debug!("{} does not exist; starting a new workbook", path_file.display());
        return Ok(SpecWorkbook::with_default_sheet());
    }

    let derive_err = |message: String| ReportError::OutputRead {
        path: path_file.to_path_buf(),
        message,
    };
    let mut reader = XlsxReader::open(path_file).map_err(|e| derive_err(e.to_string()))?;
    let mut workbook = SpecWorkbook::new();
    for c_sheet in reader.sheet_names() {
        let mut grid = reader
            .read_sheet_grid(&c_sheet)
            .map_err(|e| derive_err(e.to_string()))?;
        if parse_sheet_name_date(&c_sheet).is_some() {
            restyle_restored_sheet(&mut grid, schema);
        } else if !grid.is_empty() {
            builder_run.add_warning(format!(
                "Sheet {c_sheet:?} of {} is rewritten without its formatting \
                 (values, formulas and merges kept)",
                path_file.display()
            ));
        }
        workbook.push_sheet(grid).map_err(derive_err)?;
    }
    tracing::debug!(
        "Loaded {} sheet(s) from {}",
        workbook.len(),
        path_file.display()
    );
    Ok(workbook)
}

/// Remove the default `Sheet` when it holds nothing; returns whether it did.
pub fn drop_empty_default_sheet(workbook: &mut SpecWorkbook) -> bool {
    let if_empty = workbook
        .sheet(C_SHEET_NAME_DEFAULT)
        .is_some_and(|sheet| sheet.is_empty());
    if if_empty {
        workbook.remove_sheet(C_SHEET_NAME_DEFAULT);
    }
    if_empty
}

/// Make room for a fresh `sheet_name` under `policy`.
///
/// `replace` deletes an existing sheet of that name (returns `true`); `error`
/// fails with [`ReportError::SheetConflict`].
pub fn apply_conflict_policy(
    workbook: &mut SpecWorkbook,
    sheet_name: &str,
    policy: EnumConflictPolicy,
    path_file: &Path,
) -> Result<bool, ReportError> {
    if workbook.position(sheet_name).is_none() {
        return Ok(false);
    }
    match policy {
        EnumConflictPolicy::Replace => {
            workbook.remove_sheet(sheet_name);
            tracing::info!("Replacing existing sheet {sheet_name:?}");
            Ok(true)
        }
        EnumConflictPolicy::Error => Err(ReportError::SheetConflict {
            sheet: sheet_name.to_string(),
            path: path_file.to_path_buf(),
        }),
    }
}

/// Sort `dd.mm` sheets by (month, day) inside the positions they already
/// occupy; other sheets keep their positions.
pub fn sort_dated_sheets(workbook: &mut SpecWorkbook) -> Result<(), ReportError> {
    let l_names = workbook.sheet_names();
    let l_slots: Vec<usize> = l_names
        .iter()
        .enumerate()
        .filter(|(_, name)| parse_sheet_name_date(name).is_some())
        .map(|(n_idx, _)| n_idx)
        .collect();

    let mut l_dated: Vec<((u32, u32), usize)> = l_slots
        .iter()
        .filter_map(|n_idx| parse_sheet_name_date(l_names[*n_idx]).map(|key| (key, *n_idx)))
        .collect();
    l_dated.sort_by_key(|(key, _)| *key);

    let mut l_order: Vec<usize> = (0..l_names.len()).collect();
    for (n_slot, (_, n_idx_old)) in l_slots.iter().zip(l_dated) {
        l_order[*n_slot] = n_idx_old;
    }
    workbook.reorder(&l_order).map_err(|message| ReportError::Render {
        sheet: String::new(),
        message,
    })
}

/// Save `workbook` to `path_file` through a temporary file.
pub fn persist_workbook(
    workbook: &SpecWorkbook,
    path_file: &Path,
    dict_fmt: BTreeMap<String, SpecCellFormat>,
) -> Result<SpecXlsxReport, ReportError> {
    XlsxWriter::with_formats(path_file.to_path_buf(), dict_fmt)
        .save(workbook)
        .map_err(|e| ReportError::Persist {
            path: path_file.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use depotkit_io_xlsx::SpecSheetGrid;

    fn derive_workbook(names: &[&str]) -> SpecWorkbook {
        let mut workbook = SpecWorkbook::new();
        for name in names {
            workbook.push_sheet(SpecSheetGrid::new(*name)).expect("push");
        }
        workbook
    }

    #[test]
    fn dated_sheets_sort_inside_their_slots() {
        let mut workbook = derive_workbook(&["10.03", "Итоги", "02.03", "31.01", "Справка"]);
        sort_dated_sheets(&mut workbook).expect("sort");
        assert_eq!(
            workbook.sheet_names(),
            vec!["31.01", "Итоги", "02.03", "10.03", "Справка"]
        );
    }

    #[test]
    fn empty_default_sheet_is_dropped_only_when_empty() {
        let mut workbook = SpecWorkbook::with_default_sheet();
        assert!(drop_empty_default_sheet(&mut workbook));
        assert!(workbook.is_empty());

        let mut workbook = SpecWorkbook::new();
        let mut sheet = SpecSheetGrid::new("Sheet");
        sheet.write(0, 0, "note").expect("write");
        workbook.push_sheet(sheet).expect("push");
        assert!(!drop_empty_default_sheet(&mut workbook));
        assert_eq!(workbook.len(), 1);
    }

    #[test]
    fn conflict_policy_replaces_or_fails() {
        let path_file = Path::new("out.xlsx");
        let mut workbook = derive_workbook(&["04.03", "05.03"]);
        assert!(
            apply_conflict_policy(&mut workbook, "05.03", EnumConflictPolicy::Replace, path_file)
                .expect("replace")
        );
        assert_eq!(workbook.sheet_names(), vec!["04.03"]);
        assert!(
            !apply_conflict_policy(&mut workbook, "06.03", EnumConflictPolicy::Error, path_file)
                .expect("no conflict")
        );

        let err =
            apply_conflict_policy(&mut workbook, "04.03", EnumConflictPolicy::Error, path_file)
                .expect_err("conflict");
        assert!(matches!(err, ReportError::SheetConflict { ref sheet, .. } if sheet == "04.03"));
        assert_eq!(workbook.len(), 1);
    }

    #[test]
    fn missing_output_file_starts_with_default_sheet() {
        let schema = crate::conf::derive_default_plan_schema();
        let path_file = Path::new("/nonexistent/depotkit/out.xlsx");
        let mut builder_run = ReportRunBuilder::default();
        let workbook = load_output_workbook(path_file, &schema, &mut builder_run).expect("new");
        assert_eq!(workbook.sheet_names(), vec!["Sheet"]);
        assert!(builder_run.warnings.is_empty());
    }
}
