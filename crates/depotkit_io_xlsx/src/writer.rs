//! Workbook writer backed by `rust_xlsxwriter`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{
    Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet, XlsxError,
};

use crate::grid::{SpecGridCell, SpecSheetGrid, SpecWorkbook};
use crate::spec::{EnumCellValue, SpecCellFormat, SpecXlsxReport, XlsxWriteError};
use crate::util::{
    cast_col_num, cast_row_num, derive_excel_serial_from_datetime, derive_merge_tracker,
    derive_unique_sheet_name, sanitize_sheet_name,
};

const C_NUM_FORMAT_DATETIME: &str = "dd.mm.yyyy hh:mm";

/// Serializes a [`SpecWorkbook`] to one `.xlsx` destination.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    dict_fmt: BTreeMap<String, SpecCellFormat>,
}

impl XlsxWriter {
    /// Create writer bound to output path and explicit format presets.
    pub fn with_formats(
        path_file_out: PathBuf,
        dict_fmt: BTreeMap<String, SpecCellFormat>,
    ) -> Self {
        Self {
            path_file_out,
            dict_fmt,
        }
    }

    /// Render `workbook` and persist it.
    ///
    /// The file is first saved next to the destination and then renamed over
    /// it, so a failed save leaves any previous file untouched. Missing parent
    /// directories are created.
    pub fn save(&self, workbook: &SpecWorkbook) -> Result<SpecXlsxReport, XlsxWriteError> {
        let mut report = SpecXlsxReport::default();
        let mut workbook_out = self.render(workbook, &mut report)?;

        if let Some(path_dir) = self.path_file_out.parent()
            && !path_dir.as_os_str().is_empty()
        {
            fs::create_dir_all(path_dir).map_err(|source| XlsxWriteError::Io {
                path: path_dir.to_path_buf(),
                source,
            })?;
        }

        let path_tmp = derive_tmp_path(&self.path_file_out);
        if let Err(err) = workbook_out.save(&path_tmp) {
            let _ = fs::remove_file(&path_tmp);
            return Err(match err {
                XlsxError::IoError(source) => XlsxWriteError::Io {
                    path: self.path_file_out.clone(),
                    source,
                },
                other => derive_xlsx_error(other),
            });
        }
        if let Err(source) = fs::rename(&path_tmp, &self.path_file_out) {
            let _ = fs::remove_file(&path_tmp);
            return Err(XlsxWriteError::Io {
                path: self.path_file_out.clone(),
                source,
            });
        }

        tracing::debug!(
            "Saved {} sheet(s) to {}",
            report.sheets.len(),
            self.path_file_out.display()
        );
        Ok(report)
    }

    fn render(
        &self,
        workbook: &SpecWorkbook,
        report: &mut SpecXlsxReport,
    ) -> Result<Workbook, XlsxWriteError> {
        let dict_format = self.derive_format_cache();
        let mut workbook_out = Workbook::new();
        let mut set_sheet_names_existing = BTreeSet::new();

        for sheet in workbook.sheets() {
            let c_sheet_name = sanitize_sheet_name(sheet.name(), "_");
            let c_sheet_name = derive_unique_sheet_name(&c_sheet_name, &set_sheet_names_existing);
            if c_sheet_name != sheet.name() {
                report.warn(format!(
                    "Sheet {:?} renamed to {c_sheet_name:?} to satisfy Excel naming rules.",
                    sheet.name()
                ));
            }
            set_sheet_names_existing.insert(c_sheet_name.clone());

            let worksheet = workbook_out.add_worksheet();
            worksheet.set_name(&c_sheet_name).map_err(derive_xlsx_error)?;
            write_sheet(worksheet, sheet, &dict_format, report)?;
            report.sheets.push(c_sheet_name);
        }

        Ok(workbook_out)
    }

    fn derive_format_cache(&self) -> BTreeMap<&str, Format> {
        self.dict_fmt
            .iter()
            .map(|(key, spec)| (key.as_str(), derive_rust_xlsx_format(spec)))
            .collect()
    }
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &SpecSheetGrid,
    dict_format: &BTreeMap<&str, Format>,
    report: &mut SpecXlsxReport,
) -> Result<(), XlsxWriteError> {
    for (col_idx, width) in sheet.col_widths() {
        let n_col = cast_col_num(*col_idx).map_err(XlsxWriteError::IndexOverflow)?;
        worksheet
            .set_column_width(n_col, *width)
            .map_err(derive_xlsx_error)?;
    }

    let mut set_fmt_keys_missing = BTreeSet::new();
    let fmt_plain = Format::new();

    let set_covered = derive_merge_tracker(sheet.merges());
    for ((row_idx, col_idx), cell) in sheet.cells() {
        if set_covered.contains(&(*row_idx, *col_idx)) {
            continue;
        }
        let format = resolve_format(
            dict_format,
            cell.fmt_key.as_deref(),
            &mut set_fmt_keys_missing,
        );
        write_grid_cell(worksheet, *row_idx, *col_idx, cell, format)?;
    }

    for merge in sheet.merges() {
        let fmt_key = sheet
            .cell(merge.row_idx_start, merge.col_idx_start)
            .and_then(|cell| cell.fmt_key.as_deref());
        let format = resolve_format(dict_format, fmt_key, &mut set_fmt_keys_missing);
        let cell_anchor = sheet.cell(merge.row_idx_start, merge.col_idx_start);
        let value = sheet.value(merge.row_idx_start, merge.col_idx_start);

        let text = match value {
            EnumCellValue::String(s) => s.as_str(),
            _ => "",
        };
        worksheet
            .merge_range(
                cast_row_num(merge.row_idx_start).map_err(XlsxWriteError::IndexOverflow)?,
                cast_col_num(merge.col_idx_start).map_err(XlsxWriteError::IndexOverflow)?,
                cast_row_num(merge.row_idx_end).map_err(XlsxWriteError::IndexOverflow)?,
                cast_col_num(merge.col_idx_end).map_err(XlsxWriteError::IndexOverflow)?,
                text,
                format.unwrap_or(&fmt_plain),
            )
            .map_err(derive_xlsx_error)?;

        // merge_range only writes text; formulas and other values overwrite
        // the anchor.
        if let Some(cell) = cell_anchor
            && (cell.formula.is_some()
                || matches!(value, EnumCellValue::Number(_) | EnumCellValue::DateTime(_)))
        {
            write_grid_cell(worksheet, merge.row_idx_start, merge.col_idx_start, cell, format)?;
        }
    }

    for fmt_key in set_fmt_keys_missing {
        report.warn(format!(
            "Unknown format preset {fmt_key:?} on sheet {:?}; cells written unformatted.",
            sheet.name()
        ));
    }
    Ok(())
}

fn resolve_format<'a>(
    dict_format: &'a BTreeMap<&str, Format>,
    fmt_key: Option<&str>,
    set_fmt_keys_missing: &mut BTreeSet<String>,
) -> Option<&'a Format> {
    let fmt_key = fmt_key?;
    let format = dict_format.get(fmt_key);
    if format.is_none() {
        set_fmt_keys_missing.insert(fmt_key.to_string());
    }
    format
}

fn write_grid_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    cell: &SpecGridCell,
    format: Option<&Format>,
) -> Result<(), XlsxWriteError> {
    let Some(c_formula) = &cell.formula else {
        return write_cell_with_format(worksheet, row_idx, col_idx, &cell.value, format);
    };
    let n_row = cast_row_num(row_idx).map_err(XlsxWriteError::IndexOverflow)?;
    let n_col = cast_col_num(col_idx).map_err(XlsxWriteError::IndexOverflow)?;

    let mut formula = Formula::new(format!("={c_formula}"));
    if !cell.value.is_none() {
        formula = formula.set_result(cell.value.to_text().into_owned());
    }
    let res_write = match format {
        Some(format) => worksheet.write_formula_with_format(n_row, n_col, formula, format),
        None => worksheet.write_formula(n_row, n_col, formula),
    };
    res_write.map_err(derive_xlsx_error)?;
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> Result<(), XlsxWriteError> {
    let n_row = cast_row_num(row_idx).map_err(XlsxWriteError::IndexOverflow)?;
    let n_col = cast_col_num(col_idx).map_err(XlsxWriteError::IndexOverflow)?;

    match (value, format) {
        (EnumCellValue::None, None) => {}
        (EnumCellValue::None, Some(format)) => {
            worksheet
                .write_blank(n_row, n_col, format)
                .map_err(derive_xlsx_error)?;
        }
        (EnumCellValue::String(val), Some(format)) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, format)
                .map_err(derive_xlsx_error)?;
        }
        (EnumCellValue::String(val), None) => {
            worksheet
                .write_string(n_row, n_col, val)
                .map_err(derive_xlsx_error)?;
        }
        (EnumCellValue::Number(val), Some(format)) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, format)
                .map_err(derive_xlsx_error)?;
        }
        (EnumCellValue::Number(val), None) => {
            worksheet
                .write_number(n_row, n_col, *val)
                .map_err(derive_xlsx_error)?;
        }
        (EnumCellValue::DateTime(val), format) => {
            let serial = derive_excel_serial_from_datetime(val).ok_or_else(|| {
                XlsxWriteError::Xlsx(format!("date out of range at ({row_idx}, {col_idx})"))
            })?;
            let format = format
                .cloned()
                .unwrap_or_else(Format::new)
                .set_num_format(C_NUM_FORMAT_DATETIME);
            worksheet
                .write_number_with_format(n_row, n_col, serial, &format)
                .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn derive_tmp_path(path_file_out: &Path) -> PathBuf {
    let c_file_name = path_file_out
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    path_file_out.with_file_name(format!(".{c_file_name}.{}.tmp", std::process::id()))
}

fn derive_xlsx_error(err: XlsxError) -> XlsxWriteError {
    XlsxWriteError::Xlsx(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_helpers_map_known_names() {
        assert_eq!(derive_format_border(1), FormatBorder::Thin);
        assert_eq!(derive_format_border(42), FormatBorder::None);
        assert_eq!(derive_format_align(" Center "), Some(FormatAlign::Center));
        assert_eq!(derive_format_align("vcenter"), Some(FormatAlign::VerticalCenter));
        assert_eq!(derive_format_align("diagonal"), None);
    }

    #[test]
    fn tmp_path_stays_in_destination_dir() {
        let path_tmp = derive_tmp_path(Path::new("/out/dir/План-задание.xlsx"));
        assert_eq!(path_tmp.parent(), Some(Path::new("/out/dir")));
        let c_name = path_tmp.file_name().expect("name").to_string_lossy().to_string();
        assert!(c_name.starts_with(".План-задание.xlsx."));
        assert!(c_name.ends_with(".tmp"));
    }
}
