//! Shared XLSX specification models.

use std::borrow::Cow;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Deserialize;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; every field is an optional overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Normalized cell value shared by the reader, the grid and the writer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Date/time value (Excel serial converted on read).
    DateTime(NaiveDateTime),
}

impl EnumCellValue {
    /// `true` for a missing cell (the reader maps empty and error cells here).
    pub fn is_none(&self) -> bool {
        matches!(self, EnumCellValue::None)
    }

    /// `true` for a missing cell or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            EnumCellValue::None => true,
            EnumCellValue::String(s) => s.trim().is_empty(),
            EnumCellValue::Number(_) | EnumCellValue::DateTime(_) => false,
        }
    }

    /// Borrow the text payload; `None` for every non-text variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnumCellValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render the value as display text (integral numbers without `.0`).
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            EnumCellValue::None => Cow::Borrowed(""),
            EnumCellValue::String(s) => Cow::Borrowed(s.as_str()),
            EnumCellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    Cow::Owned(format!("{}", *n as i64))
                } else {
                    Cow::Owned(n.to_string())
                }
            }
            EnumCellValue::DateTime(dt) => Cow::Owned(dt.format("%d.%m.%Y %H:%M:%S").to_string()),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        EnumCellValue::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        EnumCellValue::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        EnumCellValue::Number(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergeSpecification

/// Rectangular merged range, all bounds inclusive and zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecCellMerge {
    /// First row.
    pub row_idx_start: usize,
    /// Last row.
    pub row_idx_end: usize,
    /// First column.
    pub col_idx_start: usize,
    /// Last column.
    pub col_idx_end: usize,
}

impl SpecCellMerge {
    /// Vertical merge of `row_idx_start..=row_idx_end` in one column.
    pub fn vertical(col_idx: usize, row_idx_start: usize, row_idx_end: usize) -> Self {
        Self {
            row_idx_start,
            row_idx_end,
            col_idx_start: col_idx,
            col_idx_end: col_idx,
        }
    }

    /// Horizontal merge of `col_idx_start..=col_idx_end` in one row.
    pub fn horizontal(row_idx: usize, col_idx_start: usize, col_idx_end: usize) -> Self {
        Self {
            row_idx_start: row_idx,
            row_idx_end: row_idx,
            col_idx_start,
            col_idx_end,
        }
    }

    /// `true` when the range covers exactly one cell.
    pub fn is_single_cell(&self) -> bool {
        self.row_idx_start == self.row_idx_end && self.col_idx_start == self.col_idx_end
    }

    /// `true` when `(row_idx, col_idx)` lies inside the range.
    pub fn contains(&self, row_idx: usize, col_idx: usize) -> bool {
        (self.row_idx_start..=self.row_idx_end).contains(&row_idx)
            && (self.col_idx_start..=self.col_idx_end).contains(&col_idx)
    }

    /// `true` when the two ranges share at least one cell.
    pub fn overlaps(&self, other: &SpecCellMerge) -> bool {
        self.row_idx_start <= other.row_idx_end
            && other.row_idx_start <= self.row_idx_end
            && self.col_idx_start <= other.col_idx_end
            && other.col_idx_start <= self.col_idx_end
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportAndErrors

/// Per-save report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Sheet names written, in workbook order.
    pub sheets: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        tracing::warn!("{}", msg.as_ref());
        self.warnings.push(msg.as_ref().to_string());
    }
}

/// Failures raised by [`crate::reader::XlsxReader`].
#[derive(Debug, thiserror::Error)]
pub enum XlsxReadError {
    /// The workbook could not be opened or parsed.
    #[error("Failed to open workbook {}: {message}", .path.display())]
    Open {
        /// Workbook path.
        path: PathBuf,
        /// Underlying parser error text.
        message: String,
    },
    /// A sheet could not be read.
    #[error("Failed to read sheet {sheet:?} of {}: {message}", .path.display())]
    Sheet {
        /// Workbook path.
        path: PathBuf,
        /// Sheet name.
        sheet: String,
        /// Underlying parser error text.
        message: String,
    },
}

/// Failures raised by [`crate::writer::XlsxWriter`].
#[derive(Debug, thiserror::Error)]
pub enum XlsxWriteError {
    /// rust_xlsxwriter rejected an operation.
    #[error("xlsx write error: {0}")]
    Xlsx(String),
    /// A grid index does not fit Excel's row/column types.
    #[error("{0}")]
    IndexOverflow(String),
    /// Filesystem failure while persisting.
    #[error("Failed to save {}: {source}", .path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
