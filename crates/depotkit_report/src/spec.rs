//! Domain records, product schema and option models.

use std::fmt;
use std::path::PathBuf;

use depotkit_io_xlsx::EnumCellValue;
use serde::Deserialize;

////////////////////////////////////////////////////////////////////////////////
// #region Keys

/// Primary grouping key, cleaned of `_`/`-` runs and surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocomotiveNumber(String);

impl LocomotiveNumber {
    /// Wrap an already cleaned value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Cleaned text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocomotiveNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secondary grouping key: one configured workshop code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkshopCode(String);

impl WorkshopCode {
    /// Wrap a workshop code.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkshopCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Records

/// Quantity submitted for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumQuantity {
    /// Whole-number count.
    Count(i64),
    /// Anything else, kept verbatim.
    Text(String),
}

/// One normalized work item; immutable after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecWorkItem {
    /// Cleaned work/product name.
    pub work_name: String,
    /// Integer percent; `None` when the source cell is not numeric.
    pub completion: Option<i64>,
    /// `HH:MM` or empty.
    pub time_start: String,
    /// `HH:MM` or empty.
    pub time_end: String,
    /// Quantity submitted for inspection, when present.
    pub quantity: Option<EnumQuantity>,
    /// Product/locomotive number as written in the source (trimmed).
    pub product_number: String,
}

/// Source row projected onto the configured column table.
///
/// Columns absent from the sheet hold [`EnumCellValue::None`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRawRow {
    pub locomotive: EnumCellValue,
    pub work_name: EnumCellValue,
    pub completion: EnumCellValue,
    pub qc_marker: EnumCellValue,
    pub time_start: EnumCellValue,
    pub time_end: EnumCellValue,
}

/// Accepted row: grouping key plus item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecNormalizedRow {
    pub locomotive: LocomotiveNumber,
    pub item: SpecWorkItem,
}

/// Normalized row tagged with the workshop it was collected under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCollectedRow {
    pub workshop: WorkshopCode,
    pub row: SpecNormalizedRow,
}

/// One output line after aggregation, in final order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReportRow {
    pub locomotive: LocomotiveNumber,
    pub workshop: WorkshopCode,
    pub item: SpecWorkItem,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProductSchema

/// Output product selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumProduct {
    /// Daily plan workbook.
    Plan,
    /// Daily QC request workbook.
    QcRequest,
}

impl EnumProduct {
    /// Short name used in logs and report prefixes.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumProduct::Plan => "plan",
            EnumProduct::QcRequest => "qc_request",
        }
    }
}

/// How a source sheet is matched to the target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSheetMatchRule {
    /// Sheet named exactly `dd.mm.yyyy`.
    SheetName,
    /// Any sheet whose date cell embeds `dd.mm.yyyy` equal to the target.
    EmbeddedDate,
}

/// Which rows count as significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSignificanceRule {
    /// Locomotive and work name present, work name non-blank.
    NonBlank,
    /// Locomotive and work name each contain a letter or digit.
    Alphanumeric,
}

/// Treatment of the "submitted for QC" marker column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumQcMarkerRule {
    /// Drop rows carrying the marker.
    Exclude,
    /// Keep only rows carrying the marker.
    Require,
    /// No marker check.
    Ignore,
}

/// Aggregation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumGroupingMode {
    /// Locomotive -> workshop -> items, first-seen order.
    Nested,
    /// Arrival order, stable-sorted by workshop code.
    FlatByWorkshop,
}

/// What happens when the dated output sheet already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumConflictPolicy {
    /// Delete the old sheet and render a fresh one.
    Replace,
    /// Abort the run.
    Error,
}

/// Value rendered into an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumOutputField {
    Locomotive,
    ProductNumber,
    Workshop,
    WorkName,
    Completion,
    TimeStart,
    TimeEnd,
    Quantity,
    /// Empty bordered cell for handwritten entries.
    Blank,
}

/// Source column reference: the column labelled `label`, shifted right by
/// `offset` (for unlabelled neighbours).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecColumnRef {
    pub label: String,
    #[serde(default)]
    pub offset: usize,
}

impl SpecColumnRef {
    pub fn new(label: &str, offset: usize) -> Self {
        Self {
            label: label.to_string(),
            offset,
        }
    }
}

/// Logical field -> source column table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecSourceColumns {
    pub locomotive: SpecColumnRef,
    pub work_name: SpecColumnRef,
    pub completion: SpecColumnRef,
    pub qc_marker: SpecColumnRef,
    pub time_start: SpecColumnRef,
    pub time_end: SpecColumnRef,
}

impl Default for SpecSourceColumns {
    fn default() -> Self {
        crate::conf::derive_default_source_columns()
    }
}

/// Output table column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecOutputColumn {
    /// Header caption.
    pub caption: String,
    /// Rendered value.
    pub field: EnumOutputField,
    /// Column width in Excel character units.
    pub width: f64,
    /// Body format preset; `text` when unset.
    #[serde(default)]
    pub fmt: Option<String>,
}

/// Title line above the table; `template` is a chrono format string applied
/// to the target date.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecTitleLine {
    pub template: String,
    pub fmt: String,
}

impl SpecTitleLine {
    pub fn new(template: &str, fmt: &str) -> Self {
        Self {
            template: template.to_string(),
            fmt: fmt.to_string(),
        }
    }
}

/// Everything that differs between output products.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecProductSchema {
    pub sheet_match: EnumSheetMatchRule,
    pub significance: EnumSignificanceRule,
    pub qc_marker: EnumQcMarkerRule,
    pub grouping: EnumGroupingMode,
    /// Merge levels, outermost first; each names a field present in `columns`.
    pub merge_levels: Vec<EnumOutputField>,
    pub columns: Vec<SpecOutputColumn>,
    pub titles: Vec<SpecTitleLine>,
    /// Blank row between titles and header.
    pub header_gap: bool,
    /// Line merged across the table width below the last body row.
    pub footer: Option<String>,
    pub output_path: PathBuf,
    pub conflict_policy: EnumConflictPolicy,
}

impl SpecProductSchema {
    /// Zero-based row of the table header.
    pub fn header_row_idx(&self) -> usize {
        self.titles.len() + usize::from(self.header_gap)
    }

    /// Output column index of `field`.
    pub fn column_of(&self, field: EnumOutputField) -> Option<usize> {
        self.columns.iter().position(|col| col.field == field)
    }

    /// Return a new schema by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: &SpecProductPatch) -> SpecProductSchema {
        SpecProductSchema {
            sheet_match: patch.sheet_match.unwrap_or(self.sheet_match),
            significance: patch.significance.unwrap_or(self.significance),
            qc_marker: patch.qc_marker.unwrap_or(self.qc_marker),
            grouping: patch.grouping.unwrap_or(self.grouping),
            merge_levels: patch
                .merge_levels
                .clone()
                .unwrap_or_else(|| self.merge_levels.clone()),
            columns: patch.columns.clone().unwrap_or_else(|| self.columns.clone()),
            titles: patch.titles.clone().unwrap_or_else(|| self.titles.clone()),
            header_gap: patch.header_gap.unwrap_or(self.header_gap),
            footer: match &patch.footer {
                None => self.footer.clone(),
                Some(c_footer) if c_footer.trim().is_empty() => None,
                Some(c_footer) => Some(c_footer.clone()),
            },
            output_path: patch
                .output_path
                .clone()
                .unwrap_or_else(|| self.output_path.clone()),
            conflict_policy: patch.conflict_policy.unwrap_or(self.conflict_policy),
        }
    }
}

/// Configuration overlay for a [`SpecProductSchema`]; unset fields keep the
/// product default. An empty `footer` string removes the footer.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecProductPatch {
    pub sheet_match: Option<EnumSheetMatchRule>,
    pub significance: Option<EnumSignificanceRule>,
    pub qc_marker: Option<EnumQcMarkerRule>,
    pub grouping: Option<EnumGroupingMode>,
    pub merge_levels: Option<Vec<EnumOutputField>>,
    pub columns: Option<Vec<SpecOutputColumn>>,
    pub titles: Option<Vec<SpecTitleLine>>,
    pub header_gap: Option<bool>,
    pub footer: Option<String>,
    pub output_path: Option<PathBuf>,
    pub conflict_policy: Option<EnumConflictPolicy>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
