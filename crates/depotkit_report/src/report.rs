//! Run report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::SourceFileError;

/// One skipped source file with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSourceFailure {
    /// Source file that was skipped.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

/// Aggregate counters and diagnostics for one `run_report` call.
#[derive(Debug, Default, Clone)]
pub struct ReportRun {
    /// Output sheet name (`dd.mm`).
    pub sheet_name: String,
    /// Saved workbook path.
    pub path_output: PathBuf,
    /// Source files discovered under the workshop directories.
    pub cnt_files_scanned: u64,
    /// Source files opened and read.
    pub cnt_files_read: u64,
    /// Sheets matched to the target date.
    pub cnt_sheets_matched: u64,
    /// Data rows read from matched sheets.
    pub cnt_rows_read: u64,
    /// Rows normalized into work items.
    pub cnt_rows_accepted: u64,
    /// Rows dropped by the significance rule.
    pub cnt_rows_insignificant: u64,
    /// Rows dropped by the QC marker rule.
    pub cnt_rows_excluded: u64,
    /// Body rows rendered into the output sheet.
    pub cnt_items_rendered: u64,
    /// Non-fatal warnings collected during the run.
    pub warnings: Vec<String>,
    /// Source files skipped after a failure.
    pub errors: Vec<SpecSourceFailure>,
}

impl ReportRun {
    /// Number of skipped source files.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_files_scanned".to_string(), self.cnt_files_scanned);
        dict_counts.insert("cnt_files_read".to_string(), self.cnt_files_read);
        dict_counts.insert("cnt_sheets_matched".to_string(), self.cnt_sheets_matched);
        dict_counts.insert("cnt_rows_read".to_string(), self.cnt_rows_read);
        dict_counts.insert("cnt_rows_accepted".to_string(), self.cnt_rows_accepted);
        dict_counts.insert(
            "cnt_rows_insignificant".to_string(),
            self.cnt_rows_insignificant,
        );
        dict_counts.insert("cnt_rows_excluded".to_string(), self.cnt_rows_excluded);
        dict_counts.insert("cnt_items_rendered".to_string(), self.cnt_items_rendered);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} sheet={} files={}/{} sheets={} rows={} accepted={} insignificant={} \
             excluded={} rendered={} errors={} warnings={}",
            self.sheet_name,
            dict_counts["cnt_files_read"],
            dict_counts["cnt_files_scanned"],
            dict_counts["cnt_sheets_matched"],
            dict_counts["cnt_rows_read"],
            dict_counts["cnt_rows_accepted"],
            dict_counts["cnt_rows_insignificant"],
            dict_counts["cnt_rows_excluded"],
            dict_counts["cnt_items_rendered"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[REPORT]"))
    }
}

/// Mutable accumulator for run statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportRunBuilder {
    /// See [`ReportRun::sheet_name`].
    pub sheet_name: String,
    /// See [`ReportRun::path_output`].
    pub path_output: PathBuf,
    /// See [`ReportRun::cnt_files_scanned`].
    pub cnt_files_scanned: u64,
    /// See [`ReportRun::cnt_files_read`].
    pub cnt_files_read: u64,
    /// See [`ReportRun::cnt_sheets_matched`].
    pub cnt_sheets_matched: u64,
    /// See [`ReportRun::cnt_rows_read`].
    pub cnt_rows_read: u64,
    /// See [`ReportRun::cnt_rows_accepted`].
    pub cnt_rows_accepted: u64,
    /// See [`ReportRun::cnt_rows_insignificant`].
    pub cnt_rows_insignificant: u64,
    /// See [`ReportRun::cnt_rows_excluded`].
    pub cnt_rows_excluded: u64,
    /// See [`ReportRun::cnt_items_rendered`].
    pub cnt_items_rendered: u64,
    /// See [`ReportRun::warnings`].
    pub warnings: Vec<String>,
    /// See [`ReportRun::errors`].
    pub errors: Vec<SpecSourceFailure>,
}

impl ReportRunBuilder {
    /// Increment one or more named counters by `value`.
    ///
    /// Unknown names are ignored.
    pub fn add_counts(&mut self, field_names: &[&str], value: u64) {
        for field_name in field_names {
            match *field_name {
                "cnt_files_scanned" => self.cnt_files_scanned += value,
                "cnt_files_read" => self.cnt_files_read += value,
                "cnt_sheets_matched" => self.cnt_sheets_matched += value,
                "cnt_rows_read" => self.cnt_rows_read += value,
                "cnt_rows_accepted" => self.cnt_rows_accepted += value,
                "cnt_rows_insignificant" => self.cnt_rows_insignificant += value,
                "cnt_rows_excluded" => self.cnt_rows_excluded += value,
                "cnt_items_rendered" => self.cnt_items_rendered += value,
                _ => {}
            }
        }
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Record a skipped source file.
    pub fn add_source_error(&mut self, err: &SourceFileError) {
        tracing::warn!("Skipping source file: {err}");
        self.errors.push(SpecSourceFailure {
            path: err.path().clone(),
            exception: err.to_string(),
        });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportRun {
        ReportRun {
            sheet_name: self.sheet_name,
            path_output: self.path_output,
            cnt_files_scanned: self.cnt_files_scanned,
            cnt_files_read: self.cnt_files_read,
            cnt_sheets_matched: self.cnt_sheets_matched,
            cnt_rows_read: self.cnt_rows_read,
            cnt_rows_accepted: self.cnt_rows_accepted,
            cnt_rows_insignificant: self.cnt_rows_insignificant,
            cnt_rows_excluded: self.cnt_rows_excluded,
            cnt_items_rendered: self.cnt_items_rendered,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}
