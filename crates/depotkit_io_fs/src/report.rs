//! Scan report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one `scan_tree` run.
#[derive(Debug, Default, Clone)]
pub struct ReportScan {
    /// Number of file entries that passed the filters.
    pub cnt_matched: u64,
    /// Total scanned directory/file entries.
    pub cnt_scanned: u64,
    /// Number of entries rejected by patterns, depth or symlink policy.
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
}

impl ReportScan {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} matched={} scanned={} skipped={} warnings={}",
            dict_counts["cnt_matched"],
            dict_counts["cnt_scanned"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_warnings"]
        )
    }

    /// Fold another report into this one (used when scanning several roots).
    pub fn absorb(&mut self, other: ReportScan) {
        self.cnt_matched += other.cnt_matched;
        self.cnt_scanned += other.cnt_scanned;
        self.cnt_skipped += other.cnt_skipped;
        self.warnings.extend(other.warnings);
    }
}

impl fmt::Display for ReportScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[SCAN]"))
    }
}

/// Mutable accumulator for scan statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportScanBuilder {
    /// See [`ReportScan::cnt_matched`].
    pub cnt_matched: u64,
    /// See [`ReportScan::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportScan::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportScan::warnings`].
    pub warnings: Vec<String>,
}

impl ReportScanBuilder {
    /// Increment matched count by one.
    pub fn add_matched(&mut self) {
        self.cnt_matched += 1;
    }

    /// Increment scanned count by one.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportScan {
        ReportScan {
            cnt_matched: self.cnt_matched,
            cnt_scanned: self.cnt_scanned,
            cnt_skipped: self.cnt_skipped,
            warnings: self.warnings,
        }
    }
}
