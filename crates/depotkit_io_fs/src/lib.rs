//! `depotkit_io_fs` v1:
//! Filesystem discovery for source spreadsheets.
//!
//! - `scan`   : deterministic recursive traversal
//! - `spec`   : enums/options/errors
//! - `report` : run-time report model
//! - `util`   : pattern and depth helpers

pub mod report;
pub mod scan;
pub mod spec;
mod util;

pub use report::{ReportScan, ReportScanBuilder};
pub use scan::scan_tree;
pub use spec::{
    EnumScanPatternMode, EnumScanSymlinkStrategy, ScanTreeError, SpecScanOptions, SpecScanResult,
};
