//! Scan specification models and top-level error types.

use std::path::PathBuf;

use crate::report::ReportScan;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Symlink handling policy during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumScanSymlinkStrategy {
    /// Follow links to directories and files.
    Follow,
    /// Ignore symlink entries.
    #[default]
    SkipSymlinks,
}

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumScanPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for [`crate::scan_tree`].
#[derive(Debug, Clone)]
pub struct SpecScanOptions {
    /// Include patterns applied to file basename.
    pub patterns_include_files: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Exclude patterns applied to directory basename.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumScanPatternMode,
    /// Symlink handling behavior.
    pub rule_symlink: EnumScanSymlinkStrategy,
    /// Optional maximum depth (root children have depth 1).
    pub depth_limit: Option<usize>,
    /// Compare file basenames case-insensitively against glob patterns.
    pub if_case_insensitive: bool,
}

impl Default for SpecScanOptions {
    fn default() -> Self {
        Self {
            patterns_include_files: None,
            patterns_exclude_files: None,
            patterns_exclude_dirs: None,
            rule_pattern: EnumScanPatternMode::Glob,
            rule_symlink: EnumScanSymlinkStrategy::SkipSymlinks,
            depth_limit: None,
            if_case_insensitive: true,
        }
    }
}

/// Files discovered by one scan, in traversal order, plus diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SpecScanResult {
    /// Matched file paths.
    pub files: Vec<PathBuf>,
    /// Counters and warnings.
    pub report: ReportScan,
}

/// "Top-level call failed" errors (input validation / setup stage).
#[derive(Debug, thiserror::Error)]
pub enum ScanTreeError {
    /// Invalid depth value.
    #[error("{0}")]
    InvalidDepthLimit(String),
    /// Invalid include/exclude pattern.
    #[error("{0}")]
    InvalidPattern(String),
    /// Root path exists but is not a directory.
    #[error("Scan root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
