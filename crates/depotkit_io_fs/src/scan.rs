//! Deterministic recursive file discovery.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::report::ReportScanBuilder;
use crate::spec::{EnumScanSymlinkStrategy, ScanTreeError, SpecScanOptions, SpecScanResult};
use crate::util::{SpecScanPatterns, is_depth_within_limit, should_exclude_by_patterns};

#[derive(Debug, Clone)]
struct SpecDirEntry {
    path_dir_sub: PathBuf,
    name_dir: String,
    if_is_symlink: bool,
}

#[derive(Debug, Clone)]
struct SpecFileEntry {
    path_file: PathBuf,
    name_file: String,
    if_is_symlink: bool,
}

#[derive(Debug)]
struct SpecScanContext {
    spec_scan_options: SpecScanOptions,
    spec_scan_pats: SpecScanPatterns,
    builder_scan_report: ReportScanBuilder,
    set_visited_dirs: HashSet<PathBuf>,
    l_files: Vec<PathBuf>,
}

/// List files under `dir_root` recursively.
///
/// Within each directory, matching files are emitted first (sorted by name),
/// then each sub-directory is descended in name order. Given the same tree,
/// the output order is always the same.
///
/// A missing root is not an error: the result is empty and carries a warning.
/// Returns [`ScanTreeError`] only for invalid options or a root that is a file.
pub fn scan_tree<P>(
    dir_root: P,
    spec_scan_options: SpecScanOptions,
) -> Result<SpecScanResult, ScanTreeError>
where
    P: AsRef<Path>,
{
    if spec_scan_options.depth_limit == Some(0) {
        return Err(ScanTreeError::InvalidDepthLimit(
            "Arg `depth_limit` must be >= 1 or None.".to_string(),
        ));
    }

    let path_dir_root = dir_root.as_ref().to_path_buf();
    let spec_scan_pats = SpecScanPatterns::from_raw(
        spec_scan_options.patterns_include_files.as_deref(),
        spec_scan_options.patterns_exclude_files.as_deref(),
        spec_scan_options.patterns_exclude_dirs.as_deref(),
        spec_scan_options.rule_pattern,
        spec_scan_options.if_case_insensitive,
    )?;

    let mut spec_scan_ctx = SpecScanContext {
        spec_scan_options,
        spec_scan_pats,
        builder_scan_report: ReportScanBuilder::default(),
        set_visited_dirs: HashSet::new(),
        l_files: Vec::new(),
    };

    if !path_dir_root.exists() {
        spec_scan_ctx.builder_scan_report.add_warning(format!(
            "Scan root does not exist: {}",
            path_dir_root.display()
        ));
        return Ok(SpecScanResult {
            files: vec![],
            report: spec_scan_ctx.builder_scan_report.build(),
        });
    }
    if !path_dir_root.is_dir() {
        return Err(ScanTreeError::RootNotDirectory(path_dir_root));
    }

    walk_directory(&path_dir_root, 0, &mut spec_scan_ctx);
    Ok(SpecScanResult {
        files: spec_scan_ctx.l_files,
        report: spec_scan_ctx.builder_scan_report.build(),
    })
}

fn walk_directory(
    path_root: &Path,
    n_depth_relative: usize,
    spec_scan_ctx: &mut SpecScanContext,
) {
    if spec_scan_ctx.spec_scan_options.rule_symlink == EnumScanSymlinkStrategy::Follow {
        let path_resolved =
            fs::canonicalize(path_root).unwrap_or_else(|_| path_root.to_path_buf());
        if !spec_scan_ctx.set_visited_dirs.insert(path_resolved) {
            spec_scan_ctx
                .builder_scan_report
                .add_warning(format!("Symlink loop detected: {}", path_root.display()));
            return;
        }
    }

    let iter_entries = match fs::read_dir(path_root) {
        Ok(iter) => iter,
        Err(e) => {
            spec_scan_ctx.builder_scan_report.add_warning(format!(
                "Failed to read directory {} ({e})",
                path_root.display()
            ));
            return;
        }
    };

    let mut l_dirs: Vec<SpecDirEntry> = Vec::new();
    let mut l_files: Vec<SpecFileEntry> = Vec::new();

    for _entry_res in iter_entries {
        let entry = match _entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_scan_ctx.builder_scan_report.add_warning(format!(
                    "Failed to read directory entry under {} ({e})",
                    path_root.display()
                ));
                continue;
            }
        };

        let path_entry = entry.path();
        let c_name = entry.file_name().to_string_lossy().to_string();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                spec_scan_ctx
                    .builder_scan_report
                    .add_warning(format!("Failed to inspect {} ({e})", path_entry.display()));
                continue;
            }
        };

        spec_scan_ctx.builder_scan_report.add_scanned();
        let b_is_symlink = cfg_file_type.is_symlink();
        let b_is_dir = cfg_file_type.is_dir() || (b_is_symlink && path_entry.is_dir());
        if b_is_dir {
            l_dirs.push(SpecDirEntry {
                path_dir_sub: path_entry,
                name_dir: c_name,
                if_is_symlink: b_is_symlink,
            });
        } else if cfg_file_type.is_file() || b_is_symlink {
            l_files.push(SpecFileEntry {
                path_file: path_entry,
                name_file: c_name,
                if_is_symlink: b_is_symlink,
            });
        } else {
            spec_scan_ctx.builder_scan_report.add_skipped();
            tracing::debug!("Special file skipped: {}", path_entry.display());
        }
    }

    l_dirs.sort_by(|a, b| a.name_dir.cmp(&b.name_dir));
    l_files.sort_by(|a, b| a.name_file.cmp(&b.name_file));

    for _file_entry in l_files {
        handle_file_entry(_file_entry, n_depth_relative + 1, spec_scan_ctx);
    }

    let depth_limit = spec_scan_ctx.spec_scan_options.depth_limit;
    for _dir_entry in l_dirs {
        let b_should_descend =
            handle_dir_entry(&_dir_entry, n_depth_relative + 1, depth_limit, spec_scan_ctx);
        if b_should_descend {
            walk_directory(&_dir_entry.path_dir_sub, n_depth_relative + 1, spec_scan_ctx);
        }
    }
}

fn handle_dir_entry(
    spec_dir_entry: &SpecDirEntry,
    depth_value: usize,
    depth_limit: Option<usize>,
    spec_scan_ctx: &mut SpecScanContext,
) -> bool {
    if spec_dir_entry.if_is_symlink
        && spec_scan_ctx.spec_scan_options.rule_symlink == EnumScanSymlinkStrategy::SkipSymlinks
    {
        spec_scan_ctx.builder_scan_report.add_skipped();
        return false;
    }
    // Children of this directory sit one level deeper.
    if !is_depth_within_limit(depth_value + 1, depth_limit) {
        return false;
    }
    if should_exclude_by_patterns(
        &spec_dir_entry.name_dir,
        None,
        spec_scan_ctx.spec_scan_pats.patterns_exclude_dirs.as_ref(),
    ) {
        spec_scan_ctx.builder_scan_report.add_skipped();
        return false;
    }
    true
}

fn handle_file_entry(
    spec_file_entry: SpecFileEntry,
    depth_value: usize,
    spec_scan_ctx: &mut SpecScanContext,
) {
    if spec_file_entry.if_is_symlink {
        if spec_scan_ctx.spec_scan_options.rule_symlink == EnumScanSymlinkStrategy::SkipSymlinks {
            spec_scan_ctx.builder_scan_report.add_skipped();
            return;
        }
        if !spec_file_entry.path_file.exists() {
            spec_scan_ctx.builder_scan_report.add_warning(format!(
                "Broken symlink: {}",
                spec_file_entry.path_file.display()
            ));
            return;
        }
    }

    if !is_depth_within_limit(depth_value, spec_scan_ctx.spec_scan_options.depth_limit) {
        spec_scan_ctx.builder_scan_report.add_skipped();
        return;
    }

    if should_exclude_by_patterns(
        &spec_file_entry.name_file,
        spec_scan_ctx.spec_scan_pats.patterns_include_files.as_ref(),
        spec_scan_ctx.spec_scan_pats.patterns_exclude_files.as_ref(),
    ) {
        spec_scan_ctx.builder_scan_report.add_skipped();
        return;
    }

    spec_scan_ctx.builder_scan_report.add_matched();
    spec_scan_ctx.l_files.push(spec_file_entry.path_file);
}
