//! TOML configuration: deployment paths, source layout and product overlays.
//!
//! Every field is defaulted, so an empty file (or no file) yields the
//! built-in deployment.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use depotkit_io_fs::{EnumScanPatternMode, EnumScanSymlinkStrategy, SpecScanOptions};
use depotkit_io_xlsx::util::derive_cell_index_from_ref;
use depotkit_io_xlsx::{SpecCellFormat, derive_default_xlsx_formats};
use serde::Deserialize;

use crate::conf::{
    C_DATE_CELL_DEFAULT, C_INPUT_ROOT_DEFAULT, C_PATTERN_SOURCE_FILE, C_PATTERN_TEMP_FILE,
    L_WORKSHOPS_DEFAULT, N_HEADER_ROW_IDX_DEFAULT, derive_default_plan_schema,
    derive_default_qc_schema,
};
use crate::error::ReportError;
use crate::spec::{EnumProduct, SpecProductPatch, SpecProductSchema, SpecSourceColumns};

/// Environment variable naming a configuration file.
pub const C_ENV_CONFIG: &str = "DEPOTKIT_CONFIG";

/// Full run configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecReportConfig {
    /// Root holding one sub-directory per workshop.
    pub input_root: PathBuf,
    /// Workshop codes, in scan order.
    pub workshops: Vec<String>,
    /// Glob patterns a source file name must match.
    pub patterns_include_files: Vec<String>,
    /// Glob patterns rejecting source file names (lock files).
    pub patterns_exclude_files: Vec<String>,
    /// Workshop directory traversal options.
    pub scan: SpecScanConfig,
    /// Zero-based row of the source column labels.
    pub header_row_idx: usize,
    /// `A1` reference of the cell carrying an embedded sheet date.
    pub date_cell: String,
    /// Source files read in parallel when greater than 1.
    pub num_workers_max: usize,
    /// Source column table.
    pub columns: SpecSourceColumns,
    /// Format preset overrides, merged over the built-in presets.
    pub formats: BTreeMap<String, SpecCellFormat>,
    /// Plan product overlay.
    pub plan: SpecProductPatch,
    /// QC request product overlay.
    pub qc_request: SpecProductPatch,
}

impl Default for SpecReportConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from(C_INPUT_ROOT_DEFAULT),
            workshops: L_WORKSHOPS_DEFAULT.iter().map(|s| s.to_string()).collect(),
            patterns_include_files: vec![C_PATTERN_SOURCE_FILE.to_string()],
            patterns_exclude_files: vec![C_PATTERN_TEMP_FILE.to_string()],
            scan: SpecScanConfig::default(),
            header_row_idx: N_HEADER_ROW_IDX_DEFAULT,
            date_cell: C_DATE_CELL_DEFAULT.to_string(),
            num_workers_max: 1,
            columns: SpecSourceColumns::default(),
            formats: BTreeMap::new(),
            plan: SpecProductPatch::default(),
            qc_request: SpecProductPatch::default(),
        }
    }
}

/// How file and directory patterns are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumPatternModeConf {
    #[default]
    Glob,
    Regex,
    Literal,
}

impl From<EnumPatternModeConf> for EnumScanPatternMode {
    fn from(value: EnumPatternModeConf) -> Self {
        match value {
            EnumPatternModeConf::Glob => EnumScanPatternMode::Glob,
            EnumPatternModeConf::Regex => EnumScanPatternMode::Regex,
            EnumPatternModeConf::Literal => EnumScanPatternMode::Literal,
        }
    }
}

/// `[scan]` table: traversal of each workshop directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecScanConfig {
    /// Interpretation of every include/exclude pattern.
    pub pattern_mode: EnumPatternModeConf,
    /// Patterns rejecting sub-directory names (archives, backups).
    pub patterns_exclude_dirs: Vec<String>,
    /// Maximum depth below a workshop directory (its files have depth 1).
    pub depth_limit: Option<usize>,
    /// Follow symbolic links instead of skipping them.
    pub follow_symlinks: bool,
    /// Match glob patterns case-insensitively.
    pub case_insensitive: bool,
}

impl Default for SpecScanConfig {
    fn default() -> Self {
        Self {
            pattern_mode: EnumPatternModeConf::Glob,
            patterns_exclude_dirs: Vec::new(),
            depth_limit: None,
            follow_symlinks: false,
            case_insensitive: true,
        }
    }
}

impl SpecReportConfig {
    /// Scan options shared by every workshop directory.
    pub fn derive_scan_options(&self) -> SpecScanOptions {
        SpecScanOptions {
            patterns_include_files: Some(self.patterns_include_files.clone()),
            patterns_exclude_files: Some(self.patterns_exclude_files.clone()),
            patterns_exclude_dirs: Some(self.scan.patterns_exclude_dirs.clone()),
            rule_pattern: self.scan.pattern_mode.into(),
            rule_symlink: if self.scan.follow_symlinks {
                EnumScanSymlinkStrategy::Follow
            } else {
                EnumScanSymlinkStrategy::SkipSymlinks
            },
            depth_limit: self.scan.depth_limit,
            if_case_insensitive: self.scan.case_insensitive,
        }
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ReportError> {
        let cfg: SpecReportConfig =
            toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolved schema of one product.
    pub fn derive_product_schema(&self, product: EnumProduct) -> SpecProductSchema {
        match product {
            EnumProduct::Plan => derive_default_plan_schema().with_(&self.plan),
            EnumProduct::QcRequest => derive_default_qc_schema().with_(&self.qc_request),
        }
    }

    /// Built-in presets with configured overrides merged in.
    pub fn derive_formats(&self) -> BTreeMap<String, SpecCellFormat> {
        let mut dict_fmt = derive_default_xlsx_formats();
        for (c_key, fmt_override) in &self.formats {
            let fmt_merged = match dict_fmt.get(c_key) {
                Some(fmt_base) => fmt_base.merge(fmt_override),
                None => fmt_override.clone(),
            };
            dict_fmt.insert(c_key.clone(), fmt_merged);
        }
        dict_fmt
    }

    /// Zero-based `(row, col)` of [`Self::date_cell`].
    pub fn date_cell_index(&self) -> Result<(usize, usize), ReportError> {
        derive_cell_index_from_ref(&self.date_cell)
            .ok_or_else(|| ReportError::Config(format!("Invalid date_cell {:?}", self.date_cell)))
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.workshops.is_empty() {
            return Err(ReportError::Config("`workshops` must not be empty".to_string()));
        }
        if let Some(c_code) = self.workshops.iter().find(|c| c.trim().is_empty()) {
            return Err(ReportError::Config(format!(
                "Blank workshop code {c_code:?} in `workshops`"
            )));
        }
        self.date_cell_index()?;
        if self.scan.depth_limit == Some(0) {
            return Err(ReportError::Config(
                "`scan.depth_limit` must be >= 1".to_string(),
            ));
        }

        let dict_fmt = self.derive_formats();
        for product in [EnumProduct::Plan, EnumProduct::QcRequest] {
            validate_product_schema(product, &self.derive_product_schema(product), &dict_fmt)?;
        }
        Ok(())
    }
}

fn validate_product_schema(
    product: EnumProduct,
    schema: &SpecProductSchema,
    dict_fmt: &BTreeMap<String, SpecCellFormat>,
) -> Result<(), ReportError> {
    let c_product = product.as_str();
    if schema.columns.is_empty() {
        return Err(ReportError::Config(format!(
            "[{c_product}] output schema has no columns"
        )));
    }
    for field in &schema.merge_levels {
        if schema.column_of(*field).is_none() {
            return Err(ReportError::Config(format!(
                "[{c_product}] merge level {field:?} is not an output column"
            )));
        }
    }
    for column in &schema.columns {
        if let Some(c_fmt) = &column.fmt
            && !dict_fmt.contains_key(c_fmt)
        {
            return Err(ReportError::Config(format!(
                "[{c_product}] column {:?} uses unknown format {c_fmt:?}",
                column.caption
            )));
        }
        if !(column.width.is_finite() && column.width >= 0.0) {
            return Err(ReportError::Config(format!(
                "[{c_product}] column {:?} has invalid width {}",
                column.caption, column.width
            )));
        }
    }
    for title in &schema.titles {
        if StrftimeItems::new(&title.template).any(|item| matches!(item, Item::Error)) {
            return Err(ReportError::Config(format!(
                "[{c_product}] invalid date template {:?}",
                title.template
            )));
        }
        if !dict_fmt.contains_key(&title.fmt) {
            return Err(ReportError::Config(format!(
                "[{c_product}] title uses unknown format {:?}",
                title.fmt
            )));
        }
    }
    Ok(())
}

/// Load configuration from `path`, or built-in defaults when `None`.
pub fn load_config(path: Option<&Path>) -> Result<SpecReportConfig, ReportError> {
    let Some(path) = path else {
        tracing::debug!("No configuration file; using built-in defaults");
        return Ok(SpecReportConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| ReportError::Config(format!("Failed to read {}: {e}", path.display())))?;
    let cfg = SpecReportConfig::from_toml_str(&text)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumConflictPolicy, EnumOutputField};

    #[test]
    fn empty_file_is_the_default_deployment() {
        let cfg = SpecReportConfig::from_toml_str("").expect("empty config");
        assert_eq!(cfg, SpecReportConfig::default());
        assert_eq!(cfg.workshops, vec!["ЦКТ", "ЦПМ", "МСЦ", "ЭМУ"]);
        assert_eq!(cfg.date_cell_index().expect("A1"), (0, 0));
    }

    #[test]
    fn overlays_apply_per_product() {
        let cfg = SpecReportConfig::from_toml_str(
            r##"
input_root = "/data/in"
workshops = ["A"]
num_workers_max = 4

[columns.time_end]
label = "План"
offset = 2

[qc_request]
conflict_policy = "error"
output_path = "/data/out/qc.xlsx"

[formats.header]
bg_color = "#DDDDDD"
"##,
        )
        .expect("config");

        assert_eq!(cfg.input_root, PathBuf::from("/data/in"));
        assert_eq!(cfg.columns.time_end.offset, 2);
        assert_eq!(cfg.columns.locomotive.label, "№ тепловоза");

        let schema_qc = cfg.derive_product_schema(EnumProduct::QcRequest);
        assert_eq!(schema_qc.conflict_policy, EnumConflictPolicy::Error);
        assert_eq!(schema_qc.output_path, PathBuf::from("/data/out/qc.xlsx"));
        let schema_plan = cfg.derive_product_schema(EnumProduct::Plan);
        assert_eq!(schema_plan.conflict_policy, EnumConflictPolicy::Replace);

        let dict_fmt = cfg.derive_formats();
        assert_eq!(dict_fmt["header"].bg_color.as_deref(), Some("#DDDDDD"));
        assert_eq!(dict_fmt["header"].bold, Some(true));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        for text in [
            "workshops = []",
            "unknown_key = 1",
            "date_cell = \"1A\"",
            "[plan]\ncolumns = []",
            "[plan]\nmerge_levels = [\"quantity\"]",
            "[plan]\ntitles = [{ template = \"%Q\", fmt = \"title\" }]",
            "[plan]\ncolumns = [{ caption = \"x\", field = \"work_name\", width = 5.0, \
             fmt = \"nope\" }]",
            "[qc_request]\nconflict_policy = \"merge\"",
            "[scan]\ndepth_limit = 0",
            "[scan]\npattern_mode = \"fuzzy\"",
            "[scan]\nfollow = true",
        ] {
            let err = SpecReportConfig::from_toml_str(text).expect_err(text);
            assert!(matches!(err, ReportError::Config(_)), "{text}: {err}");
        }
    }

    #[test]
    fn scan_table_maps_onto_walker_options() {
        let spec_default = SpecReportConfig::default().derive_scan_options();
        assert_eq!(spec_default.rule_pattern, EnumScanPatternMode::Glob);
        assert_eq!(spec_default.rule_symlink, EnumScanSymlinkStrategy::SkipSymlinks);
        assert_eq!(spec_default.patterns_exclude_dirs, Some(Vec::new()));
        assert!(spec_default.if_case_insensitive);

        let cfg = SpecReportConfig::from_toml_str(
            r#"
patterns_include_files = ['^[^~].*\.xlsx$']
patterns_exclude_files = []

[scan]
pattern_mode = "regex"
patterns_exclude_dirs = ["^archive$"]
depth_limit = 2
follow_symlinks = true
case_insensitive = false
"#,
        )
        .expect("config");
        let spec_scan = cfg.derive_scan_options();
        assert_eq!(spec_scan.rule_pattern, EnumScanPatternMode::Regex);
        assert_eq!(spec_scan.rule_symlink, EnumScanSymlinkStrategy::Follow);
        assert_eq!(spec_scan.depth_limit, Some(2));
        assert!(!spec_scan.if_case_insensitive);
        assert_eq!(spec_scan.patterns_exclude_files, Some(Vec::new()));
        assert_eq!(
            spec_scan.patterns_exclude_dirs,
            Some(vec!["^archive$".to_string()])
        );
    }

    #[test]
    fn merge_levels_use_snake_case_fields() {
        let cfg = SpecReportConfig::from_toml_str("[plan]\nmerge_levels = [\"locomotive\"]")
            .expect("config");
        assert_eq!(
            cfg.derive_product_schema(EnumProduct::Plan).merge_levels,
            vec![EnumOutputField::Locomotive]
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_config(Some(Path::new("/nonexistent/depotkit.toml"))).expect_err("missing");
        assert!(matches!(err, ReportError::Config(_)));
        assert_eq!(load_config(None).expect("defaults"), SpecReportConfig::default());
    }
}
