//! End-to-end report run.

use chrono::NaiveDate;

use crate::aggregate::aggregate_rows;
use crate::collect::{SpecCollectContext, collect_rows};
use crate::config::SpecReportConfig;
use crate::error::ReportError;
use crate::layout::render_dated_sheet;
use crate::maintain::{
    apply_conflict_policy, drop_empty_default_sheet, load_output_workbook, persist_workbook,
    sort_dated_sheets,
};
use crate::normalize::{format_sheet_name, format_target_date};
use crate::report::{ReportRun, ReportRunBuilder};
use crate::spec::EnumProduct;

/// Build (or rebuild) the dated sheet of `product` for `target_date`.
///
/// Steps:
/// 1. Load the output workbook and apply the conflict policy, so a conflict
///    aborts before any source file is read.
/// 2. Collect and normalize source rows, skipping unreadable files.
/// 3. Aggregate, render the dated sheet and sort dated sheets.
/// 4. Persist through a temporary file.
///
/// Concurrent runs against the same output file are unsupported; the last
/// writer wins.
pub fn run_report(
    cfg: &SpecReportConfig,
    product: EnumProduct,
    target_date: NaiveDate,
) -> Result<ReportRun, ReportError> {
    cfg.validate()?;
    let schema = cfg.derive_product_schema(product);
    let c_sheet_name = format_sheet_name(target_date);
    tracing::info!(
        "[{}] building sheet {c_sheet_name:?} for {} into {}",
        product.as_str(),
        format_target_date(target_date),
        schema.output_path.display()
    );

    let mut builder_run = ReportRunBuilder {
        sheet_name: c_sheet_name.clone(),
        path_output: schema.output_path.clone(),
        ..Default::default()
    };

    let mut workbook = load_output_workbook(&schema.output_path, &schema, &mut builder_run)?;
    if drop_empty_default_sheet(&mut workbook) {
        tracing::debug!("Dropped empty default sheet");
    }
    apply_conflict_policy(
        &mut workbook,
        &c_sheet_name,
        schema.conflict_policy,
        &schema.output_path,
    )?;

    let ctx = SpecCollectContext::new(cfg, &schema, target_date)?;
    let l_rows_collected = collect_rows(cfg, &ctx, &mut builder_run)?;
    let l_rows_report = aggregate_rows(l_rows_collected, schema.grouping);

    let (grid, stats) = render_dated_sheet(
        &c_sheet_name,
        target_date,
        &l_rows_report,
        &schema,
        &cfg.workshops,
    )?;
    tracing::debug!(
        "Rendered {} body row(s), {} merge(s), {} trailing row(s) trimmed",
        stats.n_rows_body,
        stats.n_merges,
        stats.n_rows_trimmed
    );
    builder_run.add_counts(&["cnt_items_rendered"], stats.n_rows_body as u64);
    workbook
        .push_sheet(grid)
        .map_err(|message| ReportError::Render {
            sheet: c_sheet_name.clone(),
            message,
        })?;
    sort_dated_sheets(&mut workbook)?;

    let report_xlsx = persist_workbook(&workbook, &schema.output_path, cfg.derive_formats())?;
    builder_run.warnings.extend(report_xlsx.warnings);

    let report_run = builder_run.build();
    tracing::info!("{}", report_run.format(&format!("[{}]", product.as_str())));
    Ok(report_run)
}
