//! `depotkit_report` v1:
//! Daily plan and QC request workbooks built from per-workshop work orders.
//!
//! - `collect`   : source discovery, sheet matching, row extraction
//! - `normalize` : significance rules, cleaning, value and date parsing
//! - `aggregate` : locomotive -> workshop grouping, flat workshop order
//! - `layout`    : dated sheet rendering, key-run merges, trailing cleanup
//! - `maintain`  : output workbook load, conflict policy, sheet order, save
//! - `pipeline`  : end-to-end run
//! - `config`    : TOML configuration
//! - `conf`      : deployment constants and default product schemas
//! - `spec`      : domain records and schema models
//! - `report`    : run report model
//! - `error`     : error types

pub mod aggregate;
pub mod collect;
pub mod conf;
pub mod config;
pub mod error;
pub mod layout;
pub mod maintain;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod spec;

pub use aggregate::{AggregationTable, aggregate_rows};
pub use config::{C_ENV_CONFIG, SpecReportConfig, load_config};
pub use error::{ReportError, SourceFileError};
pub use normalize::{format_sheet_name, format_target_date, parse_target_date};
pub use pipeline::run_report;
pub use report::{ReportRun, ReportRunBuilder};
pub use spec::{
    EnumConflictPolicy, EnumProduct, LocomotiveNumber, SpecProductSchema, SpecWorkItem,
    WorkshopCode,
};
