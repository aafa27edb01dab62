//! `depotkit_io_xlsx` v1:
//! Spreadsheet collaborators for the report pipeline.
//!
//! - `reader` : calamine-backed workbook reader (values, tables, merges)
//! - `grid`   : in-memory sheet/workbook model edited by renderers
//! - `writer` : rust_xlsxwriter-backed serializer with atomic save
//! - `conf`   : Excel limits and format presets
//! - `spec`   : shared value/format/merge models and errors
//! - `util`   : sheet naming, merge runs, serial dates

pub mod conf;
pub mod grid;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{EnumFmtKey, derive_default_xlsx_formats};
pub use grid::{SpecGridCell, SpecSheetGrid, SpecWorkbook};
pub use reader::{SpecSheetTable, XlsxReader, derive_sheet_table};
pub use spec::{
    EnumCellValue, SpecCellFormat, SpecCellMerge, SpecXlsxReport, XlsxReadError, XlsxWriteError,
};
pub use writer::XlsxWriter;
