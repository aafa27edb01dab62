//! Error taxonomy of the report pipeline.

use std::path::PathBuf;

use depotkit_io_xlsx::XlsxReadError;

/// Per-file failure; the collector logs it and moves on to the next file.
#[derive(Debug, thiserror::Error)]
pub enum SourceFileError {
    /// Corrupt, locked or otherwise unopenable workbook.
    #[error("Failed to open {}: {message}", .path.display())]
    Open { path: PathBuf, message: String },
    /// A sheet that should be read could not be.
    #[error("Failed to read sheet {sheet:?} of {}: {message}", .path.display())]
    Sheet {
        path: PathBuf,
        sheet: String,
        message: String,
    },
    /// A required column label is absent from the header row.
    #[error("Sheet {sheet:?} of {} has no column {label:?}", .path.display())]
    MissingColumn {
        path: PathBuf,
        sheet: String,
        label: String,
    },
}

impl SourceFileError {
    /// File the failure refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            SourceFileError::Open { path, .. }
            | SourceFileError::Sheet { path, .. }
            | SourceFileError::MissingColumn { path, .. } => path,
        }
    }
}

impl From<XlsxReadError> for SourceFileError {
    fn from(err: XlsxReadError) -> Self {
        match err {
            XlsxReadError::Open { path, message } => SourceFileError::Open { path, message },
            XlsxReadError::Sheet {
                path,
                sheet,
                message,
            } => SourceFileError::Sheet {
                path,
                sheet,
                message,
            },
        }
    }
}

/// Run-level failure; aborts the run with a non-zero exit.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Malformed user-supplied date.
    #[error("Invalid date {0:?}: expected dd.mm.yyyy")]
    InvalidDate(String),
    /// Dated sheet already present under the `error` conflict policy.
    #[error("Sheet {sheet:?} already exists in {}; choose another date", .path.display())]
    SheetConflict { sheet: String, path: PathBuf },
    /// Existing output workbook could not be loaded.
    #[error("Failed to load output workbook {}: {message}", .path.display())]
    OutputRead { path: PathBuf, message: String },
    /// Output workbook could not be saved.
    #[error("Failed to save {}: {message}", .path.display())]
    Persist { path: PathBuf, message: String },
    /// Output grid could not be built.
    #[error("Failed to render sheet {sheet:?}: {message}")]
    Render { sheet: String, message: String },
    /// Unreadable or invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
