//! Batch-fatal error taxonomy for the admission pipeline.
//!
//! These are the errors that stop a batch before any row is processed.
//! Per-row problems are never errors at this level; they become a
//! `Failed` status in the report and the batch keeps going.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Invalid file encoding format. Only utf-8 and utf-16 file encoding formats are supported.")]
    UnsupportedEncoding,

    #[error("Invalid content. Required columns are missing: {0}.")]
    MissingColumns(String),

    #[error("Invalid content. Remove extra columns: {0}.")]
    ExtraColumns(String),

    #[error("Invalid content. Row {line} does not match the header.")]
    RaggedRow { line: usize },

    #[error("The uploaded file is empty.")]
    EmptyFile,

    #[error("Failed to serialize report: {0}")]
    Report(String),
}
