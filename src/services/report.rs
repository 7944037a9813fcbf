//! Per-row outcome accumulation and report serialization.
//!
//! The report mirrors the uploaded file row for row, in file order, with
//! `status` and `error` appended. Columns are written in a fixed order
//! regardless of how the input header was arranged, so two runs of the
//! same data always diff cleanly.

use crate::error::AdmissionError;
use crate::types::admission::{AdmissionRow, RowStatus};

/// Column order of the annotated report.
pub const REPORT_FIELDS: [&str; 11] = [
    "regno",
    "email",
    "firstname",
    "surname",
    "othername",
    "mobile",
    "departmentid",
    "programmeid",
    "levelid",
    "status",
    "error",
];

#[derive(Debug, Clone)]
struct ReportRow {
    row: AdmissionRow,
    status: RowStatus,
    error: String,
}

#[derive(Debug, Default)]
pub struct ReportWriter {
    rows: Vec<ReportRow>,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one input row. `error` is empty for
    /// successful rows and newline-joined messages for failed ones.
    pub fn record(&mut self, row: AdmissionRow, status: RowStatus, error: String) {
        self.rows.push(ReportRow { row, status, error });
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    /// (created, updated, failed)
    pub fn counts(&self) -> (u32, u32, u32) {
        let mut created = 0;
        let mut updated = 0;
        let mut failed = 0;
        for entry in &self.rows {
            match entry.status {
                RowStatus::Created => created += 1,
                RowStatus::Updated => updated += 1,
                RowStatus::Failed => failed += 1,
            }
        }
        (created, updated, failed)
    }

    /// Serialize the report as comma-delimited CSV bytes.
    pub fn to_csv(&self) -> Result<Vec<u8>, AdmissionError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(REPORT_FIELDS)
            .map_err(|e| AdmissionError::Report(e.to_string()))?;

        for entry in &self.rows {
            let row = &entry.row;
            writer
                .write_record([
                    row.regno.as_str(),
                    row.email.as_str(),
                    row.firstname.as_str(),
                    row.surname.as_str(),
                    row.othername.as_str(),
                    row.mobile.as_str(),
                    row.departmentid.as_str(),
                    row.programmeid.as_str(),
                    row.levelid.as_str(),
                    entry.status.as_str(),
                    entry.error.as_str(),
                ])
                .map_err(|e| AdmissionError::Report(e.to_string()))?;
        }

        writer
            .into_inner()
            .map_err(|e| AdmissionError::Report(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
