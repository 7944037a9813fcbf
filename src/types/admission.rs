//! Admission batch types: uploaded files, normalized rows, per-row
//! outcomes, and the queued-job wire types for the JetStream processor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::student::CreatedStudent;

/// One uploaded admission file submission.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub file_name: String,
    pub description: String,
    pub content: Vec<u8>,
}

/// One data record of an admission file, keyed by the normalized header.
/// All values are surrounding-whitespace-trimmed; case is preserved so the
/// report can echo the administrator's input back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionRow {
    pub regno: String,
    pub email: String,
    pub firstname: String,
    pub surname: String,
    pub othername: String,
    pub mobile: String,
    pub departmentid: String,
    pub programmeid: String,
    pub levelid: String,
}

/// Outcome of one row after validation and upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Created,
    Updated,
    Failed,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Created => "Created",
            RowStatus::Updated => "Updated",
            RowStatus::Failed => "Failed",
        }
    }
}

/// Summary of a completed batch run.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub total: u32,
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
    /// Annotated report CSV; empty when the file contained no data rows.
    pub report: Vec<u8>,
}

// =============================================================================
// Queued admission job wire types
// =============================================================================

/// Request to import one admission file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionJobRequest {
    pub file_name: String,
    #[serde(default)]
    pub description: String,
    pub file_base64: String,
}

/// An admission job as stored on the JetStream work queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAdmissionJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub request: AdmissionJobRequest,
}

impl QueuedAdmissionJob {
    pub fn new(user_id: Uuid, request: AdmissionJobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            submitted_at: Utc::now(),
            request,
        }
    }
}

/// Status of an admission job, published on its status subject
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AdmissionJobStatus {
    Queued {
        position: u32,
    },
    Processing,
    Completed {
        total: u32,
        created: u32,
        updated: u32,
        failed: u32,
        report_base64: String,
        duration_ms: u64,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionJobStatusUpdate {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub status: AdmissionJobStatus,
}

impl AdmissionJobStatusUpdate {
    pub fn new(job_id: Uuid, status: AdmissionJobStatus) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionJobSubmitResponse {
    pub job_id: Uuid,
    pub message: String,
}

/// Request for the annotated report of a processed batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReportRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReportResponse {
    pub file_name: String,
    pub content_type: String,
    pub file_base64: String,
}

// =============================================================================
// Queued notification job wire types
// =============================================================================

/// One registration-notification email job, queued per created student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationEmailJob {
    pub id: Uuid,
    pub queued_at: DateTime<Utc>,
    pub student: CreatedStudent,
}

impl RegistrationEmailJob {
    pub fn new(student: CreatedStudent) -> Self {
        Self {
            id: Uuid::new_v4(),
            queued_at: Utc::now(),
            student,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_status_as_str() {
        assert_eq!(RowStatus::Created.as_str(), "Created");
        assert_eq!(RowStatus::Updated.as_str(), "Updated");
        assert_eq!(RowStatus::Failed.as_str(), "Failed");
    }

    #[test]
    fn test_admission_job_status_wire_format() {
        let update = AdmissionJobStatusUpdate::new(
            Uuid::new_v4(),
            AdmissionJobStatus::Queued { position: 1 },
        );
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["state"], "queued");
        assert_eq!(json["position"], 1);
    }

    #[test]
    fn test_queued_job_roundtrip() {
        let job = QueuedAdmissionJob::new(
            Uuid::new_v4(),
            AdmissionJobRequest {
                file_name: "admissions.csv".into(),
                description: "2026 intake".into(),
                file_base64: "cmVnbm8=".into(),
            },
        );
        let bytes = serde_json::to_vec(&job).unwrap();
        let back: QueuedAdmissionJob = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.request.file_name, "admissions.csv");
    }
}
