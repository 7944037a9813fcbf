//! Batch orchestration: one uploaded admission file, start to finish.
//!
//! Flow: decode → normalize → per-row validate/upsert (strictly in file
//! order, one row at a time) → serialize report → hand the created-account
//! list to the notification collaborator. Encoding and header problems
//! abort before any row is touched; once the row loop starts, nothing
//! short of process death stops the batch from reaching its report.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::db::store::{AdmissionStore, UpsertOutcome};
use crate::error::AdmissionError;
use crate::services::decoder;
use crate::services::normalizer;
use crate::services::notification::NotificationSender;
use crate::services::report::ReportWriter;
use crate::services::upsert::UpsertCoordinator;
use crate::services::validator::{RowValidator, RowVerdict};
use crate::types::admission::{BatchOutcome, RowStatus, UploadBatch};
use crate::types::student::CreatedStudent;

pub struct BulkImportJob {
    store: Arc<dyn AdmissionStore>,
    notifier: Arc<dyn NotificationSender>,
}

impl BulkImportJob {
    pub fn new(store: Arc<dyn AdmissionStore>, notifier: Arc<dyn NotificationSender>) -> Self {
        Self { store, notifier }
    }

    /// Process one batch. A returned error means the batch stopped before
    /// any row was processed and nothing was written.
    pub async fn run(&self, batch: &UploadBatch) -> Result<BatchOutcome, AdmissionError> {
        let decoded = decoder::decode(&batch.content)?;
        info!(
            file = %batch.file_name,
            encoding = decoded.encoding.as_str(),
            delimiter = %(decoded.delimiter as char),
            "Decoded admission file"
        );

        let rows = normalizer::normalize(&decoded.text, decoded.delimiter)?;
        info!(file = %batch.file_name, rows = rows.len(), "Normalized admission rows");

        // Fresh validator per batch: the duplicate set must never outlive
        // the file that filled it.
        let mut validator = RowValidator::new(Arc::clone(&self.store));
        let coordinator = UpsertCoordinator::new(Arc::clone(&self.store));
        let mut report = ReportWriter::new();
        let mut new_students: Vec<CreatedStudent> = Vec::new();

        for row in rows {
            match validator.validate(&row).await {
                Ok(RowVerdict::Valid(candidate)) => match coordinator.apply(&candidate).await {
                    Ok(UpsertOutcome::Created) => {
                        new_students.push(CreatedStudent::from_candidate(&candidate));
                        report.record(row, RowStatus::Created, String::new());
                    }
                    Ok(UpsertOutcome::Updated) => {
                        report.record(row, RowStatus::Updated, String::new());
                    }
                    Err(e) => {
                        warn!(regno = %candidate.registration_number, "Row upsert failed: {}", e);
                        report.record(row, RowStatus::Failed, e.to_string());
                    }
                },
                Ok(RowVerdict::Invalid(errors)) => {
                    warn!(regno = %row.regno, "Row rejected: {}", errors.join("; "));
                    report.record(row, RowStatus::Failed, errors.join("\n"));
                }
                Err(e) => {
                    // Store lookup failed mid-validation. The row is lost to
                    // this run but the rest of the file still gets its turn.
                    error!(regno = %row.regno, "Store error while validating row: {}", e);
                    report.record(row, RowStatus::Failed, e.to_string());
                }
            }
        }

        let report_bytes = if report.is_empty() {
            info!(file = %batch.file_name, "No data rows; skipping report");
            Vec::new()
        } else {
            report.to_csv()?
        };

        let (created, updated, failed) = report.counts();
        info!(
            file = %batch.file_name,
            description = %batch.description,
            created, updated, failed,
            "Admission batch processed"
        );

        if !new_students.is_empty() {
            if let Err(e) = self.notifier.notify_created(&new_students).await {
                // Notification is best-effort; the upserts stand regardless.
                error!(file = %batch.file_name, "Failed to queue registration notifications: {}", e);
            }
        }

        Ok(BatchOutcome {
            total: report.row_count(),
            created,
            updated,
            failed,
            report: report_bytes,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemoryAdmissionStore;
    use crate::services::notification::FakeNotificationSender;

    const HEADER: &str = "regno,email,firstname,surname,othername,mobile,departmentid,programmeid,levelid";

    fn batch(content: &[u8]) -> UploadBatch {
        UploadBatch {
            file_name: "admissions.csv".into(),
            description: "2026 intake".into(),
            content: content.to_vec(),
        }
    }

    fn fixture() -> (Arc<MemoryAdmissionStore>, Arc<FakeNotificationSender>, BulkImportJob) {
        let store = Arc::new(MemoryAdmissionStore::new());
        store.add_department(1, "computer science");
        let notifier = Arc::new(FakeNotificationSender::new());
        let job = BulkImportJob::new(
            Arc::clone(&store) as Arc<dyn AdmissionStore>,
            Arc::clone(&notifier) as Arc<dyn NotificationSender>,
        );
        (store, notifier, job)
    }

    fn report_lines(outcome: &BatchOutcome) -> Vec<String> {
        String::from_utf8(outcome.report.clone())
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[tokio::test]
    async fn single_valid_row_creates_account() {
        let (store, notifier, job) = fixture();
        let text = format!("{}\nA100,a@x.com,Ann,Lee,,0912345678,1,2,3\n", HEADER);

        let outcome = job.run(&batch(text.as_bytes())).await.unwrap();
        assert_eq!((outcome.created, outcome.updated, outcome.failed), (1, 0, 0));

        let lines = report_lines(&outcome);
        assert!(lines[1].ends_with(",Created,"));

        let stored = store.student("A100").unwrap();
        assert_eq!(stored.email, "a@x.com");
        assert_eq!(stored.current_level, 3);
        assert_eq!(stored.programme, 2);

        let batches = notifier.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].registration_number, "A100");
    }

    #[tokio::test]
    async fn rerun_of_identical_file_updates_every_row() {
        let (store, _, job) = fixture();
        let text = format!(
            "{}\nA100,a@x.com,Ann,Lee,,,1,2,3\nB200,b@x.com,Bo,Li,,,1,1,1\n",
            HEADER
        );

        let first = job.run(&batch(text.as_bytes())).await.unwrap();
        assert_eq!((first.created, first.updated, first.failed), (2, 0, 0));

        let second = job.run(&batch(text.as_bytes())).await.unwrap();
        assert_eq!((second.created, second.updated, second.failed), (0, 2, 0));

        // Exactly one account per registration number.
        assert_eq!(store.student_count(), 2);
    }

    #[tokio::test]
    async fn rerun_with_changed_surname_updates_account() {
        let (store, notifier, job) = fixture();
        let original = format!("{}\nA100,a@x.com,Ann,Lee,,,1,2,3\n", HEADER);
        let changed = format!("{}\nA100,a@x.com,Ann,Smith,,,1,2,3\n", HEADER);

        job.run(&batch(original.as_bytes())).await.unwrap();
        let outcome = job.run(&batch(changed.as_bytes())).await.unwrap();

        assert_eq!((outcome.created, outcome.updated), (0, 1));
        let stored = store.student("A100").unwrap();
        assert_eq!(stored.surname, "Smith");
        assert_eq!(stored.full_name, "Ann Smith");
        // Only the first run produced a notification.
        assert_eq!(notifier.batches().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_regno_second_occurrence_fails() {
        let (store, _, job) = fixture();
        let text = format!(
            "{}\nA100,a@x.com,Ann,Lee,,,1,2,3\nA100,b@x.com,Ann,Lee,,,1,2,3\n",
            HEADER
        );

        let outcome = job.run(&batch(text.as_bytes())).await.unwrap();
        assert_eq!((outcome.created, outcome.failed), (1, 1));

        let lines = report_lines(&outcome);
        assert!(lines[1].ends_with(",Created,"));
        assert!(lines[2].contains("Failed"));
        assert!(lines[2].contains("more than once in the file"));
        assert_eq!(store.student_count(), 1);
        assert_eq!(store.student("A100").unwrap().email, "a@x.com");
    }

    #[tokio::test]
    async fn utf16_file_matches_utf8_outcomes() {
        let text = format!("{}\nA100,a@x.com,Ann,Lee,,,1,2,3\n", HEADER);
        let mut utf16 = vec![0xff, 0xfe];
        for unit in text.encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }

        let (_, _, utf8_job) = fixture();
        let utf8_outcome = utf8_job.run(&batch(text.as_bytes())).await.unwrap();

        let (_, _, utf16_job) = fixture();
        let utf16_outcome = utf16_job.run(&batch(&utf16)).await.unwrap();

        assert_eq!(utf8_outcome.created, utf16_outcome.created);
        assert_eq!(utf8_outcome.failed, utf16_outcome.failed);
        assert_eq!(utf8_outcome.report, utf16_outcome.report);
    }

    #[tokio::test]
    async fn unknown_department_row_leaves_store_untouched() {
        let (store, notifier, job) = fixture();
        let text = format!("{}\nA100,a@x.com,Ann,Lee,,,9,2,3\n", HEADER);

        let outcome = job.run(&batch(text.as_bytes())).await.unwrap();
        assert_eq!((outcome.created, outcome.failed), (0, 1));

        let lines = report_lines(&outcome);
        assert!(lines[1].contains("does not exist"));
        assert_eq!(store.student_count(), 0);
        assert!(notifier.batches().is_empty());
    }

    #[tokio::test]
    async fn failed_row_does_not_stop_later_rows() {
        let (store, _, job) = fixture();
        let text = format!(
            "{}\nA100,broken-email,Ann,Lee,,,1,2,3\nB200,b@x.com,Bo,Li,,,1,1,1\n",
            HEADER
        );

        let outcome = job.run(&batch(text.as_bytes())).await.unwrap();
        assert_eq!((outcome.created, outcome.failed), (1, 1));
        assert!(store.student("B200").is_some());
    }

    #[tokio::test]
    async fn report_has_one_row_per_input_row_in_order() {
        let (_, _, job) = fixture();
        let text = format!(
            "{}\nC300,c@x.com,Cy,Ode,,,1,2,3\nA100,broken,Ann,Lee,,,1,2,3\nB200,b@x.com,Bo,Li,,,1,1,1\n",
            HEADER
        );

        let outcome = job.run(&batch(text.as_bytes())).await.unwrap();
        let lines = report_lines(&outcome);
        assert_eq!(outcome.total, 3);
        assert!(lines[1].starts_with("C300,"));
        assert!(lines[2].starts_with("A100,"));
        assert!(lines[3].starts_with("B200,"));
    }

    #[tokio::test]
    async fn invalid_encoding_aborts_with_nothing_written() {
        let (store, notifier, job) = fixture();
        let outcome = job.run(&batch(&[0xc3, 0x28, 0x00])).await;
        assert!(matches!(outcome, Err(AdmissionError::UnsupportedEncoding)));
        assert_eq!(store.student_count(), 0);
        assert!(notifier.batches().is_empty());
    }

    #[tokio::test]
    async fn invalid_header_aborts_with_nothing_written() {
        let (store, _, job) = fixture();
        let outcome = job.run(&batch(b"regno,email\nA100,a@x.com\n")).await;
        assert!(matches!(outcome, Err(AdmissionError::MissingColumns(_))));
        assert_eq!(store.student_count(), 0);
    }

    #[tokio::test]
    async fn header_only_file_produces_no_report() {
        let (_, _, job) = fixture();
        let outcome = job.run(&batch(format!("{}\n", HEADER).as_bytes())).await.unwrap();
        assert_eq!(outcome.total, 0);
        assert!(outcome.report.is_empty());
    }

    #[tokio::test]
    async fn accumulated_errors_reported_on_one_line_cell() {
        let (_, _, job) = fixture();
        let text = format!("{}\nA!00,broken,Ann,Lee,,,1,2,0\n", HEADER);
        let outcome = job.run(&batch(text.as_bytes())).await.unwrap();
        let report = String::from_utf8(outcome.report).unwrap();
        assert!(report.contains("only letters and digits"));
        assert!(report.contains("is not valid"));
        assert!(report.contains("Level ID must be greater than 0"));
    }
}
