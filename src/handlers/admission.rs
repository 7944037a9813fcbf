//! Admission import handlers and JetStream processor.
//!
//! Uploads arrive as base64 file content on `qverse.admission.submit`,
//! are checked for the `.csv` extension, and are queued on a work-queue
//! stream. A single durable consumer processes one batch at a time:
//! later rows of a file depend on earlier ones (duplicate detection), and
//! one batch at a time keeps the database load predictable. The annotated
//! report overwrites the stored upload and is also returned inline with
//! the completion status.
//!
//! ## Streams
//! - `QVERSE_ADMISSION_JOBS` - queued admission imports

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use async_nats::jetstream::{self, Context as JsContext};
use async_nats::{Client, Subscriber};
use base64::Engine;
use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::store::AdmissionStore;
use crate::services::import_job::BulkImportJob;
use crate::services::job_history::JOB_HISTORY;
use crate::services::notification::NotificationSender;
use crate::types::{
    AdmissionJobRequest, AdmissionJobStatus, AdmissionJobStatusUpdate, AdmissionJobSubmitResponse,
    AdmissionReportRequest, AdmissionReportResponse, ErrorResponse, QueuedAdmissionJob, Request,
    SuccessResponse, UploadBatch,
};

const STREAM_NAME: &str = "QVERSE_ADMISSION_JOBS";
const CONSUMER_NAME: &str = "admission_workers";
const SUBJECT: &str = "qverse.jobs.admission";
const STATUS_PREFIX: &str = "qverse.job.admission.status";

/// Admission import processor with JetStream integration
pub struct AdmissionImportProcessor {
    client: Client,
    js: JsContext,
    store: Arc<dyn AdmissionStore>,
    notifier: Arc<dyn NotificationSender>,
    uploads_dir: PathBuf,
    pending_count: AtomicU32,
}

impl AdmissionImportProcessor {
    /// Create a new admission processor, initializing the JetStream stream
    pub async fn new(
        client: Client,
        store: Arc<dyn AdmissionStore>,
        notifier: Arc<dyn NotificationSender>,
        uploads_dir: PathBuf,
    ) -> Result<Self> {
        let js = jetstream::new(client.clone());

        let stream_config = jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![SUBJECT.to_string()],
            max_messages: 1_000,
            max_bytes: 100 * 1024 * 1024, // 100 MB (admission files can be large)
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        js.get_or_create_stream(stream_config).await?;
        info!("JetStream admission stream '{}' ready", STREAM_NAME);

        std::fs::create_dir_all(&uploads_dir)?;

        Ok(Self {
            client,
            js,
            store,
            notifier,
            uploads_dir,
            pending_count: AtomicU32::new(0),
        })
    }

    /// Submit an admission import job to the queue
    pub async fn submit_job(
        &self,
        user_id: Uuid,
        request: AdmissionJobRequest,
    ) -> Result<AdmissionJobSubmitResponse> {
        if !request.file_name.to_lowercase().ends_with(".csv") {
            bail!("Invalid file format. Only csv files are supported.");
        }
        let content = base64::engine::general_purpose::STANDARD
            .decode(&request.file_base64)
            .map_err(|e| anyhow::anyhow!("Invalid file content encoding: {}", e))?;
        if content.is_empty() {
            bail!("The uploaded file is empty.");
        }

        let job = QueuedAdmissionJob::new(user_id, request);
        let job_id = job.id;

        let payload = serde_json::to_vec(&job)?;
        self.js.publish(SUBJECT, payload.into()).await?.await?;

        let pending = self.pending_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Admission job {} submitted ({}), position {} in queue",
            job_id, job.request.file_name, pending
        );

        self.publish_status(job_id, AdmissionJobStatus::Queued { position: pending })
            .await?;

        Ok(AdmissionJobSubmitResponse {
            job_id,
            message: "Admission import job submitted".to_string(),
        })
    }

    /// Publish an admission job status update
    pub async fn publish_status(&self, job_id: Uuid, status: AdmissionJobStatus) -> Result<()> {
        let update = AdmissionJobStatusUpdate::new(job_id, status);
        let subject = format!("{}.{}", STATUS_PREFIX, job_id);
        let payload = serde_json::to_vec(&update)?;

        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    /// Start processing admission jobs from the queue
    pub async fn start_processing(self: Arc<Self>) -> Result<()> {
        let stream = self.js.get_stream(STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: 3,
            filter_subject: SUBJECT.to_string(),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(CONSUMER_NAME, consumer_config)
            .await?;
        info!("JetStream admission consumer '{}' ready", CONSUMER_NAME);

        let mut messages = consumer.messages().await?;

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(msg) => {
                    let processor = Arc::clone(&self);

                    // Batches run strictly one at a time: duplicate detection
                    // is ordered within a file and the row upserts should not
                    // compete with a sibling batch from the same queue.
                    if let Err(e) = processor.process_job(msg).await {
                        error!("Failed to process admission job: {}", e);
                    }
                }
                Err(e) => {
                    error!("Error receiving admission message: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Process a single admission job
    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let job: QueuedAdmissionJob = serde_json::from_slice(&msg.payload)?;
        let job_id = job.id;

        let _ = self
            .pending_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));

        info!("Processing admission job {} ({})", job_id, job.request.file_name);
        self.publish_status(job_id, AdmissionJobStatus::Processing).await?;

        let content = match base64::engine::general_purpose::STANDARD
            .decode(&job.request.file_base64)
        {
            Ok(bytes) => bytes,
            Err(e) => {
                self.finish_failed(&msg, &job, started_at, format!("Invalid file content encoding: {}", e))
                    .await;
                return Ok(());
            }
        };

        // Keep the raw upload on disk as the audit artifact; the annotated
        // report overwrites this same path once processing finishes.
        let upload_path = self.upload_path(&job);
        if let Err(e) = std::fs::write(&upload_path, &content) {
            warn!("Failed to store upload {}: {}", upload_path.display(), e);
        }

        let batch = UploadBatch {
            file_name: job.request.file_name.clone(),
            description: job.request.description.clone(),
            content,
        };

        let runner = BulkImportJob::new(Arc::clone(&self.store), Arc::clone(&self.notifier));
        match runner.run(&batch).await {
            Ok(outcome) => {
                if !outcome.report.is_empty() {
                    if let Err(e) = std::fs::write(&upload_path, &outcome.report) {
                        warn!("Failed to write report {}: {}", upload_path.display(), e);
                    }
                }

                let duration_ms = start_time.elapsed().as_millis() as u64;
                self.publish_status(
                    job_id,
                    AdmissionJobStatus::Completed {
                        total: outcome.total,
                        created: outcome.created,
                        updated: outcome.updated,
                        failed: outcome.failed,
                        report_base64: base64::engine::general_purpose::STANDARD
                            .encode(&outcome.report),
                        duration_ms,
                    },
                )
                .await?;

                JOB_HISTORY.record_completed(
                    job_id,
                    "admission.import",
                    job.user_id,
                    started_at,
                    Some(format!(
                        "{} created, {} updated, {} failed",
                        outcome.created, outcome.updated, outcome.failed
                    )),
                );

                if let Err(e) = msg.ack().await {
                    error!("Failed to ack admission job {}: {:?}", job_id, e);
                }

                info!(
                    "Admission job {} completed in {}ms: {} created, {} updated, {} failed",
                    job_id, duration_ms, outcome.created, outcome.updated, outcome.failed
                );
            }
            Err(e) => {
                warn!("Admission job {} failed: {}", job_id, e);
                self.finish_failed(&msg, &job, started_at, e.to_string()).await;
            }
        }

        Ok(())
    }

    async fn finish_failed(
        &self,
        msg: &jetstream::Message,
        job: &QueuedAdmissionJob,
        started_at: chrono::DateTime<Utc>,
        error_text: String,
    ) {
        if let Err(e) = self
            .publish_status(job.id, AdmissionJobStatus::Failed { error: error_text.clone() })
            .await
        {
            error!("Failed to publish failure status for {}: {}", job.id, e);
        }

        JOB_HISTORY.record_failed(job.id, "admission.import", job.user_id, started_at, error_text);

        // Ack to prevent redelivery of permanently broken files.
        if let Err(e) = msg.ack().await {
            error!("Failed to ack failed admission job {}: {:?}", job.id, e);
        }
    }

    fn upload_path(&self, job: &QueuedAdmissionJob) -> PathBuf {
        let file_name = Path::new(&job.request.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "admissions.csv".to_string());
        self.uploads_dir.join(format!("{}_{}", job.id, file_name))
    }
}

// =============================================================================
// Submit / report handlers
// =============================================================================

/// Handle admission submit requests
pub async fn handle_admission_submit(
    client: Client,
    mut subscriber: Subscriber,
    processor: Arc<AdmissionImportProcessor>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<AdmissionJobRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse admission submit request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let user_id = match request.user_id {
            Some(id) => id,
            None => {
                let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "user_id required");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match processor.submit_job(user_id, request.payload).await {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to submit admission job: {}", e);
                let error = ErrorResponse::new(request.id, "SUBMIT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle report download requests for processed batches
pub async fn handle_admission_report(
    client: Client,
    mut subscriber: Subscriber,
    uploads_dir: PathBuf,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<AdmissionReportRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match find_report(&uploads_dir, request.payload.job_id) {
            Some((file_name, bytes)) => {
                let payload = AdmissionReportResponse {
                    file_name,
                    content_type: "text/csv".to_string(),
                    file_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
                };
                let success = SuccessResponse::new(request.id, payload);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            None => {
                let error = ErrorResponse::new(
                    request.id,
                    "NOT_FOUND",
                    format!("No report found for job {}", request.payload.job_id),
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Locate the stored report for a job id. Returns the original file name
/// (without the job-id prefix) and the file bytes.
fn find_report(uploads_dir: &Path, job_id: Uuid) -> Option<(String, Vec<u8>)> {
    let prefix = format!("{}_", job_id);
    let entries = std::fs::read_dir(uploads_dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(original) = name.strip_prefix(&prefix) {
            let bytes = std::fs::read(entry.path()).ok()?;
            return Some((original.to_string(), bytes));
        }
    }
    None
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(STREAM_NAME, "QVERSE_ADMISSION_JOBS");
        assert!(SUBJECT.starts_with("qverse.jobs.admission"));
        assert!(STATUS_PREFIX.starts_with("qverse.job.admission.status"));
    }

    #[test]
    fn test_find_report_matches_job_prefix() {
        let dir = std::env::temp_dir().join(format!("qverse-admissions-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let job_id = Uuid::new_v4();
        std::fs::write(dir.join(format!("{}_intake.csv", job_id)), b"regno,email\n").unwrap();

        let (name, bytes) = find_report(&dir, job_id).unwrap();
        assert_eq!(name, "intake.csv");
        assert_eq!(bytes, b"regno,email\n");
        assert!(find_report(&dir, Uuid::new_v4()).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
