//! Hand-off of newly created accounts to the notification pipeline.
//!
//! `NotificationSender` is the collaborator seam the import job talks to.
//! The production implementation queues one JetStream job per created
//! student so sending hundreds of emails never blocks the upload path;
//! the email processor drains the queue on its own time. Failures here are
//! logged by the caller and never roll back an upsert.

use async_nats::jetstream::{self, Context as JsContext};
use async_trait::async_trait;
use anyhow::Result;
use parking_lot::Mutex;
use tracing::info;

use crate::types::admission::RegistrationEmailJob;
use crate::types::student::CreatedStudent;

pub const EMAIL_STREAM_NAME: &str = "QVERSE_EMAIL_JOBS";
pub const EMAIL_SUBJECT: &str = "qverse.jobs.email.registration";

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify_created(&self, students: &[CreatedStudent]) -> Result<()>;
}

// =============================================================================
// QueuedNotificationSender — JetStream-backed (production)
// =============================================================================

pub struct QueuedNotificationSender {
    js: JsContext,
}

impl QueuedNotificationSender {
    /// Create the sender, initializing the email work-queue stream.
    pub async fn new(client: async_nats::Client) -> Result<Self> {
        let js = jetstream::new(client);

        let stream_config = jetstream::stream::Config {
            name: EMAIL_STREAM_NAME.to_string(),
            subjects: vec![EMAIL_SUBJECT.to_string()],
            max_messages: 10_000,
            max_bytes: 50 * 1024 * 1024, // 50 MB
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        js.get_or_create_stream(stream_config).await?;
        info!("JetStream email stream '{}' ready", EMAIL_STREAM_NAME);

        Ok(Self { js })
    }
}

#[async_trait]
impl NotificationSender for QueuedNotificationSender {
    async fn notify_created(&self, students: &[CreatedStudent]) -> Result<()> {
        for student in students {
            let job = RegistrationEmailJob::new(student.clone());
            let payload = serde_json::to_vec(&job)?;
            self.js.publish(EMAIL_SUBJECT, payload.into()).await?.await?;
        }
        info!("Queued {} registration notification(s)", students.len());
        Ok(())
    }
}

// =============================================================================
// LogNotificationSender — logs instead of queueing (dev / CLI runs)
// =============================================================================

pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn notify_created(&self, students: &[CreatedStudent]) -> Result<()> {
        for student in students {
            info!(
                regno = %student.registration_number,
                email = %student.email,
                "[LogNotificationSender] Would queue registration notification"
            );
        }
        Ok(())
    }
}

// =============================================================================
// FakeNotificationSender — captures hand-offs in memory (tests)
// =============================================================================

#[derive(Default)]
pub struct FakeNotificationSender {
    batches: Mutex<Vec<Vec<CreatedStudent>>>,
}

impl FakeNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<CreatedStudent>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl NotificationSender for FakeNotificationSender {
    async fn notify_created(&self, students: &[CreatedStudent]) -> Result<()> {
        self.batches.lock().push(students.to_vec());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn student(regno: &str) -> CreatedStudent {
        CreatedStudent {
            registration_number: regno.into(),
            email: format!("{}@x.com", regno.to_lowercase()),
            first_name: "Ann".into(),
            surname: "Lee".into(),
            current_level: 3,
            programme: 2,
        }
    }

    #[tokio::test]
    async fn fake_sender_captures_batches() {
        let sender = FakeNotificationSender::new();
        sender.notify_created(&[student("A100"), student("B200")]).await.unwrap();
        sender.notify_created(&[student("C300")]).await.unwrap();

        let batches = sender.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1][0].registration_number, "C300");
    }

    #[tokio::test]
    async fn log_sender_does_not_error() {
        LogNotificationSender
            .notify_created(&[student("A100")])
            .await
            .unwrap();
    }
}
