//! Registration notification JetStream processor.
//!
//! Consumes the email jobs queued by `QueuedNotificationSender`, renders
//! the registration template and sends through the configured
//! `EmailSender`. A failure for one recipient is logged and acked; it
//! never touches persisted data and never blocks other recipients.
//!
//! ## Streams
//! - `QVERSE_EMAIL_JOBS` - registration notification jobs

use std::sync::Arc;

use anyhow::Result;
use async_nats::jetstream::{self, Context as JsContext};
use async_nats::Client;
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::services::email_sender::EmailSender;
use crate::services::email_templates::RegistrationEmail;
use crate::services::notification::{EMAIL_STREAM_NAME, EMAIL_SUBJECT};
use crate::types::admission::RegistrationEmailJob;

const CONSUMER_NAME: &str = "email_workers";

/// Email job processor with JetStream integration
pub struct EmailProcessor {
    js: JsContext,
    sender: Arc<dyn EmailSender>,
    login_url: String,
}

impl EmailProcessor {
    /// Create a new email processor. The stream itself is created by
    /// `QueuedNotificationSender::new`; this only needs the context.
    pub fn new(client: Client, sender: Arc<dyn EmailSender>, platform_base_url: &str) -> Self {
        let js = jetstream::new(client);
        let login_url = format!("{}/login", platform_base_url.trim_end_matches('/'));
        Self {
            js,
            sender,
            login_url,
        }
    }

    /// Start processing email jobs from the queue
    pub async fn start_processing(self: Arc<Self>) -> Result<()> {
        let stream = self.js.get_stream(EMAIL_STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: 5, // More retries for email delivery
            filter_subject: EMAIL_SUBJECT.to_string(),
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(CONSUMER_NAME, consumer_config)
            .await?;
        info!("JetStream email consumer '{}' ready", CONSUMER_NAME);

        let mut messages = consumer.messages().await?;

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(msg) => {
                    let processor = Arc::clone(&self);
                    if let Err(e) = processor.process_job(msg).await {
                        error!("Failed to process email job: {}", e);
                    }
                }
                Err(e) => {
                    error!("Error receiving email message: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Process a single registration notification job
    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let job: RegistrationEmailJob = serde_json::from_slice(&msg.payload)?;
        let regno = job.student.registration_number.clone();

        info!(regno = %regno, "Sending registration notification");

        let message = RegistrationEmail {
            student: &job.student,
            login_url: &self.login_url,
        }
        .render();

        match self.sender.send(message).await {
            Ok(()) => {
                info!(regno = %regno, "Registration notification sent");
            }
            Err(e) => {
                // Logged per recipient; the account itself stands.
                warn!(regno = %regno, "Failed to send registration notification: {}", e);
            }
        }

        if let Err(e) = msg.ack().await {
            error!("Failed to ack email job {}: {:?}", job.id, e);
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(EMAIL_STREAM_NAME, "QVERSE_EMAIL_JOBS");
        assert!(EMAIL_SUBJECT.starts_with("qverse.jobs.email"));
    }
}
