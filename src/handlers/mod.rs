//! NATS message handlers

pub mod admission;
pub mod department;
pub mod jobs;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::db::store::{AdmissionStore, PgAdmissionStore};
use crate::services::email_processor::EmailProcessor;
use crate::services::email_sender::{EmailSender, LogEmailSender, ResendEmailSender};
use crate::services::notification::{NotificationSender, QueuedNotificationSender};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let store: Arc<dyn AdmissionStore> = Arc::new(PgAdmissionStore::new(pool.clone()));

    // Email transport: Resend when configured, tracing otherwise.
    let email_sender: Arc<dyn EmailSender> = match ResendEmailSender::from_env() {
        Some(sender) => {
            info!("Email transport: Resend");
            Arc::new(sender)
        }
        None => {
            info!("RESEND_API_KEY not set — registration emails will be logged only");
            Arc::new(LogEmailSender)
        }
    };

    // Notification queue (also creates the email stream).
    let notifier: Arc<dyn NotificationSender> =
        Arc::new(QueuedNotificationSender::new(client.clone()).await?);

    // Subscribe to all subjects
    let ping_sub = client.subscribe("qverse.ping").await?;
    let department_create_sub = client.subscribe("qverse.department.create").await?;
    let department_list_sub = client.subscribe("qverse.department.list").await?;
    let department_update_sub = client.subscribe("qverse.department.update").await?;
    let department_delete_sub = client.subscribe("qverse.department.delete").await?;
    let admission_submit_sub = client.subscribe("qverse.admission.submit").await?;
    let admission_report_sub = client.subscribe("qverse.admission.report").await?;
    let job_history_sub = client.subscribe("qverse.jobs.history").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();
    let client_department_create = client.clone();
    let client_department_list = client.clone();
    let client_department_update = client.clone();
    let client_department_delete = client.clone();
    let client_admission_submit = client.clone();
    let client_admission_report = client.clone();
    let client_job_history = client.clone();

    let pool_department_create = pool.clone();
    let pool_department_list = pool.clone();
    let pool_department_update = pool.clone();
    let pool_department_delete = pool.clone();

    // Admission import processor (one consumer, batches run sequentially)
    let processor = Arc::new(
        admission::AdmissionImportProcessor::new(
            client.clone(),
            Arc::clone(&store),
            Arc::clone(&notifier),
            config.uploads_dir.clone(),
        )
        .await?,
    );

    let processor_submit = Arc::clone(&processor);
    let processor_main = Arc::clone(&processor);
    tokio::spawn(async move {
        if let Err(e) = processor_main.start_processing().await {
            error!("Admission import processor error: {}", e);
        }
    });

    // Email processor (drains the registration notification queue)
    let email_processor = Arc::new(EmailProcessor::new(
        client.clone(),
        email_sender,
        &config.platform_base_url,
    ));
    tokio::spawn(async move {
        if let Err(e) = email_processor.start_processing().await {
            error!("Email processor error: {}", e);
        }
    });

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let department_create_handle = tokio::spawn(async move {
        department::handle_create(client_department_create, department_create_sub, pool_department_create).await
    });

    let department_list_handle = tokio::spawn(async move {
        department::handle_list(client_department_list, department_list_sub, pool_department_list).await
    });

    let department_update_handle = tokio::spawn(async move {
        department::handle_update(client_department_update, department_update_sub, pool_department_update).await
    });

    let department_delete_handle = tokio::spawn(async move {
        department::handle_delete(client_department_delete, department_delete_sub, pool_department_delete).await
    });

    let admission_submit_handle = tokio::spawn(async move {
        admission::handle_admission_submit(client_admission_submit, admission_submit_sub, processor_submit).await
    });

    let uploads_dir = config.uploads_dir.clone();
    let admission_report_handle = tokio::spawn(async move {
        admission::handle_admission_report(client_admission_report, admission_report_sub, uploads_dir).await
    });

    let job_history_handle = tokio::spawn(async move {
        jobs::handle_job_history(client_job_history, job_history_sub).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = department_create_handle => {
            error!("Department create handler finished: {:?}", result);
        }
        result = department_list_handle => {
            error!("Department list handler finished: {:?}", result);
        }
        result = department_update_handle => {
            error!("Department update handler finished: {:?}", result);
        }
        result = department_delete_handle => {
            error!("Department delete handler finished: {:?}", result);
        }
        result = admission_submit_handle => {
            error!("Admission submit handler finished: {:?}", result);
        }
        result = admission_report_handle => {
            error!("Admission report handler finished: {:?}", result);
        }
        result = job_history_handle => {
            error!("Job history handler finished: {:?}", result);
        }
    }

    Ok(())
}
