//! QVerse Worker - Backend service for bulk student admissions
//!
//! This worker connects to NATS and handles admission uploads, department
//! maintenance and registration notification dispatch.

mod auth;
mod cli;
mod config;
mod db;
mod error;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::db::store::PgAdmissionStore;
use crate::services::import_job::BulkImportJob;
use crate::services::notification::LogNotificationSender;
use crate::types::UploadBatch;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,qverse_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Migrate) => migrate().await,
        Some(Command::Import { file, description }) => import_file(file, description).await,
        Some(Command::Serve) | None => serve().await,
    }
}

async fn serve() -> Result<()> {
    info!("Starting QVerse Worker...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn migrate() -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    Ok(())
}

/// Run one admission batch from disk, without NATS. Notifications are
/// logged instead of queued; the report overwrites the input file.
async fn import_file(file: std::path::PathBuf, description: String) -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("Input path has no file name")?;
    if !file_name.to_lowercase().ends_with(".csv") {
        anyhow::bail!("Invalid file format. Only csv files are supported.");
    }

    let content = std::fs::read(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let batch = UploadBatch {
        file_name,
        description,
        content,
    };

    let job = BulkImportJob::new(
        Arc::new(PgAdmissionStore::new(pool)),
        Arc::new(LogNotificationSender),
    );
    let outcome = job.run(&batch).await?;

    if !outcome.report.is_empty() {
        std::fs::write(&file, &outcome.report)
            .with_context(|| format!("Failed to write report {}", file.display()))?;
    }

    info!(
        "Batch processed: {} created, {} updated, {} failed ({} rows). Report written to {}",
        outcome.created,
        outcome.updated,
        outcome.failed,
        outcome.total,
        file.display()
    );

    Ok(())
}
