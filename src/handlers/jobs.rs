//! Job management handlers (history).

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::services::job_history::JOB_HISTORY;
use crate::types::{ErrorResponse, Request, SuccessResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Handle job history requests
pub async fn handle_job_history(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<JobHistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse job history request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let history = JOB_HISTORY.get_recent(request.payload.limit);
        let success = SuccessResponse::new(request.id, history);
        let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
    }

    Ok(())
}
