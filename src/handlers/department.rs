//! Department maintenance handlers.
//!
//! Departments are the lookup admission rows resolve against; admins
//! maintain them independently of any batch. Deleting one nulls the
//! reference on dependent student profiles, it never cascades.

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::queries;
use crate::types::{
    CreateDepartmentRequest, DeleteDepartmentRequest, DeleteDepartmentResponse, EmptyPayload,
    ErrorResponse, Request, SuccessResponse, UpdateDepartmentRequest,
};

/// Handle department create requests
pub async fn handle_create(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received department.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CreateDepartmentRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse department.create request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if request.user_id.is_none() {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "user_id required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        if request.payload.number < 1 {
            let error = ErrorResponse::new(request.id, "INVALID_REQUEST", "Department number must be positive");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }
        let name = request.payload.name.trim();
        if name.is_empty() || name.chars().count() > 50 {
            let error = ErrorResponse::new(
                request.id,
                "INVALID_REQUEST",
                "Department name must be 1-50 characters",
            );
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::department::create_department(&pool, &request.payload).await {
            Ok(department) => {
                info!("Created department {}: {}", department.number, department.name);
                let success = SuccessResponse::new(request.id, department);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to create department: {}", e);
                let error = ErrorResponse::new(request.id, "CREATE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle department list requests
pub async fn handle_list(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received department.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::department::list_departments(&pool).await {
            Ok(departments) => {
                let success = SuccessResponse::new(request.id, departments);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list departments: {}", e);
                let error = ErrorResponse::new(request.id, "LIST_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle department update requests
pub async fn handle_update(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received department.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<UpdateDepartmentRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if request.user_id.is_none() {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "user_id required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::department::update_department(&pool, &request.payload).await {
            Ok(Some(department)) => {
                let success = SuccessResponse::new(request.id, department);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", "Department not found");
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to update department: {}", e);
                let error = ErrorResponse::new(request.id, "UPDATE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle department delete requests
pub async fn handle_delete(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received department.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<DeleteDepartmentRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if request.user_id.is_none() {
            let error = ErrorResponse::new(request.id, "UNAUTHORIZED", "user_id required");
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        match queries::department::delete_department(&pool, request.payload.id).await {
            Ok(deleted) => {
                if deleted {
                    info!("Deleted department {}", request.payload.id);
                }
                let success =
                    SuccessResponse::new(request.id, DeleteDepartmentResponse { deleted });
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to delete department: {}", e);
                let error = ErrorResponse::new(request.id, "DELETE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
