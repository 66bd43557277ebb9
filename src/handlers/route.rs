//! Route optimization message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::cancellation::{CancelError, CANCELLATION};
use crate::services::optimizer::RouteOptimizer;
use crate::services::staff_day;
use crate::types::{
    CancelRouteRequest, Capability, CapabilityError, ErrorResponse, OptimizeRouteRequest,
    Request, StaffDayRequest, StaffDayResponse, SuccessResponse,
};

fn capability_error(request_id: Uuid, error: &CapabilityError) -> ErrorResponse {
    ErrorResponse::new(request_id, "FORBIDDEN", error.to_string())
}

/// Handle route.optimize messages
///
/// Runs the full optimization pipeline for the submitted stop list. The
/// request is registered for cooperative cancellation under its envelope id.
pub async fn handle_optimize(
    client: Client,
    mut subscriber: Subscriber,
    optimizer: Arc<RouteOptimizer>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.optimize message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<OptimizeRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let actor_id = match request.context.require(Capability::PlanRoutes) {
            Ok(id) => id,
            Err(e) => {
                let error = capability_error(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let guard = CANCELLATION.register(request.id, actor_id);
        let cancel = guard.token();

        info!(
            "Optimizing route {} with {} stops",
            request.id,
            request.payload.stops.len()
        );

        match optimizer.optimize(&request.payload.stops, &cancel).await {
            Ok(result) => {
                info!(
                    "Route {} optimized: {} stops, {} s travel",
                    request.id,
                    result.ordered_stops.len(),
                    result.total_duration_seconds
                );
                let success = SuccessResponse::new(request.id, result);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Route {} failed: {}", request.id, e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }

        drop(guard);
    }

    Ok(())
}

/// Handle route.staff_day messages
///
/// Returns the stop list for one staff member on one date, seeded from their
/// scheduled appointments.
pub async fn handle_staff_day(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.staff_day message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<StaffDayRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        if let Err(e) = request.context.require(Capability::ViewSchedule) {
            let error = capability_error(request.id, &e);
            let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            continue;
        }

        let StaffDayRequest { staff_id, date } = request.payload;

        match staff_day::load_staff_day(&pool, staff_id, date).await {
            Ok(stops) => {
                debug!("Loaded {} stops for staff {} on {}", stops.len(), staff_id, date);
                let success = SuccessResponse::new(request.id, StaffDayResponse { stops });
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to load staff day: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle route.cancel messages
///
/// Cancels an in-flight optimization. Only the user who submitted the
/// request may cancel it.
pub async fn handle_cancel(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<CancelRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse cancel request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let actor_id = match request.context.require(Capability::PlanRoutes) {
            Ok(id) => id,
            Err(e) => {
                let error = capability_error(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let target = request.payload.request_id;
        info!("Cancel requested for route request {}", target);

        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CancelResponse {
            cancelled: bool,
        }

        match CANCELLATION.cancel(&target, actor_id) {
            Ok(cancelled) => {
                let success = SuccessResponse::new(request.id, CancelResponse { cancelled });
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(CancelError::NotOwner) => {
                let error = ErrorResponse::new(
                    request.id,
                    "FORBIDDEN",
                    "request belongs to a different user",
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
