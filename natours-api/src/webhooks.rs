use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use natours_booking::ReconcileOutcome;
use natours_core::webhook::SIGNATURE_HEADER;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook-checkout", post(webhook_checkout))
}

/// POST /webhook-checkout
/// Receives signed payment events. The body is kept raw because the
/// signature covers the exact bytes sent.
pub async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());

    let event = state.webhooks.verify(&body, signature).map_err(|e| {
        tracing::warn!("Rejected webhook delivery: {}", e);
        AppError::from(e)
    })?;
    tracing::info!("Received webhook: {} ({})", event.event_type, event.id);

    match state.reconciler.handle(&event).await? {
        ReconcileOutcome::Created(booking) => {
            tracing::info!("Booking {} recorded for event {}", booking.id, event.id);
        }
        ReconcileOutcome::Duplicate { event_id } => {
            tracing::info!("Duplicate delivery of event {}", event_id);
        }
        ReconcileOutcome::Ignored { event_type } => {
            tracing::debug!("No handler for event type {}", event_type);
        }
    }

    Ok(Json(json!({ "received": true })))
}
