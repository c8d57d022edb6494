//! Postmark inbound webhook.
//!
//! The provider retries anything that is not a 2xx, so every outcome,
//! including garbage payloads and unknown recipients, is answered with 200
//! and a `success` flag.

use crate::services::InboundError;
use crate::AppState;
use axum::{body::Body, extract::State, response::Json};
use chrono::Utc;
use serde_json::{json, Value};

/// Postmark caps inbound messages, attachments included, at 35 MB of JSON.
pub const INBOUND_BODY_LIMIT: usize = 40 * 1024 * 1024;

/// Takes the raw `Body` rather than `Bytes` so an oversized delivery is still
/// answered with 200 instead of the extractor's 413.
pub async fn receive_inbound(State(state): State<AppState>, body: Body) -> Json<Value> {
    let body = match axum::body::to_bytes(body, INBOUND_BODY_LIMIT).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Inbound webhook body could not be read: {}", e);
            return Json(json!({ "success": false, "error": "Payload too large" }));
        }
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Inbound webhook with unparseable body: {}", e);
            return Json(json!({ "success": false, "error": "Invalid payload" }));
        }
    };

    match state.inbound_service.receive(payload).await {
        Ok(post) => Json(json!({
            "success": true,
            "post_id": post.id,
            "author": post.author_name,
            "source": post.source,
        })),
        Err(InboundError::UserNotFound { inbound_email }) => {
            tracing::warn!("User not found for: {}", inbound_email);
            Json(json!({
                "success": false,
                "error": "User not found",
                "inbound_email": inbound_email,
            }))
        }
        Err(InboundError::MissingRecipient) => {
            tracing::warn!("Inbound webhook without a recipient");
            Json(json!({ "success": false, "error": "Missing recipient address" }))
        }
        Err(e) => {
            tracing::error!("Inbound webhook error: {}", e);
            Json(json!({ "success": false, "error": "Failed to save post" }))
        }
    }
}

pub async fn inbound_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Steep inbound webhook is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
