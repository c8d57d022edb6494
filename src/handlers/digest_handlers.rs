use crate::error::{AppError, Result};
use crate::models::PageRequest;
use crate::services::digest_service::preview;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct GenerateDigestPayload {
    pub user_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct ListDigestsQuery {
    pub user_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn generate_digest_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateDigestPayload>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(payload) = payload?;
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    let digest = state.digest_service.generate_for_user(user_id).await?;

    Ok(Json(json!({
        "success": true,
        "digest_id": digest.id,
        "post_count": digest.post_count,
        "preview": preview(&digest.digest_content),
    })))
}

pub async fn digest_status() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Digest generation endpoint ready" }))
}

/// Scheduled trigger. Guarded by `Authorization: Bearer <CRON_SECRET>` when a
/// secret is configured.
pub async fn send_digests_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    if let Some(secret) = state.config.cron_secret.as_deref() {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(secret) {
            tracing::warn!("Rejected cron request with missing or wrong secret");
            return Err(AppError::Unauthorized);
        }
    }

    let summary = state.digest_dispatcher.dispatch_due().await?;

    if summary.results.is_empty() {
        return Ok(Json(json!({
            "message": "No digests to send today",
            "day": summary.day,
        })));
    }

    Ok(Json(json!({
        "processed": summary.results.len(),
        "day": summary.day,
        "results": summary.results,
    })))
}

pub async fn list_digests_handler(
    State(state): State<AppState>,
    Query(query): Query<ListDigestsQuery>,
) -> Result<Json<Value>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    let page = state
        .digest_service
        .list_digests(user_id, PageRequest::new(query.page, query.limit))
        .await?;

    Ok(Json(json!(page)))
}
