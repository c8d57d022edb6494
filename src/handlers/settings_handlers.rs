use crate::error::{AppError, Result};
use crate::services::UpdateSettingsRequest;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct SettingsQuery {
    pub user_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateSettingsPayload {
    pub user_id: Option<i64>,
    pub digest_day: Option<String>,
    pub name: Option<String>,
}

pub async fn get_settings_handler(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Result<Json<Value>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    let user = state.user_service.get_user(user_id).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn update_settings_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateSettingsPayload>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(payload) = payload?;
    let user_id = payload
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    let user = state
        .user_service
        .update_settings(UpdateSettingsRequest {
            user_id,
            name: payload.name,
            digest_day: payload.digest_day,
        })
        .await?;

    tracing::info!("Updated settings for user {}", user.id);
    Ok(Json(json!({ "success": true, "user": user })))
}
