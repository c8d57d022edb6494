use crate::error::{AppError, Result};
use crate::services::{MagicLinkError, SignupRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{Json, Redirect},
};
use serde::Deserialize;
use serde_json::{json, Value};

pub const SEND_LINK_MESSAGE: &str = "If an account exists, a login link has been sent.";

#[derive(Deserialize)]
pub struct SignupPayload {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SendLinkPayload {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

pub async fn signup_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupPayload>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(payload) = payload?;
    let user = state
        .user_service
        .signup(SignupRequest {
            email: payload.email,
            name: payload.name,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "inbound_email": user.inbound_email,
            "plan": user.plan,
        }
    })))
}

/// Answers identically whether or not the account exists.
pub async fn send_link_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SendLinkPayload>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(payload) = payload?;
    let email = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Email is required".to_string()))?;

    state.magic_link_service.request_login_link(&email).await?;

    Ok(Json(json!({ "success": true, "message": SEND_LINK_MESSAGE })))
}

pub async fn verify_link_handler(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Redirect {
    let dashboard = state.config.dashboard_url();
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Redirect::to(&format!("{}?error=invalid", dashboard));
    };

    match state.magic_link_service.verify(&token).await {
        Ok(user) => Redirect::to(&format!(
            "{}?auth={}",
            dashboard,
            urlencoding::encode(&user.email)
        )),
        Err(MagicLinkError::TokenExpired) => Redirect::to(&format!("{}?error=expired", dashboard)),
        Err(e) => {
            match e {
                MagicLinkError::RepositoryError(_) | MagicLinkError::EmailError(_) => {
                    tracing::error!("Magic link verification failed: {}", e)
                }
                _ => tracing::info!("Rejected magic link: {}", e),
            }
            Redirect::to(&format!("{}?error=invalid", dashboard))
        }
    }
}
