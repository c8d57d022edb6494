use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repositories::RepositoryError;
use crate::services::{
    DigestError, EmailError, LlmError, MagicLinkError, PostServiceError, UserServiceError,
};

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Database(_)
            | AppError::Repository(_)
            | AppError::Llm(_)
            | AppError::Email(_)
            | AppError::Internal(_) => {
                tracing::error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

// Malformed or mistyped request bodies answer with the same JSON error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::UserNotFound => AppError::NotFound("User"),
            UserServiceError::RepositoryError(e) => AppError::Repository(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<MagicLinkError> for AppError {
    fn from(err: MagicLinkError) -> Self {
        match err {
            MagicLinkError::UserNotFound => AppError::NotFound("User"),
            MagicLinkError::EmailError(e) => AppError::Email(e),
            MagicLinkError::RepositoryError(e) => AppError::Repository(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<DigestError> for AppError {
    fn from(err: DigestError) -> Self {
        match err {
            DigestError::UserNotFound => AppError::NotFound("User"),
            DigestError::LlmError(e) => AppError::Llm(e),
            DigestError::RepositoryError(e) => AppError::Repository(e),
        }
    }
}

impl From<PostServiceError> for AppError {
    fn from(err: PostServiceError) -> Self {
        match err {
            invalid @ PostServiceError::InvalidDateFilter => {
                AppError::Validation(invalid.to_string())
            }
            PostServiceError::RepositoryError(e) => AppError::Repository(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_messages_reach_the_client() {
        let (status, body) = body_of(UserServiceError::EmailTaken.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "An account with this email already exists");
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let (status, body) = body_of(DigestError::UserNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn rejected_json_bodies_become_validation_errors() {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .body(axum::body::Body::from("{}"))
            .unwrap();
        let rejection = Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();
        let (status, body) = body_of(rejection.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Content-Type"));
    }

    #[tokio::test]
    async fn internal_failures_are_opaque() {
        let (status, body) = body_of(AppError::Llm(LlmError::Api {
            status: 500,
            body: "secret detail".into(),
        }))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server error");
    }
}
