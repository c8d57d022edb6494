use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use steep::{
    routes::build_router,
    services::{
        user_service::{SignupRequest, UserService, UserServiceError},
        DisabledLlmClient, MockEmailService,
    },
    repositories::SqliteUserRepository,
    test_utils::test_helpers,
};
use tower::ServiceExt;

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn test_app(pool: sqlx::SqlitePool) -> axum::Router {
    let state = test_helpers::build_test_state(
        pool,
        Arc::new(DisabledLlmClient),
        Arc::new(MockEmailService::new()),
    );
    build_router(state)
}

#[tokio::test]
async fn test_signup_creates_trial_user_with_alias() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let app = test_app(pool);

    let (status, body) = post_json(
        app,
        "/api/signup",
        json!({ "email": "  Ann.Lee@Example.com ", "name": "Ann Lee" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "ann.lee@example.com");
    assert_eq!(body["user"]["name"], "Ann Lee");
    assert_eq!(body["user"]["inbound_email"], "annlee@save.steep.news");
    assert_eq!(body["user"]["plan"], "trial");
}

#[tokio::test]
async fn test_signup_alias_collision_gets_counter() {
    let pool = test_helpers::create_test_db().await.unwrap();

    let (_, first) = post_json(
        test_app(pool.clone()),
        "/api/signup",
        json!({ "email": "ann@one.com", "name": "Ann" }),
    )
    .await;
    let (_, second) = post_json(
        test_app(pool.clone()),
        "/api/signup",
        json!({ "email": "ann@two.com", "name": "Ann" }),
    )
    .await;
    let (_, third) = post_json(
        test_app(pool),
        "/api/signup",
        json!({ "email": "ann@three.com", "name": "ANN!" }),
    )
    .await;

    assert_eq!(first["user"]["inbound_email"], "ann@save.steep.news");
    assert_eq!(second["user"]["inbound_email"], "ann1@save.steep.news");
    assert_eq!(third["user"]["inbound_email"], "ann2@save.steep.news");
}

#[tokio::test]
async fn test_signup_duplicate_email_is_rejected() {
    let pool = test_helpers::create_test_db().await.unwrap();

    let (status, _) = post_json(
        test_app(pool.clone()),
        "/api/signup",
        json!({ "email": "ann@example.com", "name": "Ann" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        test_app(pool),
        "/api/signup",
        json!({ "email": "ANN@example.com", "name": "Someone Else" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "An account with this email already exists");
}

#[tokio::test]
async fn test_signup_requires_email_and_name() {
    let pool = test_helpers::create_test_db().await.unwrap();

    let (status, body) = post_json(
        test_app(pool.clone()),
        "/api/signup",
        json!({ "email": "ann@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and name are required");

    let (status, _) = post_json(
        test_app(pool),
        "/api/signup",
        json!({ "email": "   ", "name": "Ann" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_name_without_usable_characters_falls_back_to_user() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let service = UserService::new(repository, "save.steep.news".to_string());

    let user = service
        .signup(SignupRequest {
            email: Some("emoji@example.com".to_string()),
            name: Some("☕☕".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(user.inbound_email, "user@save.steep.news");
    assert!(user.plan_expires_at.is_some());
    assert_eq!(user.digest_day, "sunday");
}

#[tokio::test]
async fn test_signup_rejects_malformed_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool));
    let service = UserService::new(repository, "save.steep.news".to_string());

    let result = service
        .signup(SignupRequest {
            email: Some("not-an-email".to_string()),
            name: Some("Ann".to_string()),
        })
        .await;

    assert!(matches!(result, Err(UserServiceError::InvalidEmail)));
}

#[tokio::test]
async fn test_malformed_json_bodies_get_json_errors() {
    let pool = test_helpers::create_test_db().await.unwrap();

    let cases = [
        ("/api/signup", Some("application/json"), "{not json"),
        ("/api/auth/send-link", None, r#"{"email": "ann@example.com"}"#),
        ("/api/digest/generate", Some("application/json"), r#"{"user_id": "one"}"#),
    ];

    for (uri, content_type, raw) in cases {
        let mut request = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        let response = test_app(pool.clone())
            .oneshot(request.body(Body::from(raw)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()), "{}", uri);
    }
}
