use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use steep::{
    routes::build_router,
    services::{DisabledLlmClient, MockEmailService},
    test_utils::test_helpers,
    AppState,
};
use tower::ServiceExt;

async fn setup() -> (sqlx::SqlitePool, AppState) {
    let pool = test_helpers::create_test_db().await.unwrap();
    let state = test_helpers::build_test_state(
        pool.clone(),
        Arc::new(DisabledLlmClient),
        Arc::new(MockEmailService::new()),
    );
    (pool, state)
}

async fn call(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = build_router(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_posts_list_pages_newest_first() {
    let (pool, state) = setup().await;
    let user_id = test_helpers::insert_test_user(&pool, "ann@example.com", "Ann", "sunday")
        .await
        .unwrap();
    let now = Utc::now();
    for hours in 1..=5 {
        test_helpers::insert_test_post(
            &pool,
            user_id,
            "Jane Doe",
            &format!("post {}", hours),
            now - Duration::hours(hours),
        )
        .await
        .unwrap();
    }

    let (status, body) = call(
        &state,
        Method::GET,
        &format!("/api/posts/list?user_id={}&page=2&limit=2", user_id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["post 3", "post 4"]);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["total"], 5);
    assert_eq!(body["pagination"]["totalPages"], 3);
    assert_eq!(body["pagination"]["hasMore"], true);
    assert!(body["posts"][0].get("raw_email").is_none());
}

#[tokio::test]
async fn test_posts_list_filters_by_search_author_and_date() {
    let (pool, state) = setup().await;
    let user_id = test_helpers::insert_test_user(&pool, "ann@example.com", "Ann", "sunday")
        .await
        .unwrap();
    let other = test_helpers::insert_test_user(&pool, "bob@example.com", "Bob", "sunday")
        .await
        .unwrap();
    let now = Utc::now();
    test_helpers::insert_test_post(&pool, user_id, "Jane Doe", "Pricing experiments", now - Duration::days(2))
        .await
        .unwrap();
    test_helpers::insert_test_post(&pool, user_id, "Raj Patel", "Hiring loops", now - Duration::days(20))
        .await
        .unwrap();
    test_helpers::insert_test_post(&pool, user_id, "Jane Doe", "More pricing", now - Duration::days(200))
        .await
        .unwrap();
    test_helpers::insert_test_post(&pool, other, "Jane Doe", "Pricing for Bob", now)
        .await
        .unwrap();

    let (_, body) = call(
        &state,
        Method::GET,
        &format!("/api/posts/list?user_id={}&search=pricing", user_id),
        None,
    )
    .await;
    assert_eq!(body["pagination"]["total"], 2);

    let (_, body) = call(
        &state,
        Method::GET,
        &format!("/api/posts/list?user_id={}&author=raj", user_id),
        None,
    )
    .await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["author_name"], "Raj Patel");

    let (_, body) = call(
        &state,
        Method::GET,
        &format!("/api/posts/list?user_id={}&date_filter=week", user_id),
        None,
    )
    .await;
    assert_eq!(body["pagination"]["total"], 1);

    let (_, body) = call(
        &state,
        Method::GET,
        &format!("/api/posts/list?user_id={}&date_filter=month", user_id),
        None,
    )
    .await;
    assert_eq!(body["pagination"]["total"], 2);
}

#[tokio::test]
async fn test_posts_list_rejects_bad_input() {
    let (_pool, state) = setup().await;

    let (status, body) = call(&state, Method::GET, "/api/posts/list", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user_id is required");

    let (status, _) = call(
        &state,
        Method::GET,
        "/api/posts/list?user_id=1&date_filter=decade",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_posts_list_for_user_without_posts_is_empty() {
    let (_pool, state) = setup().await;

    let (status, body) = call(&state, Method::GET, "/api/posts/list?user_id=42", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"], json!([]));
    assert_eq!(body["pagination"]["total"], 0);
    assert_eq!(body["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn test_posts_list_survives_extreme_page_numbers() {
    let (pool, state) = setup().await;
    let user_id = test_helpers::insert_test_user(&pool, "ann@example.com", "Ann", "sunday")
        .await
        .unwrap();
    test_helpers::insert_test_post(&pool, user_id, "Jane Doe", "only post", Utc::now())
        .await
        .unwrap();

    let (status, body) = call(
        &state,
        Method::GET,
        &format!("/api/posts/list?user_id={}&page=9223372036854775807&limit=100", user_id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"], json!([]));
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn test_settings_round_trip() {
    let (pool, state) = setup().await;
    let user_id = test_helpers::insert_test_user(&pool, "ann@example.com", "Ann", "sunday")
        .await
        .unwrap();

    let (status, body) = call(
        &state,
        Method::PUT,
        "/api/user/settings",
        Some(json!({ "user_id": user_id, "digest_day": "Wednesday", "name": "Ann Lee" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["digest_day"], "wednesday");
    assert_eq!(body["user"]["name"], "Ann Lee");

    let (status, body) = call(
        &state,
        Method::GET,
        &format!("/api/user/settings?user_id={}", user_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["digest_day"], "wednesday");
    assert_eq!(body["user"]["inbound_email"], "ann@save.steep.news");
}

#[tokio::test]
async fn test_settings_rejects_unknown_day_and_user() {
    let (pool, state) = setup().await;
    let user_id = test_helpers::insert_test_user(&pool, "ann@example.com", "Ann", "sunday")
        .await
        .unwrap();

    let (status, body) = call(
        &state,
        Method::PUT,
        "/api/user/settings",
        Some(json!({ "user_id": user_id, "digest_day": "someday" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid digest_day. Must be a day of the week.");

    let unchanged = state.user_service.get_user(user_id).await.unwrap();
    assert_eq!(unchanged.digest_day, "sunday");

    let (status, body) = call(&state, Method::GET, "/api/user/settings?user_id=999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_health_check_sets_security_headers() {
    let (_pool, state) = setup().await;

    let response = build_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().get("strict-transport-security").is_none());
}
