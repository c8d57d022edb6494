use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, AppState};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/inbound",
            post(handlers::receive_inbound).get(handlers::inbound_status),
        )
        .route("/signup", post(handlers::signup_handler))
        .route("/auth/send-link", post(handlers::send_link_handler))
        .route("/auth/verify", get(handlers::verify_link_handler))
        .route(
            "/digest/generate",
            post(handlers::generate_digest_handler).get(handlers::digest_status),
        )
        .route("/cron/send-digests", get(handlers::send_digests_handler))
        .route("/posts/list", get(handlers::list_posts_handler))
        .route("/digests/list", get(handlers::list_digests_handler))
        .route(
            "/user/settings",
            get(handlers::get_settings_handler).put(handlers::update_settings_handler),
        );

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(cors_layer)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            add_security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn add_security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if state.config.is_production() {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
        );
    }

    response
}
