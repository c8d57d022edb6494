use steep::{
    config::{validate_production_config, AppConfig},
    db, routes,
    services::{create_email_service, create_llm_client},
    AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steep=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config(&config);

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let llm = create_llm_client(&config);
    let email_service = create_email_service();

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let app_state = AppState::build(pool, Arc::new(config), llm, email_service);
    let app = routes::build_router(app_state);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
