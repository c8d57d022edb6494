pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use config::AppConfig;
use repositories::{
    DigestRepository, MagicLinkRepository, PostRepository, SqliteDigestRepository,
    SqliteMagicLinkRepository, SqlitePostRepository, SqliteUserRepository, UserRepository,
};
use services::{
    ContentExtractor, DigestDispatcher, DigestService, EmailService, InboundService, LlmClient,
    MagicLinkService, PostService, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_service: Arc<UserService>,
    pub magic_link_service: Arc<MagicLinkService>,
    pub inbound_service: Arc<InboundService>,
    pub post_service: Arc<PostService>,
    pub digest_service: Arc<DigestService>,
    pub digest_dispatcher: Arc<DigestDispatcher>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires every repository and service over one pool. The LLM and mail
    /// clients are passed in so tests and the CLI can substitute their own.
    pub fn build(
        pool: sqlx::SqlitePool,
        config: Arc<AppConfig>,
        llm: Arc<dyn LlmClient>,
        email_service: Arc<dyn EmailService>,
    ) -> Self {
        let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
        let posts: Arc<dyn PostRepository> = Arc::new(SqlitePostRepository::new(pool.clone()));
        let digests: Arc<dyn DigestRepository> =
            Arc::new(SqliteDigestRepository::new(pool.clone()));
        let links: Arc<dyn MagicLinkRepository> =
            Arc::new(SqliteMagicLinkRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(
            users.clone(),
            config.inbound_domain.clone(),
        ));
        let magic_link_service = Arc::new(MagicLinkService::new(
            links,
            users.clone(),
            email_service.clone(),
            config.app_url.clone(),
        ));
        let inbound_service = Arc::new(InboundService::new(
            users.clone(),
            posts.clone(),
            ContentExtractor::new(llm.clone()),
            config.inbound_domain.clone(),
        ));
        let post_service = Arc::new(PostService::new(posts.clone(), config.digest_timezone));
        let digest_service = Arc::new(DigestService::new(users.clone(), posts, digests, llm));
        let digest_dispatcher = Arc::new(DigestDispatcher::new(
            users,
            digest_service.clone(),
            email_service,
            config.digest_timezone,
            config.dashboard_url(),
        ));

        Self {
            config,
            user_service,
            magic_link_service,
            inbound_service,
            post_service,
            digest_service,
            digest_dispatcher,
            pool,
        }
    }
}
