use crate::models::{db_timestamp, User};
use crate::repositories::{MagicLinkRepository, RepositoryError, UserRepository};
use crate::services::email_service::{EmailError, EmailService};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;

pub const MAGIC_LINK_TTL_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum MagicLinkError {
    #[error("Token not found")]
    TokenNotFound,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token already used")]
    TokenAlreadyUsed,
    #[error("User not found")]
    UserNotFound,
    #[error("Email error: {0}")]
    EmailError(#[from] EmailError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct MagicLinkService {
    links: Arc<dyn MagicLinkRepository>,
    users: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    app_url: String,
}

impl MagicLinkService {
    pub fn new(
        links: Arc<dyn MagicLinkRepository>,
        users: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        app_url: String,
    ) -> Self {
        Self {
            links,
            users,
            email_service,
            app_url,
        }
    }

    fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        hex::encode(bytes)
    }

    pub fn login_url(&self, token: &str) -> String {
        format!("{}/api/auth/verify?token={}", self.app_url, token)
    }

    /// Issues a login link and emails it. Unknown addresses get `Ok(None)` so
    /// callers can answer identically whether or not the account exists.
    pub async fn request_login_link(&self, email: &str) -> Result<Option<String>, MagicLinkError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::info!("Login link requested for unknown email: {}", email);
            return Ok(None);
        };

        let token = Self::generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(MAGIC_LINK_TTL_MINUTES);
        self.links
            .create_link(user.id, &token, &db_timestamp(expires_at), &db_timestamp(now))
            .await?;

        match self
            .email_service
            .send_magic_link_email(&user.email, &user.name, &self.login_url(&token))
            .await
        {
            Ok(_) => {
                tracing::info!("✅ Login link sent to: {}", user.email);
                Ok(Some(token))
            }
            Err(e) => {
                tracing::error!("❌ Failed to send login link to {}: {:?}", user.email, e);
                Err(e.into())
            }
        }
    }

    pub async fn verify(&self, token: &str) -> Result<User, MagicLinkError> {
        self.verify_at(token, Utc::now()).await
    }

    /// Consumes `token` as of `now`. Expiry wins over use-state, and the
    /// conditional consume means only one concurrent caller can succeed.
    pub async fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<User, MagicLinkError> {
        if token.trim().is_empty() {
            return Err(MagicLinkError::TokenNotFound);
        }

        let link = self
            .links
            .find_by_token(token)
            .await?
            .ok_or(MagicLinkError::TokenNotFound)?;

        if link.is_expired_at(now) {
            return Err(MagicLinkError::TokenExpired);
        }

        if link.used || !self.links.consume(link.id).await? {
            return Err(MagicLinkError::TokenAlreadyUsed);
        }

        self.users
            .find_by_id(link.user_id)
            .await?
            .ok_or(MagicLinkError::UserNotFound)
    }

    pub async fn cleanup_expired(&self) -> Result<u64, MagicLinkError> {
        let removed = self.links.delete_expired(&db_timestamp(Utc::now())).await?;
        tracing::info!("Removed {} expired magic links", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MagicLink;
    use crate::repositories::magic_link_repository::MockMagicLinkRepository;
    use crate::repositories::user_repository::MockUserRepository;
    use crate::services::email_service::MockEmailService;
    use mockall::predicate::*;

    fn user() -> User {
        User {
            id: 7,
            email: "ann@x.com".to_string(),
            name: "Ann".to_string(),
            inbound_email: "ann@save.steep.news".to_string(),
            plan: "trial".to_string(),
            plan_expires_at: None,
            digest_day: "sunday".to_string(),
            created_at: db_timestamp(Utc::now()),
        }
    }

    fn link(expires_at: DateTime<Utc>, used: bool) -> MagicLink {
        MagicLink {
            id: 3,
            user_id: 7,
            token: "tok".to_string(),
            expires_at: db_timestamp(expires_at),
            used,
            created_at: db_timestamp(expires_at - Duration::minutes(MAGIC_LINK_TTL_MINUTES)),
        }
    }

    fn service(
        links: MockMagicLinkRepository,
        users: MockUserRepository,
        email: Arc<MockEmailService>,
    ) -> MagicLinkService {
        MagicLinkService::new(
            Arc::new(links),
            Arc::new(users),
            email,
            "https://steep.test".to_string(),
        )
    }

    #[tokio::test]
    async fn unknown_email_creates_no_link() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .with(eq("nobody@x.com"))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(None) }));
        let mut links = MockMagicLinkRepository::new();
        links.expect_create_link().times(0);
        let email = Arc::new(MockEmailService::new());

        let result = service(links, users, email.clone())
            .request_login_link(" Nobody@X.com ")
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn expired_link_is_rejected_without_consuming() {
        let now = Utc::now();
        let mut links = MockMagicLinkRepository::new();
        let expired = link(now - Duration::seconds(1), false);
        links
            .expect_find_by_token()
            .returning(move |_| {
                let link = expired.clone();
                Box::pin(async move { Ok(Some(link)) })
            });
        links.expect_consume().times(0);

        let result = service(links, MockUserRepository::new(), Arc::new(MockEmailService::new()))
            .verify_at("tok", now)
            .await;

        assert!(matches!(result, Err(MagicLinkError::TokenExpired)));
    }

    #[tokio::test]
    async fn lost_consume_race_is_already_used() {
        let now = Utc::now();
        let mut links = MockMagicLinkRepository::new();
        let fresh = link(now + Duration::minutes(10), false);
        links.expect_find_by_token().returning(move |_| {
            let link = fresh.clone();
            Box::pin(async move { Ok(Some(link)) })
        });
        links
            .expect_consume()
            .with(eq(3))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(false) }));

        let result = service(links, MockUserRepository::new(), Arc::new(MockEmailService::new()))
            .verify_at("tok", now)
            .await;

        assert!(matches!(result, Err(MagicLinkError::TokenAlreadyUsed)));
    }

    #[tokio::test]
    async fn fresh_link_logs_the_user_in() {
        let now = Utc::now();
        let mut links = MockMagicLinkRepository::new();
        let fresh = link(now + Duration::minutes(10), false);
        links.expect_find_by_token().returning(move |_| {
            let link = fresh.clone();
            Box::pin(async move { Ok(Some(link)) })
        });
        links
            .expect_consume()
            .times(1)
            .returning(|_| Box::pin(async move { Ok(true) }));
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .with(eq(7))
            .returning(|_| Box::pin(async move { Ok(Some(user())) }));

        let verified = service(links, users, Arc::new(MockEmailService::new()))
            .verify_at("tok", now)
            .await
            .unwrap();

        assert_eq!(verified.email, "ann@x.com");
    }

    #[test]
    fn tokens_are_64_hex_chars() {
        let token = MagicLinkService::generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, MagicLinkService::generate_token());
    }
}
