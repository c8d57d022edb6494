pub mod test_helpers {
    use crate::models::{db_timestamp, parse_db_timestamp};
    use crate::services::email_service::EmailService;
    use crate::services::llm_client::{LlmClient, LlmError};
    use crate::{config::AppConfig, AppState};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sqlx::{
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
        SqlitePool,
    };
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a trial user whose alias is derived from the email local part
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        digest_day: &str,
    ) -> Result<i64, sqlx::Error> {
        insert_test_user_with_plan(pool, email, name, digest_day, "trial").await
    }

    pub async fn insert_test_user_with_plan(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        digest_day: &str,
        plan: &str,
    ) -> Result<i64, sqlx::Error> {
        let local = email.split('@').next().unwrap_or(email);
        let inbound_email = format!("{}@save.steep.news", local);

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, name, inbound_email, plan, digest_day, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(inbound_email)
        .bind(plan)
        .bind(digest_day)
        .bind(db_timestamp(Utc::now()))
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a saved post captured at the given instant
    pub async fn insert_test_post(
        pool: &SqlitePool,
        user_id: i64,
        author_name: &str,
        content: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO saved_posts (user_id, source, author_name, content, original_url, tags, captured_at)
            VALUES (?, 'linkedin', ?, ?, ?, '[]', ?)
            "#,
        )
        .bind(user_id)
        .bind(author_name)
        .bind(content)
        .bind(format!(
            "https://www.linkedin.com/posts/{}_post-activity-1",
            author_name.to_lowercase().replace(' ', "-")
        ))
        .bind(db_timestamp(captured_at))
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a magic link row directly, bypassing the 15 minute expiry
    pub async fn insert_magic_link(
        pool: &SqlitePool,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        used: bool,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO magic_links (user_id, token, expires_at, used, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(db_timestamp(expires_at))
        .bind(used)
        .bind(db_timestamp(expires_at - chrono::Duration::minutes(15)))
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn magic_link_expiry(pool: &SqlitePool, token: &str) -> Option<DateTime<Utc>> {
        let expires_at: Option<String> =
            sqlx::query_scalar("SELECT expires_at FROM magic_links WHERE token = ?")
                .bind(token)
                .fetch_optional(pool)
                .await
                .ok()
                .flatten();
        expires_at.as_deref().and_then(parse_db_timestamp)
    }

    /// LLM stand-in that replays a canned reply and remembers every prompt.
    pub struct StaticLlmClient {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl StaticLlmClient {
        pub fn replying(reply: impl Into<String>) -> Self {
            Self {
                reply: Ok(reply.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                reply: Err(message.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts
                .lock()
                .map(|prompts| prompts.clone())
                .unwrap_or_default()
        }

        pub fn call_count(&self) -> usize {
            self.prompts().len()
        }
    }

    #[async_trait]
    impl LlmClient for StaticLlmClient {
        async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            self.reply.clone().map_err(|body| LlmError::Api {
                status: 500,
                body,
            })
        }
    }

    /// Wire a full `AppState` against the given pool and fakes.
    pub fn build_test_state(
        pool: SqlitePool,
        llm: Arc<dyn LlmClient>,
        email_service: Arc<dyn EmailService>,
    ) -> AppState {
        AppState::build(pool, Arc::new(AppConfig::default()), llm, email_service)
    }

    pub fn build_test_state_with_config(
        pool: SqlitePool,
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        email_service: Arc<dyn EmailService>,
    ) -> AppState {
        AppState::build(pool, Arc::new(config), llm, email_service)
    }
}

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
