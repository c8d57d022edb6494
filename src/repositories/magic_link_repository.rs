use crate::models::magic_link::MagicLink;
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{map_unique_violation, RepositoryError, RepositoryResult};

const LINK_COLUMNS: &str = "id, user_id, token, expires_at, used, created_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MagicLinkRepository: Send + Sync {
    async fn create_link(
        &self,
        user_id: i64,
        token: &str,
        expires_at: &str,
        created_at: &str,
    ) -> RepositoryResult<MagicLink>;
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<MagicLink>>;
    /// Flips `used` from false to true. Returns false when the link was
    /// already consumed, so only one caller can ever win.
    async fn consume(&self, id: i64) -> RepositoryResult<bool>;
    async fn delete_expired(&self, now: &str) -> RepositoryResult<u64>;
}

pub struct SqliteMagicLinkRepository {
    pool: SqlitePool,
}

impl SqliteMagicLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MagicLinkRepository for SqliteMagicLinkRepository {
    async fn create_link(
        &self,
        user_id: i64,
        token: &str,
        expires_at: &str,
        created_at: &str,
    ) -> RepositoryResult<MagicLink> {
        let result = sqlx::query(
            r#"
            INSERT INTO magic_links (user_id, token, expires_at, used, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();
        sqlx::query_as::<_, MagicLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM magic_links WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<MagicLink>> {
        let link = sqlx::query_as::<_, MagicLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM magic_links WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn consume(&self, id: i64) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE magic_links SET used = 1 WHERE id = ? AND used = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: &str) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM magic_links WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_pool, test_helpers};

    #[tokio::test]
    async fn consume_succeeds_only_once() {
        let pool = create_test_pool().await;
        let user_id = test_helpers::insert_test_user(&pool, "a@x.com", "Ann", "monday")
            .await
            .unwrap();
        let repo = SqliteMagicLinkRepository::new(pool);

        let link = repo
            .create_link(user_id, "tok", "2999-01-01T00:00:00.000Z", "2025-01-01T00:00:00.000Z")
            .await
            .unwrap();

        assert!(!link.used);
        assert!(repo.consume(link.id).await.unwrap());
        assert!(!repo.consume(link.id).await.unwrap());
        assert!(repo.find_by_token("tok").await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn delete_expired_leaves_live_links() {
        let pool = create_test_pool().await;
        let user_id = test_helpers::insert_test_user(&pool, "a@x.com", "Ann", "monday")
            .await
            .unwrap();
        let repo = SqliteMagicLinkRepository::new(pool);

        repo.create_link(user_id, "old", "2025-01-01T00:00:00.000Z", "2025-01-01T00:00:00.000Z")
            .await
            .unwrap();
        repo.create_link(user_id, "new", "2025-06-01T00:00:00.000Z", "2025-05-31T23:45:00.000Z")
            .await
            .unwrap();

        let removed = repo.delete_expired("2025-03-01T00:00:00.000Z").await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.find_by_token("old").await.unwrap().is_none());
        assert!(repo.find_by_token("new").await.unwrap().is_some());
    }
}
