use crate::models::digest::{NewDigest, WeeklyDigest};
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{RepositoryError, RepositoryResult};

const DIGEST_COLUMNS: &str =
    "id, user_id, week_start, week_end, post_count, digest_content, sent_at, created_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DigestRepository: Send + Sync {
    async fn create_digest(&self, digest: &NewDigest) -> RepositoryResult<WeeklyDigest>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<WeeklyDigest>>;
    async fn count_for_user(&self, user_id: i64) -> RepositoryResult<i64>;
    /// Most recent week first.
    async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<WeeklyDigest>>;
    async fn mark_sent(&self, id: i64, sent_at: &str) -> RepositoryResult<()>;
}

pub struct SqliteDigestRepository {
    pool: SqlitePool,
}

impl SqliteDigestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DigestRepository for SqliteDigestRepository {
    async fn create_digest(&self, digest: &NewDigest) -> RepositoryResult<WeeklyDigest> {
        let result = sqlx::query(
            r#"
            INSERT INTO weekly_digests
                (user_id, week_start, week_end, post_count, digest_content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(digest.user_id)
        .bind(&digest.week_start)
        .bind(&digest.week_end)
        .bind(digest.post_count)
        .bind(&digest.digest_content)
        .bind(&digest.created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<WeeklyDigest>> {
        let digest = sqlx::query_as::<_, WeeklyDigest>(&format!(
            "SELECT {DIGEST_COLUMNS} FROM weekly_digests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(digest)
    }

    async fn count_for_user(&self, user_id: i64) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weekly_digests WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<WeeklyDigest>> {
        let digests = sqlx::query_as::<_, WeeklyDigest>(&format!(
            "SELECT {DIGEST_COLUMNS} FROM weekly_digests WHERE user_id = ? \
             ORDER BY week_start DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(digests)
    }

    async fn mark_sent(&self, id: i64, sent_at: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE weekly_digests SET sent_at = ? WHERE id = ?")
            .bind(sent_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
