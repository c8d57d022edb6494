use crate::models::user::{NewUser, Plan, User};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub use super::{RepositoryError, RepositoryResult};
use super::map_unique_violation;

const USER_COLUMNS: &str =
    "id, email, name, inbound_email, plan, plan_expires_at, digest_day, created_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn find_by_inbound_email(&self, inbound_email: &str) -> RepositoryResult<Option<User>>;
    async fn inbound_email_exists(&self, inbound_email: &str) -> RepositoryResult<bool>;
    async fn update_settings(
        &self,
        id: i64,
        name: Option<String>,
        digest_day: Option<String>,
    ) -> RepositoryResult<User>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
    /// Users on an active plan whose digest goes out on `digest_day`.
    async fn list_digest_recipients(&self, digest_day: &str) -> RepositoryResult<Vec<User>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, name, inbound_email, plan, plan_expires_at, digest_day, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.inbound_email)
        .bind(user.plan.as_str())
        .bind(&user.plan_expires_at)
        .bind(&user.digest_day)
        .bind(&user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_inbound_email(&self, inbound_email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE inbound_email = ?"
        ))
        .bind(inbound_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn inbound_email_exists(&self, inbound_email: &str) -> RepositoryResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE inbound_email = ?")
            .bind(inbound_email)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn update_settings(
        &self,
        id: i64,
        name: Option<String>,
        digest_day: Option<String>,
    ) -> RepositoryResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                digest_day = COALESCE(?, digest_day)
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(digest_day)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn list_digest_recipients(&self, digest_day: &str) -> RepositoryResult<Vec<User>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE digest_day = "
        ));
        builder.push_bind(digest_day.to_string());
        builder.push(" AND plan IN (");
        let mut plans = builder.separated(", ");
        for plan in Plan::ACTIVE {
            plans.push_bind(plan.as_str());
        }
        plans.push_unseparated(") ORDER BY id");

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}
