use crate::models::saved_post::{NewPost, PostFilter, SavedPost};
use async_trait::async_trait;
use sqlx::{types::Json, QueryBuilder, Sqlite, SqlitePool};

use super::{RepositoryError, RepositoryResult};

const POST_COLUMNS: &str = "id, user_id, source, author_name, author_headline, content, \
     original_url, post_date, raw_email, tags, captured_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, post: &NewPost) -> RepositoryResult<SavedPost>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<SavedPost>>;
    /// Newest first.
    async fn list_posts(
        &self,
        user_id: i64,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<SavedPost>>;
    async fn count_posts(&self, user_id: i64, filter: &PostFilter) -> RepositoryResult<i64>;
    /// Posts with `captured_at >= since`, newest first.
    async fn posts_captured_since(
        &self,
        user_id: i64,
        since: &str,
    ) -> RepositoryResult<Vec<SavedPost>>;
}

pub struct SqlitePostRepository {
    pool: SqlitePool,
}

impl SqlitePostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `%term%` with the term's own `\`, `%` and `_` escaped, for `LIKE ... ESCAPE '\'`.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_post_filters(builder: &mut QueryBuilder<'_, Sqlite>, user_id: i64, filter: &PostFilter) {
    builder.push(" WHERE user_id = ").push_bind(user_id);

    if let Some(search) = filter.search.as_deref() {
        let pattern = contains_pattern(search);
        builder
            .push(" AND (content LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR author_name LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR IFNULL(author_headline, '') LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }

    if let Some(author) = filter.author.as_deref() {
        builder
            .push(" AND author_name LIKE ")
            .push_bind(contains_pattern(author))
            .push(r" ESCAPE '\'");
    }

    if let Some(since) = filter.captured_since.as_deref() {
        builder
            .push(" AND captured_at >= ")
            .push_bind(since.to_string());
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create_post(&self, post: &NewPost) -> RepositoryResult<SavedPost> {
        let result = sqlx::query(
            r#"
            INSERT INTO saved_posts
                (user_id, source, author_name, author_headline, content, original_url,
                 post_date, raw_email, tags, captured_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.user_id)
        .bind(post.source.as_str())
        .bind(&post.author_name)
        .bind(&post.author_headline)
        .bind(&post.content)
        .bind(&post.original_url)
        .bind(&post.post_date)
        .bind(&post.raw_email)
        .bind(Json(&post.tags))
        .bind(&post.captured_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<SavedPost>> {
        let post = sqlx::query_as::<_, SavedPost>(&format!(
            "SELECT {POST_COLUMNS} FROM saved_posts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    async fn list_posts(
        &self,
        user_id: i64,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<SavedPost>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM saved_posts"));
        push_post_filters(&mut builder, user_id, filter);
        builder
            .push(" ORDER BY captured_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let posts = builder
            .build_query_as::<SavedPost>()
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn count_posts(&self, user_id: i64, filter: &PostFilter) -> RepositoryResult<i64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM saved_posts");
        push_post_filters(&mut builder, user_id, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn posts_captured_since(
        &self,
        user_id: i64,
        since: &str,
    ) -> RepositoryResult<Vec<SavedPost>> {
        let posts = sqlx::query_as::<_, SavedPost>(&format!(
            "SELECT {POST_COLUMNS} FROM saved_posts \
             WHERE user_id = ? AND captured_at >= ? \
             ORDER BY captured_at DESC, id DESC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}
