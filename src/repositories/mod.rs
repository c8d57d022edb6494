pub mod digest_repository;
pub mod magic_link_repository;
pub mod post_repository;
pub mod user_repository;

pub use digest_repository::{DigestRepository, SqliteDigestRepository};
pub use magic_link_repository::{MagicLinkRepository, SqliteMagicLinkRepository};
pub use post_repository::{PostRepository, SqlitePostRepository};
pub use user_repository::{SqliteUserRepository, UserRepository};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Maps a UNIQUE constraint violation to `AlreadyExists`.
pub(crate) fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepositoryError::AlreadyExists
        }
        _ => RepositoryError::Database(err),
    }
}
