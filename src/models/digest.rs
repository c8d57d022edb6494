use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WeeklyDigest {
    pub id: i64,
    pub user_id: i64,
    pub week_start: String,
    pub week_end: String,
    pub post_count: i64,
    pub digest_content: String,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl WeeklyDigest {
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDigest {
    pub user_id: i64,
    pub week_start: String,
    pub week_end: String,
    pub post_count: i64,
    pub digest_content: String,
    pub created_at: String,
}
