use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SavedPost {
    pub id: i64,
    pub user_id: i64,
    pub source: String,
    pub author_name: String,
    pub author_headline: Option<String>,
    pub content: String,
    pub original_url: Option<String>,
    pub post_date: Option<String>,
    #[serde(skip_serializing)]
    pub raw_email: Option<String>,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub captured_at: String,
}

/// Insert payload for `saved_posts`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub user_id: i64,
    pub source: PostSource,
    pub author_name: String,
    pub author_headline: Option<String>,
    pub content: String,
    pub original_url: Option<String>,
    pub post_date: Option<String>,
    pub raw_email: Option<String>,
    pub tags: Vec<String>,
    pub captured_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    Linkedin,
    Substack,
    Other,
}

impl PostSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostSource::Linkedin => "linkedin",
            PostSource::Substack => "substack",
            PostSource::Other => "other",
        }
    }

    /// Lenient parse: anything unrecognised is `Other`.
    pub fn parse(value: &str) -> Self {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered.contains("linkedin") {
            PostSource::Linkedin
        } else if lowered.contains("substack") {
            PostSource::Substack
        } else {
            PostSource::Other
        }
    }

    pub fn from_url(url: &str) -> Self {
        let lowered = url.to_ascii_lowercase();
        if lowered.contains("linkedin.com") {
            PostSource::Linkedin
        } else if lowered.contains("substack.com") {
            PostSource::Substack
        } else {
            PostSource::Other
        }
    }
}

/// Optional narrowing applied to a user's post listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    /// Matched against content, author name and headline.
    pub search: Option<String>,
    pub author: Option<String>,
    /// Inclusive lower bound on `captured_at`, already formatted for the db.
    pub captured_since: Option<String>,
}
