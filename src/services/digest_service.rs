//! Weekly digest generation.
//!
//! A digest covers the posts captured in the seven days before generation.
//! An empty week produces a fixed reminder without touching the LLM; any
//! other week is summarised by one LLM call whose answer is stored verbatim.

use crate::models::{db_timestamp, NewDigest, PageRequest, Pagination, SavedPost, User, WeeklyDigest};
use crate::repositories::{DigestRepository, PostRepository, RepositoryError, UserRepository};
use crate::services::content_extractor::truncate_chars;
use crate::services::llm_client::{LlmClient, LlmError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const DIGEST_WINDOW_DAYS: i64 = 7;
pub const DIGEST_MAX_TOKENS: u32 = 4_000;
pub const PROMPT_POST_CONTENT_LIMIT: usize = 2_000;
pub const PREVIEW_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("User not found")]
    UserNotFound,
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

#[derive(Debug, Serialize)]
struct PromptPost<'a> {
    author: &'a str,
    headline: Option<&'a str>,
    content: &'a str,
    url: Option<&'a str>,
    source: &'a str,
    saved: &'a str,
}

#[derive(Debug, Serialize)]
pub struct DigestPage {
    pub digests: Vec<WeeklyDigest>,
    pub count: usize,
    pub pagination: Pagination,
}

pub struct DigestService {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    digests: Arc<dyn DigestRepository>,
    llm: Arc<dyn LlmClient>,
}

impl DigestService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        digests: Arc<dyn DigestRepository>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            users,
            posts,
            digests,
            llm,
        }
    }

    pub async fn generate_for_user(&self, user_id: i64) -> Result<WeeklyDigest, DigestError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(DigestError::UserNotFound)?;
        self.generate_at(&user, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<WeeklyDigest, DigestError> {
        let window_start = now - Duration::days(DIGEST_WINDOW_DAYS);
        let posts = self
            .posts
            .posts_captured_since(user.id, &db_timestamp(window_start))
            .await?;

        let digest_content = if posts.is_empty() {
            tracing::info!("No posts this week for {}, using reminder", user.email);
            no_posts_reminder(user)
        } else {
            let previous = self.digests.count_for_user(user.id).await?;
            let prompt = build_digest_prompt(user, &posts, previous + 1);
            tracing::info!("Generating digest for {} over {} posts", user.email, posts.len());
            self.llm.complete(&prompt, DIGEST_MAX_TOKENS).await?
        };

        let digest = self
            .digests
            .create_digest(&NewDigest {
                user_id: user.id,
                week_start: window_start.date_naive().to_string(),
                week_end: now.date_naive().to_string(),
                post_count: posts.len() as i64,
                digest_content,
                created_at: db_timestamp(now),
            })
            .await?;

        tracing::info!("Saved digest {} for {}", digest.id, user.email);
        Ok(digest)
    }

    pub async fn list_digests(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<DigestPage, DigestError> {
        let total = self.digests.count_for_user(user_id).await?;
        let digests = self
            .digests
            .list_for_user(user_id, page.limit, page.offset())
            .await?;

        Ok(DigestPage {
            count: digests.len(),
            digests,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn find_digest(&self, id: i64) -> Result<Option<WeeklyDigest>, DigestError> {
        Ok(self.digests.find_by_id(id).await?)
    }

    pub async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), DigestError> {
        Ok(self.digests.mark_sent(id, &db_timestamp(at)).await?)
    }
}

/// First 500 characters followed by `...`.
pub fn preview(content: &str) -> String {
    format!("{}...", truncate_chars(content, PREVIEW_CHARS))
}

pub fn no_posts_reminder(user: &User) -> String {
    format!(
        r#"## ☕ Your Week, Distilled

Hey {name},

We brewed your weekly digest, but the pot's empty this week. No posts saved!

**Here's how to capture content for next week:**

1. **Forward posts** to `{alias}`
2. **Save interesting LinkedIn content** as you scroll
3. **Let it steep** all week
4. **Get your digest** every {day}

The best insights come from consistent curation. Start saving this week and watch the patterns emerge.

**Quick tip:** When you see a post worth remembering, forward it immediately. Your future self will thank you.

See you next week,
**Steep** ☕

---

*Not seeing value? Reply and let us know how we can help.*"#,
        name = user.name,
        alias = user.inbound_email,
        day = user.digest_day_display(),
    )
}

pub fn build_digest_prompt(user: &User, posts: &[SavedPost], weeks_active: i64) -> String {
    let prompt_posts: Vec<PromptPost<'_>> = posts
        .iter()
        .map(|post| PromptPost {
            author: &post.author_name,
            headline: post.author_headline.as_deref(),
            content: truncate_chars(&post.content, PROMPT_POST_CONTENT_LIMIT),
            url: post.original_url.as_deref(),
            source: &post.source,
            saved: &post.captured_at,
        })
        .collect();
    let posts_json = serde_json::to_string_pretty(&prompt_posts).unwrap_or_else(|_| "[]".into());

    format!(
        r#"You are a personal knowledge curator creating a weekly digest for a busy professional.

USER CONTEXT:
- Name: {name}
- Weeks using Steep: {weeks_active}

THIS WEEK'S SAVED CONTENT ({count} posts):
{posts_json}

CREATE A WEEKLY DIGEST WITH THESE SECTIONS:

## ☕ THE THROUGHLINE
What's the connective tissue across everything saved this week? (2-3 sentences)

## 📚 THIS WEEK'S THEMES
Group posts into 2-4 themes. For each:
### Theme Name (a punchy title)
- **The Pattern**: What people are saying (2-3 sentences)
- **The Posts**: Brief summary of each relevant post with [→ Original](url) link
- **Your Takeaway**: One actionable insight

## 👀 PEOPLE WORTH FOLLOWING
Authors who appeared multiple times or posted great content. Include why they're worth following.

## 💎 THE SLEEPER
One post that seems minor but contains a hidden gem worth revisiting.

## 🤔 REFLECTION PROMPT
One thought-provoking question based on what they saved.

STYLE GUIDELINES:
- Write like a smart friend giving highlights
- Conversational, not formal
- Skimmable in 3-4 minutes
- Every post summary must link to original
- If only 1-2 posts were saved, keep it brief and acknowledge the light week"#,
        name = user.name,
        count = posts.len(),
    )
}
