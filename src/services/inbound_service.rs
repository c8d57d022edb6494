use crate::models::{db_timestamp, NewPost, SavedPost};
use crate::repositories::{PostRepository, RepositoryError, UserRepository};
use crate::services::content_extractor::{ContentExtractor, InboundEmail};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("Missing recipient address")]
    MissingRecipient,
    #[error("User not found")]
    UserNotFound { inbound_email: String },
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// The Postmark inbound webhook fields this service reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundPayload {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
}

pub struct InboundService {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    extractor: ContentExtractor,
    inbound_domain: String,
}

impl InboundService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        extractor: ContentExtractor,
        inbound_domain: String,
    ) -> Self {
        Self {
            users,
            posts,
            extractor,
            inbound_domain,
        }
    }

    /// Resolves the recipient, extracts the forwarded post and stores it
    /// together with the raw webhook body.
    pub async fn receive(&self, raw: serde_json::Value) -> Result<SavedPost, InboundError> {
        let payload: InboundPayload = serde_json::from_value(raw.clone()).unwrap_or_default();

        let recipient = payload
            .to
            .as_deref()
            .and_then(|to| normalize_recipient(to, &self.inbound_domain))
            .ok_or(InboundError::MissingRecipient)?;

        tracing::info!(
            "Received email for: {} from: {}",
            recipient,
            payload.from.as_deref().unwrap_or("unknown")
        );

        let user = self
            .users
            .find_by_inbound_email(&recipient)
            .await?
            .ok_or_else(|| InboundError::UserNotFound {
                inbound_email: recipient.clone(),
            })?;

        let email = InboundEmail {
            subject: payload.subject.unwrap_or_default(),
            text_body: payload.text_body.unwrap_or_default(),
            html_body: payload.html_body.unwrap_or_default(),
        };
        let extracted = self.extractor.extract(&email).await;

        tracing::debug!(
            "Parsed content: source={} author={} length={}",
            extracted.source.as_str(),
            extracted.author_name,
            extracted.content.len()
        );

        let post = self
            .posts
            .create_post(&NewPost {
                user_id: user.id,
                source: extracted.source,
                author_name: extracted.author_name,
                author_headline: extracted.author_headline,
                content: extracted.content,
                original_url: extracted.original_url,
                post_date: extracted.post_date,
                raw_email: Some(raw.to_string()),
                tags: extracted.tags,
                captured_at: db_timestamp(Utc::now()),
            })
            .await?;

        tracing::info!("Saved post {} for user {}", post.id, user.email);
        Ok(post)
    }
}

/// Bare lower-cased address from a `To` header. With several recipients the
/// one on `inbound_domain` wins.
pub fn normalize_recipient(to: &str, inbound_domain: &str) -> Option<String> {
    let addresses: Vec<String> = to
        .split(',')
        .map(|part| {
            let part = part.trim();
            let bare = match (part.rfind('<'), part.rfind('>')) {
                (Some(start), Some(end)) if start < end => &part[start + 1..end],
                _ => part,
            };
            bare.trim().trim_matches('"').to_lowercase()
        })
        .filter(|address| address.contains('@'))
        .collect();

    let domain_suffix = format!("@{}", inbound_domain.to_lowercase());
    addresses
        .iter()
        .find(|address| address.ends_with(&domain_suffix))
        .or_else(|| addresses.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_are_reduced_to_bare_addresses() {
        assert_eq!(
            normalize_recipient("  ANN@Save.Steep.News ", "save.steep.news").as_deref(),
            Some("ann@save.steep.news")
        );
        assert_eq!(
            normalize_recipient("\"Ann\" <ann@save.steep.news>", "save.steep.news").as_deref(),
            Some("ann@save.steep.news")
        );
        assert_eq!(
            normalize_recipient("me@gmail.com, Steep <ann2@save.steep.news>", "save.steep.news")
                .as_deref(),
            Some("ann2@save.steep.news")
        );
        assert_eq!(
            normalize_recipient("someone@else.com", "save.steep.news").as_deref(),
            Some("someone@else.com")
        );
        assert_eq!(normalize_recipient("   ", "save.steep.news"), None);
    }
}
