use crate::models::user::weekday_name;
use crate::models::{User, WeeklyDigest};
use crate::repositories::{RepositoryError, UserRepository};
use crate::services::digest_service::DigestService;
use crate::services::email_service::EmailService;
use crate::services::markdown::{digest_subject, render_digest_email};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Sent,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub user: String,
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_count: Option<i64>,
}

impl DispatchResult {
    fn sent(user: &User, post_count: i64) -> Self {
        Self {
            user: user.email.clone(),
            status: DispatchStatus::Sent,
            reason: None,
            post_count: Some(post_count),
        }
    }

    fn skipped(user: &User, reason: &str) -> Self {
        Self {
            user: user.email.clone(),
            status: DispatchStatus::Skipped,
            reason: Some(reason.to_string()),
            post_count: None,
        }
    }

    fn error(user: &User, reason: impl Into<String>) -> Self {
        Self {
            user: user.email.clone(),
            status: DispatchStatus::Error,
            reason: Some(reason.into()),
            post_count: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub day: String,
    pub results: Vec<DispatchResult>,
}

/// Lower-case weekday name of `now` in `tz`.
pub fn day_of_week(now: DateTime<Utc>, tz: Tz) -> &'static str {
    weekday_name(now.with_timezone(&tz).weekday())
}

/// Runs the scheduled digest send for everyone whose digest day is today.
pub struct DigestDispatcher {
    users: Arc<dyn UserRepository>,
    digest_service: Arc<DigestService>,
    email_service: Arc<dyn EmailService>,
    timezone: Tz,
    dashboard_url: String,
}

impl DigestDispatcher {
    pub fn new(
        users: Arc<dyn UserRepository>,
        digest_service: Arc<DigestService>,
        email_service: Arc<dyn EmailService>,
        timezone: Tz,
        dashboard_url: String,
    ) -> Self {
        Self {
            users,
            digest_service,
            email_service,
            timezone,
            dashboard_url,
        }
    }

    pub async fn dispatch_due(&self) -> Result<DispatchSummary, RepositoryError> {
        let day = day_of_week(Utc::now(), self.timezone);
        self.dispatch_for_day(day).await
    }

    /// Users are processed one at a time; a failure is recorded against that
    /// user and the batch carries on.
    pub async fn dispatch_for_day(&self, day: &str) -> Result<DispatchSummary, RepositoryError> {
        tracing::info!("Running digest dispatch for {}", day);
        let users = self.users.list_digest_recipients(day).await?;

        let mut results = Vec::with_capacity(users.len());
        for user in &users {
            results.push(self.dispatch_user(user).await);
        }

        Ok(DispatchSummary {
            day: day.to_string(),
            results,
        })
    }

    async fn dispatch_user(&self, user: &User) -> DispatchResult {
        let digest = match self.digest_service.generate_at(user, Utc::now()).await {
            Ok(digest) => digest,
            Err(e) => {
                tracing::error!("Digest generation failed for {}: {}", user.email, e);
                return DispatchResult::error(user, e.to_string());
            }
        };

        if digest.post_count == 0 {
            return DispatchResult::skipped(user, "no posts this week");
        }

        self.send_digest(user, &digest).await
    }

    /// Emails an already generated digest and marks it sent.
    pub async fn send_digest(&self, user: &User, digest: &WeeklyDigest) -> DispatchResult {
        let html = render_digest_email(digest, user, &self.dashboard_url);
        if let Err(e) = self
            .email_service
            .send_digest_email(&user.email, &digest_subject(digest.post_count), &html)
            .await
        {
            tracing::error!("Email error for {}: {}", user.email, e);
            return DispatchResult::error(user, "email failed");
        }

        if let Err(e) = self.digest_service.mark_sent(digest.id, Utc::now()).await {
            tracing::error!("Failed to mark digest {} sent: {}", digest.id, e);
            return DispatchResult::error(user, e.to_string());
        }

        tracing::info!("Sent digest {} to {}", digest.id, user.email);
        DispatchResult::sent(user, digest.post_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn weekday_is_evaluated_in_the_configured_zone() {
        // 03:00 UTC on a Monday is still Sunday evening in Chicago.
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap();
        assert_eq!(day_of_week(now, chrono_tz::America::Chicago), "sunday");
        assert_eq!(day_of_week(now, chrono_tz::UTC), "monday");
    }

    #[test]
    fn results_serialize_without_empty_fields() {
        let user = User {
            id: 1,
            email: "ann@x.com".into(),
            name: "Ann".into(),
            inbound_email: "ann@save.steep.news".into(),
            plan: "trial".into(),
            plan_expires_at: None,
            digest_day: "sunday".into(),
            created_at: "2025-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_value(DispatchResult::sent(&user, 4)).unwrap();
        assert_eq!(json, serde_json::json!({"user": "ann@x.com", "status": "sent", "post_count": 4}));

        let json = serde_json::to_value(DispatchResult::skipped(&user, "no posts this week")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user": "ann@x.com", "status": "skipped", "reason": "no posts this week"})
        );
    }
}
