use crate::models::{db_timestamp, PageRequest, Pagination, PostFilter, SavedPost};
use crate::repositories::{PostRepository, RepositoryError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Invalid date_filter. Must be one of today, week, month, year, all.")]
    InvalidDateFilter,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// Relative capture-time window for the library listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Since local midnight.
    Today,
    Week,
    Month,
    Year,
    All,
}

impl DateFilter {
    pub fn parse(value: Option<&str>) -> Result<Self, PostServiceError> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(DateFilter::All);
        };
        match value.to_ascii_lowercase().as_str() {
            "today" => Ok(DateFilter::Today),
            "week" => Ok(DateFilter::Week),
            "month" => Ok(DateFilter::Month),
            "year" => Ok(DateFilter::Year),
            "all" => Ok(DateFilter::All),
            _ => Err(PostServiceError::InvalidDateFilter),
        }
    }

    pub fn since(&self, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        match self {
            DateFilter::Today => {
                let midnight = now.with_timezone(&tz).date_naive().and_hms_opt(0, 0, 0)?;
                Some(
                    tz.from_local_datetime(&midnight)
                        .earliest()
                        .map(|local| local.with_timezone(&Utc))
                        .unwrap_or(now - Duration::hours(24)),
                )
            }
            DateFilter::Week => Some(now - Duration::days(7)),
            DateFilter::Month => Some(now - Duration::days(30)),
            DateFilter::Year => Some(now - Duration::days(365)),
            DateFilter::All => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ListPostsQuery {
    pub user_id: i64,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub date_filter: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    pub posts: Vec<SavedPost>,
    pub pagination: Pagination,
}

pub struct PostService {
    repository: Arc<dyn PostRepository>,
    timezone: Tz,
}

impl PostService {
    pub fn new(repository: Arc<dyn PostRepository>, timezone: Tz) -> Self {
        Self {
            repository,
            timezone,
        }
    }

    pub async fn list_posts(&self, query: ListPostsQuery) -> Result<PostPage, PostServiceError> {
        let date_filter = DateFilter::parse(query.date_filter.as_deref())?;
        let filter = PostFilter {
            search: non_blank(query.search),
            author: non_blank(query.author),
            captured_since: date_filter
                .since(Utc::now(), self.timezone)
                .map(db_timestamp),
        };
        let request = PageRequest::new(query.page, query.limit);

        let total = self.repository.count_posts(query.user_id, &filter).await?;
        let posts = self
            .repository
            .list_posts(query.user_id, &filter, request.limit, request.offset())
            .await?;

        Ok(PostPage {
            posts,
            pagination: Pagination::new(request, total),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::post_repository::MockPostRepository;
    use mockall::predicate::*;

    #[test]
    fn date_filter_parses_known_values() {
        assert_eq!(DateFilter::parse(None).unwrap(), DateFilter::All);
        assert_eq!(DateFilter::parse(Some("")).unwrap(), DateFilter::All);
        assert_eq!(DateFilter::parse(Some("Week")).unwrap(), DateFilter::Week);
        assert!(matches!(
            DateFilter::parse(Some("decade")),
            Err(PostServiceError::InvalidDateFilter)
        ));
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 15, 30, 0).unwrap();
        let since = DateFilter::Today
            .since(now, chrono_tz::America::Chicago)
            .unwrap();
        // Chicago is on CDT (UTC-5) on 12 March 2025.
        assert_eq!(since, Utc.with_ymd_and_hms(2025, 3, 12, 5, 0, 0).unwrap());
        assert_eq!(
            DateFilter::Week.since(now, chrono_tz::UTC),
            Some(now - Duration::days(7))
        );
        assert_eq!(DateFilter::All.since(now, chrono_tz::UTC), None);
    }

    #[tokio::test]
    async fn listing_passes_filters_and_paginates() {
        let mut repo = MockPostRepository::new();
        repo.expect_count_posts()
            .withf(|user_id, filter| {
                *user_id == 5
                    && filter.search.as_deref() == Some("rust")
                    && filter.author.is_none()
                    && filter.captured_since.is_some()
            })
            .times(1)
            .returning(|_, _| Box::pin(async move { Ok(45) }));
        repo.expect_list_posts()
            .with(eq(5), always(), eq(20), eq(20))
            .times(1)
            .returning(|_, _, _, _| Box::pin(async move { Ok(Vec::new()) }));

        let page = PostService::new(Arc::new(repo), chrono_tz::UTC)
            .list_posts(ListPostsQuery {
                user_id: 5,
                page: Some(2),
                search: Some(" rust ".into()),
                author: Some("  ".into()),
                date_filter: Some("month".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 45);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_more);
    }
}
