pub mod digest;
pub mod magic_link;
pub mod pagination;
pub mod saved_post;
pub mod user;

pub use digest::{NewDigest, WeeklyDigest};
pub use magic_link::MagicLink;
pub use pagination::{PageRequest, Pagination};
pub use saved_post::{NewPost, PostFilter, PostSource, SavedPost};
pub use user::{NewUser, Plan, User, DIGEST_DAYS};

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp the way every table stores it.
///
/// Millisecond precision with a `Z` suffix keeps the strings fixed-width, so
/// `ORDER BY` and `>=` comparisons in SQL agree with chronological order.
pub fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp back into UTC.
pub fn parse_db_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);

        let a = db_timestamp(early);
        let b = db_timestamp(late);

        assert_eq!(a, "2025-01-02T03:04:05.000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_db_timestamp(&b), Some(late));
    }
}
