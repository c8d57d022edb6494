use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_db_timestamp;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub expires_at: String,
    pub used: bool,
    pub created_at: String,
}

impl MagicLink {
    /// An unparseable expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match parse_db_timestamp(&self.expires_at) {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_timestamp;
    use chrono::Duration;

    fn link(expires_at: String) -> MagicLink {
        MagicLink {
            id: 1,
            user_id: 1,
            token: "t".into(),
            expires_at,
            used: false,
            created_at: db_timestamp(Utc::now()),
        }
    }

    #[test]
    fn expiry_is_checked_against_the_given_instant() {
        let now = Utc::now();
        let fresh = link(db_timestamp(now + Duration::minutes(15)));
        let stale = link(db_timestamp(now - Duration::seconds(1)));

        assert!(!fresh.is_expired_at(now));
        assert!(stale.is_expired_at(now));
        assert!(fresh.is_expired_at(now + Duration::minutes(16)));
    }

    #[test]
    fn garbage_expiry_is_treated_as_expired() {
        assert!(link("not a date".into()).is_expired_at(Utc::now()));
    }
}
