use chrono::Weekday;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Valid values for `users.digest_day`, in calendar order.
pub const DIGEST_DAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub const DEFAULT_DIGEST_DAY: &str = "sunday";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub inbound_email: String,
    pub plan: String,
    pub plan_expires_at: Option<String>,
    pub digest_day: String,
    pub created_at: String,
}

impl User {
    /// Digest day with the first letter capitalised, for prose.
    pub fn digest_day_display(&self) -> String {
        let mut chars = self.digest_day.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub inbound_email: String,
    pub plan: Plan,
    pub plan_expires_at: Option<String>,
    pub digest_day: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Trial,
    Monthly,
    Annual,
    Lifetime,
    Cancelled,
}

impl Plan {
    /// Plans that receive the scheduled weekly digest.
    pub const ACTIVE: [Plan; 4] = [Plan::Monthly, Plan::Annual, Plan::Lifetime, Plan::Trial];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Trial => "trial",
            Plan::Monthly => "monthly",
            Plan::Annual => "annual",
            Plan::Lifetime => "lifetime",
            Plan::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trial" => Some(Plan::Trial),
            "monthly" => Some(Plan::Monthly),
            "annual" => Some(Plan::Annual),
            "lifetime" => Some(Plan::Lifetime),
            "cancelled" => Some(Plan::Cancelled),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

/// Normalises a user-supplied weekday, accepting only full day names.
pub fn parse_digest_day(value: &str) -> Option<&'static str> {
    let lowered = value.trim().to_ascii_lowercase();
    DIGEST_DAYS.iter().copied().find(|day| *day == lowered)
}

pub fn weekday_name(day: Weekday) -> &'static str {
    DIGEST_DAYS[day.num_days_from_monday() as usize]
}
