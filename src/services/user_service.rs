use crate::models::user::{parse_digest_day, NewUser, Plan, User, DEFAULT_DIGEST_DAY};
use crate::models::db_timestamp;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;

pub const TRIAL_DAYS: i64 = 14;
const ALIAS_BASE_MAX_CHARS: usize = 20;
const ALIAS_NUMBERED_ATTEMPTS: u32 = 100;
const SIGNUP_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Email and name are required")]
    MissingField,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Invalid digest_day. Must be a day of the week.")]
    InvalidDigestDay,
    #[error("User not found")]
    UserNotFound,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct SignupRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

pub struct UpdateSettingsRequest {
    pub user_id: i64,
    pub name: Option<String>,
    pub digest_day: Option<String>,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    inbound_domain: String,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, inbound_domain: String) -> Self {
        Self {
            repository,
            inbound_domain,
        }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<User, UserServiceError> {
        let email = request
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let (Some(email), Some(name)) = (email, name) else {
            return Err(UserServiceError::MissingField);
        };

        self.validate_email(&email)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        // The existence checks above race with concurrent signups; the UNIQUE
        // constraints are the real guard, so a conflict triggers a re-check.
        for _ in 0..SIGNUP_ATTEMPTS {
            let now = Utc::now();
            let new_user = NewUser {
                email: email.clone(),
                name: name.clone(),
                inbound_email: self.generate_inbound_alias(&name).await?,
                plan: Plan::Trial,
                plan_expires_at: Some(db_timestamp(now + Duration::days(TRIAL_DAYS))),
                digest_day: DEFAULT_DIGEST_DAY.to_string(),
                created_at: db_timestamp(now),
            };

            match self.repository.create_user(&new_user).await {
                Ok(user) => {
                    tracing::info!("Created user {} with alias {}", user.email, user.inbound_email);
                    return Ok(user);
                }
                Err(RepositoryError::AlreadyExists) => {
                    if self.repository.find_by_email(&email).await?.is_some() {
                        return Err(UserServiceError::EmailTaken);
                    }
                    tracing::warn!("Alias {} was taken concurrently, retrying", new_user.inbound_email);
                }
                Err(e) => return Err(UserServiceError::RepositoryError(e)),
            }
        }

        Err(UserServiceError::RepositoryError(RepositoryError::AlreadyExists))
    }

    /// First free alias among `base`, `base1` .. `base100`, then `base` plus
    /// four random characters.
    pub async fn generate_inbound_alias(&self, name: &str) -> Result<String, UserServiceError> {
        let base = alias_base(name);

        let candidate = format!("{}@{}", base, self.inbound_domain);
        if !self.repository.inbound_email_exists(&candidate).await? {
            return Ok(candidate);
        }

        for counter in 1..=ALIAS_NUMBERED_ATTEMPTS {
            let candidate = format!("{}{}@{}", base, counter, self.inbound_domain);
            if !self.repository.inbound_email_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(4)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        Ok(format!("{}{}@{}", base, suffix, self.inbound_domain))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .repository
            .find_by_email(&email.trim().to_lowercase())
            .await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, UserServiceError> {
        self.find_user_by_id(id)
            .await?
            .ok_or(UserServiceError::UserNotFound)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn update_settings(
        &self,
        request: UpdateSettingsRequest,
    ) -> Result<User, UserServiceError> {
        let digest_day = match request.digest_day {
            Some(day) => Some(
                parse_digest_day(&day)
                    .ok_or(UserServiceError::InvalidDigestDay)?
                    .to_string(),
            ),
            None => None,
        };
        let name = request.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        match self
            .repository
            .update_settings(request.user_id, name, digest_day)
            .await
        {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty()
                    && domain.contains('.')
                    && !email.contains(char::is_whitespace)
                    && email.len() <= 255 =>
            {
                Ok(())
            }
            _ => Err(UserServiceError::InvalidEmail),
        }
    }
}

/// Lower-cased name with everything outside `[a-z0-9]` removed, at most 20
/// chars. Names with nothing usable become `user`.
pub fn alias_base(name: &str) -> String {
    let base: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(ALIAS_BASE_MAX_CHARS)
        .collect();
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}
