use std::env;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_INBOUND_DOMAIN: &str = "save.steep.news";
pub const DEFAULT_DIGEST_TIMEZONE: Tz = chrono_tz::America::Chicago;
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read once at startup and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL used in emailed links and dashboard redirects.
    pub app_url: String,
    pub inbound_domain: String,
    /// Zone in which "today" is evaluated for the scheduled digest run.
    pub digest_timezone: Tz,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    pub llm_timeout: Duration,
    /// Bearer secret guarding the cron endpoint; open when unset.
    pub cron_secret: Option<String>,
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            app_url: DEFAULT_APP_URL.to_string(),
            inbound_domain: DEFAULT_INBOUND_DOMAIN.to_string(),
            digest_timezone: DEFAULT_DIGEST_TIMEZONE,
            anthropic_api_key: None,
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            llm_timeout: Duration::from_secs(120),
            cron_secret: None,
            environment: "development".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match non_empty_var("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => defaults.port,
        };

        let digest_timezone = match non_empty_var("DIGEST_TIMEZONE") {
            Some(value) => value.parse::<Tz>().map_err(|_| ConfigError::Invalid {
                key: "DIGEST_TIMEZONE",
                value,
            })?,
            None => defaults.digest_timezone,
        };

        let llm_timeout = match non_empty_var("LLM_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    key: "LLM_TIMEOUT_SECS",
                    value,
                })?,
            None => defaults.llm_timeout,
        };

        Ok(Self {
            host: non_empty_var("HOST").unwrap_or(defaults.host),
            port,
            app_url: non_empty_var("APP_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.app_url),
            inbound_domain: non_empty_var("INBOUND_DOMAIN")
                .map(|domain| domain.to_ascii_lowercase())
                .unwrap_or(defaults.inbound_domain),
            digest_timezone,
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            anthropic_model: non_empty_var("ANTHROPIC_MODEL").unwrap_or(defaults.anthropic_model),
            anthropic_base_url: non_empty_var("ANTHROPIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.anthropic_base_url),
            llm_timeout,
            cron_secret: non_empty_var("CRON_SECRET"),
            environment: non_empty_var("ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.app_url)
    }
}

/// Refuses to boot a production deployment with unsafe settings.
pub fn validate_production_config(config: &AppConfig) {
    if !config.is_production() {
        if config.anthropic_api_key.is_none() {
            warn!("ANTHROPIC_API_KEY not set; extraction will use fallback parsing only");
        }
        if config.cron_secret.is_none() {
            warn!("CRON_SECRET not set; the digest cron endpoint is unauthenticated");
        }
        return;
    }

    if config.anthropic_api_key.is_none() {
        panic!("FATAL: ANTHROPIC_API_KEY must be set in production");
    }

    if config.cron_secret.is_none() {
        panic!("FATAL: CRON_SECRET must be set in production");
    }

    if !config.app_url.starts_with("https://") {
        panic!("FATAL: APP_URL must use https in production");
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
