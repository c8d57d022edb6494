use serial_test::serial;
use std::env;
use std::time::Duration;
use steep::config::AppConfig;

const KEYS: [&str; 11] = [
    "HOST",
    "PORT",
    "APP_URL",
    "INBOUND_DOMAIN",
    "DIGEST_TIMEZONE",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_MODEL",
    "ANTHROPIC_BASE_URL",
    "LLM_TIMEOUT_SECS",
    "CRON_SECRET",
    "ENVIRONMENT",
];

fn clear_env() {
    for key in KEYS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();

    let config = AppConfig::from_env().unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.app_url, "http://localhost:3000");
    assert_eq!(config.inbound_domain, "save.steep.news");
    assert_eq!(config.digest_timezone, chrono_tz::America::Chicago);
    assert!(config.anthropic_api_key.is_none());
    assert!(config.cron_secret.is_none());
    assert!(!config.is_production());
    assert_eq!(config.dashboard_url(), "http://localhost:3000/dashboard");
}

#[test]
#[serial]
fn test_reads_and_normalises_environment() {
    clear_env();
    env::set_var("PORT", "9000");
    env::set_var("APP_URL", "https://steep.news/");
    env::set_var("INBOUND_DOMAIN", "Save.Example.COM");
    env::set_var("DIGEST_TIMEZONE", "Europe/Berlin");
    env::set_var("ANTHROPIC_API_KEY", "sk-test");
    env::set_var("LLM_TIMEOUT_SECS", "30");
    env::set_var("CRON_SECRET", "  ");
    env::set_var("ENVIRONMENT", "production");

    let config = AppConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.port, 9000);
    assert_eq!(config.app_url, "https://steep.news");
    assert_eq!(config.dashboard_url(), "https://steep.news/dashboard");
    assert_eq!(config.inbound_domain, "save.example.com");
    assert_eq!(config.digest_timezone, chrono_tz::Europe::Berlin);
    assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.llm_timeout, Duration::from_secs(30));
    assert!(config.cron_secret.is_none());
    assert!(config.is_production());
}

#[test]
#[serial]
fn test_invalid_values_are_errors() {
    clear_env();
    env::set_var("DIGEST_TIMEZONE", "Mars/Olympus");
    assert!(AppConfig::from_env().is_err());

    clear_env();
    env::set_var("PORT", "not-a-port");
    assert!(AppConfig::from_env().is_err());

    clear_env();
}
