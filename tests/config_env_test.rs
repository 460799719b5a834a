//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy, so each test removes what it sets.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use diagnosis_engine::config::{Config, LogFormat};
use diagnosis_engine::error::AppError;
use diagnosis_engine::tree::Locale;
use serial_test::serial;
use std::env;
use std::time::Duration;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    let result = Config::from_env();
    assert!(result.is_ok(), "Config::from_env() needs no required vars");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/trees.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/trees.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_invalid_number_uses_default() {
    env::set_var("DATABASE_MAX_CONNECTIONS", "not-a-number");
    env::set_var("ACTIVE_TREE_CACHE_TTL_SECS", "soon");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.catalog.active_cache_ttl, Duration::from_secs(60));

    env::remove_var("DATABASE_MAX_CONNECTIONS");
    env::remove_var("ACTIVE_TREE_CACHE_TTL_SECS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    env::remove_var("LOG_FORMAT");
    env::remove_var("LOG_LEVEL");
}

#[test]
#[serial]
fn test_config_unknown_log_format_is_pretty() {
    env::set_var("LOG_FORMAT", "xml");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_cache_ttl_zero_disables_cache() {
    env::set_var("ACTIVE_TREE_CACHE_TTL_SECS", "0");

    let config = Config::from_env().unwrap();
    assert_eq!(config.catalog.active_cache_ttl, Duration::ZERO);

    env::remove_var("ACTIVE_TREE_CACHE_TTL_SECS");
}

#[test]
#[serial]
fn test_config_default_locale() {
    env::set_var("DEFAULT_LOCALE", "en");

    let config = Config::from_env().unwrap();
    assert_eq!(config.catalog.default_locale, Locale::En);

    env::remove_var("DEFAULT_LOCALE");
}

#[test]
#[serial]
fn test_config_invalid_locale_is_config_error() {
    env::set_var("DEFAULT_LOCALE", "fr");

    let result = Config::from_env();
    env::remove_var("DEFAULT_LOCALE");

    match result {
        Err(AppError::Config { message }) => assert!(message.starts_with("DEFAULT_LOCALE")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_config_upload_default_author() {
    env::set_var("UPLOAD_DEFAULT_AUTHOR", "workshop-lead");

    let config = Config::from_env().unwrap();
    assert_eq!(config.catalog.default_author, "workshop-lead");

    env::remove_var("UPLOAD_DEFAULT_AUTHOR");
}

#[test]
#[serial]
fn test_config_session_idle_ttl() {
    env::set_var("SESSION_IDLE_TTL_SECS", "90");

    let config = Config::from_env().unwrap();
    assert_eq!(config.catalog.session_idle_ttl, Duration::from_secs(90));

    env::remove_var("SESSION_IDLE_TTL_SECS");

    let config = Config::from_env().unwrap();
    assert_eq!(config.catalog.session_idle_ttl, Duration::from_secs(1800));
}
