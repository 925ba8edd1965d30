use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

pub const DEFAULT_DICE_BASE_URL: &str =
    "http://service.dice.com/api/rest/jobsearch/v1/simple.json";
pub const DEFAULT_USER_AGENT: &str = "jobsdb/0.1 (listing-ingest)";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Core parsing/validation logic, decoupled from the process environment so
/// it can be tested with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = lookup("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let env = parse_environment(&or_default("JOBSDB_ENV", "development"))?;
    let log_level = or_default("JOBSDB_LOG_LEVEL", "info");

    let dice_base_url = or_default("JOBSDB_DICE_BASE_URL", DEFAULT_DICE_BASE_URL);
    let request_timeout_secs = parse_var(&lookup, "JOBSDB_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("JOBSDB_USER_AGENT", DEFAULT_USER_AGENT);

    let max_pages: usize = parse_var(&lookup, "JOBSDB_MAX_PAGES", "10000")?;
    if max_pages == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "JOBSDB_MAX_PAGES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let max_retries = parse_var(&lookup, "JOBSDB_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_var(&lookup, "JOBSDB_RETRY_BACKOFF_BASE_MS", "500")?;
    let inter_page_delay_ms = parse_var(&lookup, "JOBSDB_INTER_PAGE_DELAY_MS", "0")?;
    let error_sample_limit = parse_var(&lookup, "JOBSDB_ERROR_SAMPLE_LIMIT", "5")?;

    let db_max_connections = parse_var(&lookup, "JOBSDB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_var(&lookup, "JOBSDB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_var(&lookup, "JOBSDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        dice_base_url,
        request_timeout_secs,
        user_agent,
        max_pages,
        max_retries,
        retry_backoff_base_ms,
        inter_page_delay_ms,
        error_sample_limit,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

fn parse_var<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "JOBSDB_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
