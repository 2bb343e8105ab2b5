use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub course_catalog_path: String,
    pub quiz_bank_path: String,
    pub retrieval_top_k: usize,
    pub step_timeout: Duration,
    pub default_module_price_eur: u32,
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            course_catalog_path: std::env::var("COURSE_CATALOG_PATH")
                .unwrap_or_else(|_| "data/courses.json".to_string()),
            quiz_bank_path: std::env::var("QUIZ_BANK_PATH")
                .unwrap_or_else(|_| "data/quizzes.json".to_string()),
            retrieval_top_k: parse_env("RETRIEVAL_TOP_K", 5)?,
            step_timeout: Duration::from_secs(parse_env("STEP_TIMEOUT_SECS", 60)?),
            default_module_price_eur: parse_env("DEFAULT_MODULE_PRICE_EUR", 50)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 7 * 24 * 60 * 60)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid number, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_accepts_numbers() {
        assert_eq!(parse_value::<u16>("PORT", " 9000 ").unwrap(), 9000);
        assert_eq!(parse_value::<usize>("RETRIEVAL_TOP_K", "3").unwrap(), 3);
    }

    #[test]
    fn test_parse_value_rejects_garbage_with_key_in_message() {
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
