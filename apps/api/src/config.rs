use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::queue::AckMode;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub queue_name: String,
    pub queue_ack_mode: AckMode,
    pub worker_count: usize,
    pub agent_timeout: Duration,
    pub fetch_timeout: Duration,
    pub quota_max_daily: i32,
    pub quota_window: Duration,
    pub privileged_role: String,
    pub sse_keep_alive: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let worker_count: usize = parse_env("WORKER_COUNT", 3)?;
        if worker_count == 0 {
            bail!("WORKER_COUNT must be at least 1");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: optional_env("S3_REGION", "auto"),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG", "info"),
            queue_name: optional_env("QUEUE_NAME", "sessions"),
            queue_ack_mode: parse_env("QUEUE_ACK_MODE", AckMode::OnReceipt)?,
            worker_count,
            agent_timeout: Duration::from_secs(parse_env("AGENT_TIMEOUT_SECS", 120)?),
            fetch_timeout: Duration::from_secs(parse_env("FETCH_TIMEOUT_SECS", 30)?),
            quota_max_daily: parse_env("QUOTA_MAX_DAILY", 2)?,
            quota_window: Duration::from_secs(parse_env("QUOTA_WINDOW_SECS", 86_400)?),
            privileged_role: optional_env("PRIVILEGED_ROLE", "admin"),
            sse_keep_alive: Duration::from_secs(parse_env("SSE_KEEP_ALIVE_SECS", 20)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_numbers() {
        assert_eq!(parse_value::<u16>("PORT", " 9090 ").unwrap(), 9090);
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("PORT"), "error names the variable: {err}");
    }

    #[test]
    fn test_parse_value_ack_mode() {
        assert_eq!(
            parse_value::<AckMode>("QUEUE_ACK_MODE", "after_commit").unwrap(),
            AckMode::AfterCommit
        );
        assert!(parse_value::<AckMode>("QUEUE_ACK_MODE", "never").is_err());
    }
}
