use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub batch: BatchDefaults,
    pub ingest_max_items: usize,
    pub jd_fetch_timeout: Duration,
    /// Regional/consent policy: never send resume content to the LLM.
    pub local_only_coaching: bool,
    pub webhook_url: Option<String>,
    pub latex_bin: String,
    pub asset_url_ttl: Duration,
    /// Requeue items stuck in `processing` longer than this when a run starts.
    pub stale_processing_after: Option<Duration>,
}

/// Worker-pool defaults applied when a run request omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDefaults {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = BatchDefaults::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            batch: BatchDefaults {
                concurrency: env_or("BATCH_CONCURRENCY", defaults.concurrency)?.max(1),
                max_retries: env_or("BATCH_MAX_RETRIES", defaults.max_retries)?.max(1),
                retry_delay: Duration::from_millis(env_or(
                    "BATCH_RETRY_DELAY_MS",
                    defaults.retry_delay.as_millis() as u64,
                )?),
            },
            ingest_max_items: env_or("INGEST_MAX_ITEMS", 50)?,
            jd_fetch_timeout: Duration::from_secs(env_or("JD_FETCH_TIMEOUT_SECS", 10)?),
            local_only_coaching: env_or("LOCAL_ONLY_COACHING", false)?,
            webhook_url: std::env::var("WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            latex_bin: std::env::var("LATEX_BIN").unwrap_or_else(|_| "tectonic".to_string()),
            asset_url_ttl: Duration::from_secs(env_or("ASSET_URL_TTL_SECS", 7 * 24 * 3600)?),
            stale_processing_after: std::env::var("STALE_PROCESSING_SECS")
                .ok()
                .map(|v| {
                    v.parse::<u64>()
                        .context("STALE_PROCESSING_SECS must be a number of seconds")
                })
                .transpose()?
                .map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/tailor_test".to_string(),
            s3_bucket: "tailor-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            anthropic_api_key: "test".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            batch: BatchDefaults::default(),
            ingest_max_items: 5,
            jd_fetch_timeout: Duration::from_secs(1),
            local_only_coaching: true,
            webhook_url: None,
            latex_bin: "tectonic".to_string(),
            asset_url_ttl: Duration::from_secs(60),
            stale_processing_after: None,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
