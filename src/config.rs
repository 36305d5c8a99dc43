use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::classify::ImagePolicy;
use crate::classify::image::DEFAULT_MIN_DIMENSION;
use crate::evaluator::DEFAULT_FETCH_CONCURRENCY;

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars (never hardcoded). The .env file is loaded
/// automatically at startup via dotenvy. The allow-list is not here: it is
/// persisted in the store and snapshotted when the bot starts.
pub struct Config {
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    /// User id allowed to issue `!r` admin commands. Unset disables them.
    pub admin_id: Option<u64>,
    /// Never flag animated images (GIFs) as duplicates.
    pub ignore_gifs: bool,
    /// Images with both sides below this many pixels are never flagged.
    pub min_image_size: u32,
    pub fetch_timeout: Duration,
    /// Items fetched concurrently per message.
    pub fetch_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; malformed values are errors rather than
    /// being silently replaced.
    pub fn load() -> Result<Self> {
        Ok(Self {
            db_path: env::var("RECYCLER_DB_PATH").unwrap_or_else(|_| "./recycler.db".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            admin_id: parse_var("RECYCLER_ADMIN_ID")?,
            ignore_gifs: parse_flag("RECYCLER_IGNORE_GIFS")?,
            min_image_size: parse_var("RECYCLER_MIN_IMAGE_SIZE")?.unwrap_or(DEFAULT_MIN_DIMENSION),
            fetch_timeout: Duration::from_secs(
                parse_var("RECYCLER_FETCH_TIMEOUT_SECS")?.unwrap_or(10),
            ),
            fetch_concurrency: parse_var("RECYCLER_FETCH_CONCURRENCY")?
                .unwrap_or(DEFAULT_FETCH_CONCURRENCY),
        })
    }

    /// The image flagging policy these settings describe.
    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy {
            min_dimension: self.min_image_size,
            ignore_animated: self.ignore_gifs,
        }
    }

    /// Whether DATABASE_URL selects the PostgreSQL backend.
    pub fn uses_postgres(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(|url| url.starts_with("postgres://") || url.starts_with("postgresql://"))
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(None),
    }
}

fn parse_flag(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw).with_context(|| format!("{name} must be true/false, got {raw:?}")),
        Err(_) => Ok(false),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("not a boolean: {other}"),
    }
}
