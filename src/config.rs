use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// ThingWorx base URL, without a trailing slash.
    pub thingworx_url: String,
    /// Sent as the `appKey` query parameter when present.
    pub thingworx_app_key: Option<String>,
    /// Refresh cycle period in seconds.
    pub refresh_interval_secs: u64,
    /// Lifetime of a cached sensor reading in seconds.
    pub cache_ttl_secs: u64,
    /// A reading is connected if `|now - lastUpdated|` is within this window.
    pub connected_window_secs: i64,
    /// Per-request deadline for telemetry fetches in seconds.
    pub fetch_timeout_secs: u64,
    /// Upper bound on in-flight telemetry fetches per cycle.
    pub max_concurrent_fetches: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            thingworx_url: normalize_base_url(&required("THINGWORX_URL")?),
            thingworx_app_key: non_empty(optional("THINGWORX_APP_KEY", "")),
            refresh_interval_secs: optional("REFRESH_INTERVAL_SECS", "60")
                .parse()
                .context("REFRESH_INTERVAL_SECS must be a positive integer")?,
            cache_ttl_secs: optional("CACHE_TTL_SECS", "180")
                .parse()
                .context("CACHE_TTL_SECS must be a positive integer")?,
            connected_window_secs: optional("CONNECTED_WINDOW_SECS", "60")
                .parse()
                .context("CONNECTED_WINDOW_SECS must be a positive integer")?,
            fetch_timeout_secs: optional("FETCH_TIMEOUT_SECS", "10")
                .parse()
                .context("FETCH_TIMEOUT_SECS must be a positive integer")?,
            max_concurrent_fetches: optional("MAX_CONCURRENT_FETCHES", "16")
                .parse()
                .context("MAX_CONCURRENT_FETCHES must be a positive integer")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero-valued intervals, windows and limits.
    pub fn validate(&self) -> Result<()> {
        if self.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than zero");
        }
        if self.refresh_interval_secs == 0 {
            bail!("REFRESH_INTERVAL_SECS must be greater than zero");
        }
        if self.cache_ttl_secs == 0 {
            bail!("CACHE_TTL_SECS must be greater than zero");
        }
        if self.connected_window_secs <= 0 {
            bail!("CONNECTED_WINDOW_SECS must be greater than zero");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("FETCH_TIMEOUT_SECS must be greater than zero");
        }
        if self.max_concurrent_fetches == 0 {
            bail!("MAX_CONCURRENT_FETCHES must be greater than zero");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
pub(crate) fn test_config(thingworx_url: &str) -> Config {
    Config {
        database_url: "postgres://localhost/room_status_test".to_owned(),
        db_max_connections: 2,
        thingworx_url: normalize_base_url(thingworx_url),
        thingworx_app_key: None,
        refresh_interval_secs: 60,
        cache_ttl_secs: 180,
        connected_window_secs: 60,
        fetch_timeout_secs: 2,
        max_concurrent_fetches: 4,
    }
}
