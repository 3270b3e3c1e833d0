//! Minimal runtime configuration helpers.
//! Everything comes from environment variables; defaults suit a local run.

use crate::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "parking.db";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file.
    pub database_path: String,
    /// Poll cadence; never zero.
    pub poll_interval: Duration,
    /// Cities to poll, in order. Empty means every city the feed lists.
    pub cities: Vec<String>,
    pub feed_base_url: String,
    /// Per-request timeout for the feed client; never zero.
    pub feed_timeout: Duration,
    /// Serve synthetic data instead of calling the feed.
    pub feed_fake: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_path = match lookup("DATABASE_PATH") {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => DEFAULT_DATABASE_PATH.to_string(),
        };

        let poll_interval = Duration::from_secs(positive_secs(
            &lookup,
            "POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?);
        let feed_timeout = Duration::from_secs(positive_secs(
            &lookup,
            "FEED_TIMEOUT_SECS",
            DEFAULT_TIMEOUT.as_secs(),
        )?);

        let cities = parse_cities(&lookup("CITIES").unwrap_or_default());

        let feed_base_url = match lookup("FEED_BASE_URL") {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => DEFAULT_BASE_URL.to_string(),
        };

        let feed_fake = lookup("FEED_FAKE")
            .map(|s| matches!(s.trim(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        Ok(Config {
            database_path,
            poll_interval,
            cities,
            feed_base_url,
            feed_timeout,
            feed_fake,
        })
    }
}

fn positive_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, String> {
    match lookup(key) {
        Some(s) if !s.trim().is_empty() => match s.trim().parse::<u64>() {
            Ok(0) => Err(format!("{} must be greater than zero", key)),
            Ok(v) => Ok(v),
            Err(_) => Err(format!("{} must be a whole number of seconds, got {:?}", key, s)),
        },
        _ => Ok(default),
    }
}

/// Split a comma-separated city list, dropping empty segments.
pub fn parse_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
