//! Blocking HTTP client for the ParkenDD availability feed.
//!
//! - Blocking client using `ureq` (no async), one shared agent.
//! - Two GET endpoints: the city index and the per-city snapshot.
//! - No retries. A failed request surfaces as `FeedError` and the caller decides
//!   what to do with the city.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::parkendd::{CityIndex, CityInfo, CitySnapshot};

pub const DEFAULT_BASE_URL: &str = "https://api.parkendd.de";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Source of parking snapshots consumed by the poll loop.
pub trait Feed {
    /// All cities known to the feed, keyed by city identifier.
    fn list_cities(&self) -> Result<BTreeMap<String, CityInfo>, FeedError>;

    /// Current per-lot availability for one city, in feed order.
    fn fetch_city_snapshot(&self, city: &str) -> Result<CitySnapshot, FeedError>;
}

#[derive(Debug)]
pub enum FeedErrorKind {
    Transport(String),
    Http { status: u16, message: String },
    Decode(String),
}

#[derive(Debug)]
pub struct FeedError {
    /// City the request was made for; `None` for the city index.
    pub city: Option<String>,
    pub kind: FeedErrorKind,
}

impl FeedError {
    fn new(city: Option<&str>, kind: FeedErrorKind) -> Self {
        FeedError {
            city: city.map(str::to_string),
            kind,
        }
    }
}

impl core::fmt::Display for FeedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(city) = &self.city {
            write!(f, "city {}: ", city)?;
        }
        match &self.kind {
            FeedErrorKind::Transport(s) => write!(f, "transport error: {}", s),
            FeedErrorKind::Http { status, message } => write!(f, "http {}: {}", status, message),
            FeedErrorKind::Decode(s) => write!(f, "decode error: {}", s),
        }
    }
}

impl std::error::Error for FeedError {}

pub struct ParkenddClient {
    agent: ureq::Agent,
    base_url: String,
}

impl ParkenddClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            // non-2xx responses are inspected below so the body ends up in the error
            .http_status_as_error(false)
            .build();

        ParkenddClient {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, city: Option<&str>) -> String {
        match city {
            Some(c) => format!("{}/{}", self.base_url, c),
            None => self.base_url.clone(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, city: Option<&str>) -> Result<T, FeedError> {
        let url = self.url(city);
        let mut res = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| FeedError::new(city, FeedErrorKind::Transport(e.to_string())))?;

        let status: http::StatusCode = res.status();
        let body = res
            .body_mut()
            .read_to_string()
            .map_err(|e| FeedError::new(city, FeedErrorKind::Transport(e.to_string())))?;

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                String::from("<no body>")
            } else {
                body
            };
            return Err(FeedError::new(
                city,
                FeedErrorKind::Http {
                    status: status.as_u16(),
                    message,
                },
            ));
        }

        decode_json(&body, city)
    }
}

impl Feed for ParkenddClient {
    fn list_cities(&self) -> Result<BTreeMap<String, CityInfo>, FeedError> {
        self.get_json::<CityIndex>(None).map(|index| index.cities)
    }

    fn fetch_city_snapshot(&self, city: &str) -> Result<CitySnapshot, FeedError> {
        self.get_json(Some(city))
    }
}

/// Decode a response body, reporting the JSON path of the first offending field.
pub fn decode_json<T: DeserializeOwned>(body: &str, city: Option<&str>) -> Result<T, FeedError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| FeedError::new(city, FeedErrorKind::Decode(e.to_string())))
}
