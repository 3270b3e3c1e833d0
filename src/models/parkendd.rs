//! Wire models for the ParkenDD API.
//!
//! Scope: types only, no client code.
//!
//! Notes
//! - Only the two endpoints the ingestor consumes are modeled: the city index
//!   (`GET /`) and the per-city snapshot (`GET /{city}`).
//! - Fields the feed may omit or send as `null` are `Option`s. Empty strings are
//!   kept as sent; deciding what counts as "absent" is the normalizer's job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

/// Root document listing every city the feed knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityIndex {
    pub cities: BTreeMap<String, CityInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityInfo {
    pub name: String,
    #[serde(default)]
    pub active_support: bool,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One city's current availability, as returned by `GET /{city}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    #[serde(default)]
    pub last_downloaded: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    pub lots: Vec<FeedLot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedLot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(default)]
    pub lot_type: Option<String>,
    pub free: i64,
    pub total: i64,
    pub state: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub forecast: bool,
}
