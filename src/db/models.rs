//! Diesel model structs for lot metadata and the availability time-series.
//!
//! `lots` is mutable reference data keyed by the feed's lot id. `readings` is
//! append-only; rows are never updated or deleted by the ingestor.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::lots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Lot {
    pub id: String,
    pub city: String,
    pub name: String,
    pub address: Option<String>,
    pub lot_type: Option<String>,
    pub total: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lot metadata as seen in one poll.
///
/// `created_at` is only written when the row is first inserted; an upsert of an
/// existing lot keeps the stored value and takes `updated_at` from here.
#[derive(Debug, Clone, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::lots)]
pub struct NewLot {
    pub id: String,
    pub city: String,
    pub name: String,
    pub address: Option<String>,
    pub lot_type: Option<String>,
    pub total: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::readings)]
#[diesel(belongs_to(Lot))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Reading {
    pub id: i64,
    pub lot_id: String,
    pub city: String,
    pub captured_at: DateTime<Utc>,
    pub free: i64,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::readings)]
pub struct NewReading {
    pub lot_id: String,
    pub city: String,
    pub captured_at: DateTime<Utc>,
    pub free: i64,
    pub state: String,
}
