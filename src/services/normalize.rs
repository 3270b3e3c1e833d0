use crate::db::models::{NewLot, NewReading};
use crate::models::parkendd::{CitySnapshot, FeedLot};
use chrono::{DateTime, Utc};

/// One lot's metadata together with the reading taken in the same fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub lot: NewLot,
    pub reading: NewReading,
}

/// Map a city snapshot to one observation per feed lot, in feed order.
///
/// `captured_at` is stamped on every reading so that one fetch yields one
/// joinable batch.
pub fn normalize_snapshot(city: &str, snapshot: &CitySnapshot, captured_at: DateTime<Utc>) -> Vec<Observation> {
    snapshot
        .lots
        .iter()
        .map(|l| normalize_lot(city, l, captured_at))
        .collect()
}

fn normalize_lot(city: &str, lot: &FeedLot, captured_at: DateTime<Utc>) -> Observation {
    Observation {
        lot: NewLot {
            id: lot.id.clone(),
            city: city.to_string(),
            name: lot.name.clone(),
            address: non_empty(&lot.address),
            lot_type: non_empty(&lot.lot_type),
            total: lot.total,
            latitude: lot.coords.map(|c| c.lat),
            longitude: lot.coords.map(|c| c.lng),
            region: non_empty(&lot.region),
            created_at: captured_at,
            updated_at: captured_at,
        },
        reading: NewReading {
            lot_id: lot.id.clone(),
            city: city.to_string(),
            captured_at,
            free: lot.free,
            state: lot.state.clone(),
        },
    }
}

// The feed sends "" for text fields it has no value for.
fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}
