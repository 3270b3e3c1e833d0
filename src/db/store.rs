//! SQLite persistence for lots and readings.
//!
//! The write primitives take the connection handed out by
//! [`Store::transaction`] and never commit or roll back themselves; the caller
//! owns the transaction boundary.

use crate::db::models::{Lot, NewLot, NewReading, Reading};
use crate::schema;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::ConnectionError;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA journal_mode = WAL;
    PRAGMA busy_timeout = 5000;
";

#[derive(Debug)]
pub enum StoreError {
    Open(ConnectionError),
    Migration(String),
    Query(diesel::result::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Open(e) => write!(f, "opening database failed: {}", e),
            StoreError::Migration(e) => write!(f, "applying database migrations failed: {}", e),
            StoreError::Query(e) => write!(f, "query failed: {}", e),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Open(e) => Some(e),
            StoreError::Query(e) => Some(e),
            StoreError::Migration(_) => None,
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        StoreError::Query(value)
    }
}

/// Process-wide database handle. Dropping it closes the connection.
pub struct Store {
    conn: SqliteConnection,
    path: String,
}

impl Store {
    /// Open (or create) the database at `path` and bring the schema up to date.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let mut conn = SqliteConnection::establish(path).map_err(StoreError::Open)?;
        conn.batch_execute(CONNECTION_PRAGMAS)?;
        apply_migrations(&mut conn)?;
        info!("Database ready at {}", path);
        Ok(Store {
            conn,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Run `f` in one transaction: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError>,
    {
        self.conn.transaction(f)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        debug!("Closing database {}", self.path);
    }
}

fn apply_migrations(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    if applied.is_empty() {
        info!("Database schema is up to date; no migrations were applied");
    } else {
        let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
        info!("Applied {} database migration(s): {}", applied.len(), names);
    }
    Ok(())
}

/// Insert a lot, or refresh its metadata if the id is already known.
///
/// On conflict every mutable column is overwritten and `updated_at` is set even
/// when nothing else changed. `city` and `created_at` keep their first values.
pub fn upsert_lot(conn: &mut SqliteConnection, lot: &NewLot) -> Result<(), StoreError> {
    use schema::lots::dsl as L;

    diesel::insert_into(L::lots)
        .values(lot)
        .on_conflict(L::id)
        .do_update()
        .set((
            L::name.eq(lot.name.clone()),
            L::address.eq(lot.address.clone()),
            L::lot_type.eq(lot.lot_type.clone()),
            L::total.eq(lot.total),
            L::latitude.eq(lot.latitude),
            L::longitude.eq(lot.longitude),
            L::region.eq(lot.region.clone()),
            L::updated_at.eq(lot.updated_at),
        ))
        .execute(conn)?;
    Ok(())
}

/// Append a reading and return its assigned id. No deduplication.
pub fn insert_reading(conn: &mut SqliteConnection, reading: &NewReading) -> Result<i64, StoreError> {
    use schema::readings::dsl as R;

    let id = diesel::insert_into(R::readings)
        .values(reading)
        .returning(R::id)
        .get_result::<i64>(conn)?;
    Ok(id)
}

pub fn load_lots(conn: &mut SqliteConnection) -> Result<Vec<Lot>, StoreError> {
    use schema::lots::dsl as L;

    Ok(L::lots.order(L::id.asc()).load::<Lot>(conn)?)
}

pub fn load_lot(conn: &mut SqliteConnection, lot_id: &str) -> Result<Option<Lot>, StoreError> {
    use schema::lots::dsl as L;

    Ok(L::lots.find(lot_id).first::<Lot>(conn).optional()?)
}

/// Optional bounds for [`load_readings`]. Both time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub lot_ids: Option<Vec<String>>,
}

/// Readings matching `filter`, in time-series order (capture time, then id).
pub fn load_readings(conn: &mut SqliteConnection, filter: &ReadingFilter) -> Result<Vec<Reading>, StoreError> {
    use schema::readings::dsl as R;

    let mut query = R::readings.into_boxed();
    if let Some(start) = filter.start {
        query = query.filter(R::captured_at.ge(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(R::captured_at.le(end));
    }
    if let Some(ids) = &filter.lot_ids {
        query = query.filter(R::lot_id.eq_any(ids.clone()));
    }

    Ok(query.order((R::captured_at.asc(), R::id.asc())).load::<Reading>(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use diesel::sql_types::Text;

    #[derive(QueryableByName)]
    struct NameRow {
        #[diesel(sql_type = Text)]
        name: String,
    }

    fn memory_store() -> Store {
        Store::open(":memory:").expect("open in-memory store")
    }

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    fn lot(id: &str, name: &str, at: DateTime<Utc>) -> NewLot {
        NewLot {
            id: id.to_string(),
            city: "Dresden".to_string(),
            name: name.to_string(),
            address: Some("Wilsdruffer Straße".to_string()),
            lot_type: None,
            total: 400,
            latitude: Some(51.05),
            longitude: Some(13.73),
            region: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn reading(lot_id: &str, at: DateTime<Utc>, free: i64) -> NewReading {
        NewReading {
            lot_id: lot_id.to_string(),
            city: "Dresden".to_string(),
            captured_at: at,
            free,
            state: "open".to_string(),
        }
    }

    #[test]
    fn schema_has_both_tables_and_indexes() {
        let mut store = memory_store();
        let names: Vec<NameRow> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%' \
             AND name NOT LIKE '__diesel%' ORDER BY name",
        )
        .load(store.connection())
        .expect("list schema objects");
        let names = names.into_iter().map(|r| r.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["idx_readings_lot_id", "idx_readings_timestamp", "lots", "readings"]);
    }

    #[test]
    fn reopening_an_existing_database_is_a_no_op() {
        let path = std::env::temp_dir().join(format!("parking-ingestor-reopen-{}.db", std::process::id()));
        let path_str = path.to_str().expect("utf-8 temp path").to_string();
        let _ = std::fs::remove_file(&path);

        {
            let mut store = Store::open(&path_str).expect("first open");
            store
                .transaction(|tx| {
                    upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 0)))?;
                    insert_reading(tx, &reading("L1", ts(10, 0), 5))
                })
                .expect("seed");
        }

        let mut store = Store::open(&path_str).expect("second open");
        assert_eq!(load_lots(store.connection()).unwrap().len(), 1);
        assert_eq!(load_readings(store.connection(), &ReadingFilter::default()).unwrap().len(), 1);

        drop(store);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path_str, suffix));
        }
    }

    #[test]
    fn upsert_refreshes_metadata_but_keeps_created_at() {
        let mut store = memory_store();
        store.transaction(|tx| upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 0)))).unwrap();

        let mut second = lot("L1", "Altmarkt Tiefgarage", ts(10, 5));
        second.address = None;
        second.total = 420;
        store.transaction(|tx| upsert_lot(tx, &second)).unwrap();

        let stored = load_lot(store.connection(), "L1").unwrap().expect("lot exists");
        assert_eq!(stored.name, "Altmarkt Tiefgarage");
        assert_eq!(stored.address, None);
        assert_eq!(stored.total, 420);
        assert_eq!(stored.created_at, ts(10, 0));
        assert_eq!(stored.updated_at, ts(10, 5));
        assert_eq!(load_lots(store.connection()).unwrap().len(), 1);
    }

    #[test]
    fn upsert_without_changes_still_advances_updated_at() {
        let mut store = memory_store();
        store.transaction(|tx| upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 0)))).unwrap();
        store.transaction(|tx| upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 5)))).unwrap();

        let stored = load_lot(store.connection(), "L1").unwrap().unwrap();
        assert_eq!(stored.created_at, ts(10, 0));
        assert_eq!(stored.updated_at, ts(10, 5));
    }

    #[test]
    fn identical_readings_are_appended_twice() {
        let mut store = memory_store();
        let r = reading("L1", ts(10, 0), 17);
        let (first, second) = store
            .transaction(|tx| {
                upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 0)))?;
                Ok((insert_reading(tx, &r)?, insert_reading(tx, &r)?))
            })
            .unwrap();

        assert!(second > first);
        let rows = load_readings(store.connection(), &ReadingFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first);
        assert_eq!(rows[1].id, second);
        assert!(rows.iter().all(|row| row.free == 17 && row.captured_at == ts(10, 0)));
    }

    #[test]
    fn failed_transaction_leaves_nothing_behind() {
        let mut store = memory_store();
        let result: Result<(), StoreError> = store.transaction(|tx| {
            upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 0)))?;
            insert_reading(tx, &reading("L1", ts(10, 0), 3))?;
            Err(StoreError::Query(diesel::result::Error::RollbackTransaction))
        });

        assert!(result.is_err());
        assert!(load_lots(store.connection()).unwrap().is_empty());
        assert!(load_readings(store.connection(), &ReadingFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn reading_for_unknown_lot_is_rejected() {
        let mut store = memory_store();
        let result = store.transaction(|tx| insert_reading(tx, &reading("ghost", ts(10, 0), 1)));
        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[test]
    fn readings_come_back_in_capture_order_and_filtered() {
        let mut store = memory_store();
        store
            .transaction(|tx| {
                upsert_lot(tx, &lot("L1", "Altmarkt", ts(10, 0)))?;
                upsert_lot(tx, &lot("L2", "Postplatz", ts(10, 0)))?;
                // a replayed older reading lands after newer ones by id
                insert_reading(tx, &reading("L1", ts(10, 10), 3))?;
                insert_reading(tx, &reading("L2", ts(10, 10), 30))?;
                insert_reading(tx, &reading("L1", ts(10, 0), 1))?;
                insert_reading(tx, &reading("L1", ts(10, 20), 5))?;
                Ok(())
            })
            .unwrap();

        let all = load_readings(store.connection(), &ReadingFilter::default()).unwrap();
        let times = all.iter().map(|r| r.captured_at).collect::<Vec<_>>();
        assert_eq!(times, vec![ts(10, 0), ts(10, 10), ts(10, 10), ts(10, 20)]);

        let l1_window = load_readings(
            store.connection(),
            &ReadingFilter {
                start: Some(ts(10, 5)),
                end: Some(ts(10, 20)),
                lot_ids: Some(vec!["L1".to_string()]),
            },
        )
        .unwrap();
        let frees = l1_window.iter().map(|r| r.free).collect::<Vec<_>>();
        assert_eq!(frees, vec![3, 5]);
    }
}
