use crate::client::{Feed, FeedError};
use crate::db::store::{self, Store, StoreError};
use crate::services::normalize::{normalize_snapshot, Observation};
use crate::services::ticker::Ticker;
use chrono::{SecondsFormat, SubsecRound, Utc};
use core::fmt;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Why one city produced no data in a cycle.
#[derive(Debug)]
pub enum PollError {
    Fetch(FeedError),
    Store(StoreError),
}

impl Display for PollError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Fetch(e) => write!(f, "fetch failed: {}", e),
            PollError::Store(e) => write!(f, "write failed, city rolled back: {}", e),
        }
    }
}

impl Error for PollError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PollError::Fetch(e) => Some(e),
            PollError::Store(e) => Some(e),
        }
    }
}

impl From<FeedError> for PollError {
    fn from(value: FeedError) -> Self {
        PollError::Fetch(value)
    }
}

impl From<StoreError> for PollError {
    fn from(value: StoreError) -> Self {
        PollError::Store(value)
    }
}

/// Which cities a cycle polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitySelection {
    /// Fixed list, polled in this order.
    Configured(Vec<String>),
    /// Every city the feed lists, re-discovered each cycle, in id order.
    Discover,
}

impl CitySelection {
    pub fn from_list(cities: Vec<String>) -> Self {
        if cities.is_empty() {
            CitySelection::Discover
        } else {
            CitySelection::Configured(cities)
        }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    /// Cities committed this cycle with their reading counts.
    pub stored: Vec<(String, usize)>,
    /// Cities that produced nothing this cycle, with the reason.
    pub failed: Vec<(String, String)>,
    /// Set when the city list itself could not be fetched.
    pub discovery_error: Option<String>,
}

impl CycleReport {
    pub fn readings(&self) -> usize {
        self.stored.iter().map(|(_, n)| n).sum()
    }
}

/// Poll forever: one cycle right away, then one per tick.
pub fn run_loop(store: &mut Store, feed: &dyn Feed, cities: &CitySelection, interval: Duration) {
    run_cycles(store, feed, cities, interval, None);
}

/// Like [`run_loop`], but stops after `max_cycles` cycles when given.
///
/// Cycles run on the calling thread, so a slow cycle delays the next tick
/// instead of overlapping with it. Returns the number of cycles run.
pub fn run_cycles(
    store: &mut Store,
    feed: &dyn Feed,
    cities: &CitySelection,
    interval: Duration,
    max_cycles: Option<usize>,
) -> usize {
    let mut ticker = Ticker::new(interval);
    let mut completed = 0;

    loop {
        let cycle_start = Instant::now();
        let report = poll_cycle(store, feed, cities);
        completed += 1;
        info!(
            "Poll cycle finished in {:.1}s: {} reading(s) from {} city(ies), {} city(ies) failed",
            cycle_start.elapsed().as_secs_f64(),
            report.readings(),
            report.stored.len(),
            report.failed.len()
        );

        if max_cycles.is_some_and(|max| completed >= max) {
            return completed;
        }

        if cycle_start.elapsed() > ticker.interval() {
            warn!(
                "Poll cycle took longer than the {}s interval",
                ticker.interval().as_secs()
            );
        }
        let dropped = ticker.wait();
        if dropped > 0 {
            warn!("Dropped {} poll tick(s) while the previous cycle was running", dropped);
        }
    }
}

/// One pass over the selected cities. Failures stay local to their city.
pub fn poll_cycle(store: &mut Store, feed: &dyn Feed, cities: &CitySelection) -> CycleReport {
    info!(
        "Starting poll cycle at {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let mut report = CycleReport::default();

    let city_ids = match resolve_cities(feed, cities) {
        Ok(ids) => ids,
        Err(e) => {
            error!("Listing cities failed, skipping cycle: {}", e);
            report.discovery_error = Some(e.to_string());
            return report;
        }
    };

    for city in city_ids {
        match poll_city(store, feed, &city) {
            Ok(count) => {
                info!("Stored {} parking lot(s) for {}", count, city);
                report.stored.push((city, count));
            }
            Err(e) => {
                warn!("Polling city {} failed: {}", city, e);
                report.failed.push((city, e.to_string()));
            }
        }
    }

    report
}

fn resolve_cities(feed: &dyn Feed, cities: &CitySelection) -> Result<Vec<String>, FeedError> {
    match cities {
        CitySelection::Configured(list) => Ok(list.clone()),
        CitySelection::Discover => {
            let index = feed.list_cities()?;
            debug!("Discovered {} city(ies)", index.len());
            Ok(index.into_keys().collect())
        }
    }
}

/// Fetch, normalize and store one city. Returns the number of readings written.
pub fn poll_city(store: &mut Store, feed: &dyn Feed, city: &str) -> Result<usize, PollError> {
    let snapshot = feed.fetch_city_snapshot(city)?;
    // whole seconds keep every stored timestamp the same width, so text order is time order
    let captured_at = Utc::now().trunc_subsecs(0);
    debug!(
        "Fetched {} lot(s) for {} (feed last_updated={})",
        snapshot.lots.len(),
        city,
        snapshot.last_updated.as_deref().unwrap_or("-")
    );

    let observations = normalize_snapshot(city, &snapshot, captured_at);
    Ok(store_observations(store, &observations)?)
}

/// Write a city's observations in one transaction: all of them or none.
pub fn store_observations(store: &mut Store, observations: &[Observation]) -> Result<usize, StoreError> {
    store.transaction(|tx| {
        for o in observations {
            store::upsert_lot(tx, &o.lot)?;
            store::insert_reading(tx, &o.reading)?;
        }
        Ok(observations.len())
    })
}
