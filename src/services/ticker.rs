//! Fixed-interval ticker for the poll loop.
//!
//! Ticks fall on the grid `start + k * interval`. A cycle that overruns gets
//! one immediate tick when it finishes; every other grid point it slept through
//! is dropped, never queued.

use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    /// First tick is one `interval` from now. `interval` must be non-zero.
    pub fn new(interval: Duration) -> Self {
        Ticker {
            interval,
            next: Instant::now() + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block on the calling thread until the next tick.
    ///
    /// Returns the number of ticks dropped because the caller came back late.
    pub fn wait(&mut self) -> u32 {
        let now = Instant::now();
        if now < self.next {
            thread::sleep(self.next - now);
        }
        let (next, dropped) = advance(self.next, Instant::now(), self.interval);
        self.next = next;
        dropped
    }
}

/// Fire the tick due at `deadline` and schedule the first grid point after `now`.
fn advance(deadline: Instant, now: Instant, interval: Duration) -> (Instant, u32) {
    let behind = now.saturating_duration_since(deadline);
    let skipped = behind.as_nanos() / interval.as_nanos();
    let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
    let next = deadline + interval * skipped.saturating_add(1);
    (next, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN: Duration = Duration::from_secs(10);

    #[test]
    fn on_time_tick_schedules_one_interval_ahead() {
        let base = Instant::now();
        assert_eq!(advance(base, base, TEN), (base + TEN, 0));
        assert_eq!(advance(base, base + Duration::from_secs(3), TEN), (base + TEN, 0));
    }

    #[test]
    fn overrun_coalesces_into_one_tick_and_drops_the_rest() {
        let base = Instant::now();
        // due at +0, caller back at +25: the +10 and +20 ticks are dropped
        assert_eq!(advance(base, base + Duration::from_secs(25), TEN), (base + Duration::from_secs(30), 2));
    }

    #[test]
    fn landing_exactly_on_a_grid_point_drops_it() {
        let base = Instant::now();
        assert_eq!(advance(base, base + Duration::from_secs(20), TEN), (base + Duration::from_secs(30), 2));
    }

    #[test]
    fn wait_sleeps_until_the_first_tick() {
        let interval = Duration::from_millis(40);
        let started = Instant::now();
        let mut ticker = Ticker::new(interval);
        assert_eq!(ticker.wait(), 0);
        assert!(started.elapsed() >= interval);
    }

    #[test]
    fn late_wait_returns_immediately() {
        let interval = Duration::from_millis(20);
        let mut ticker = Ticker::new(interval);
        thread::sleep(Duration::from_millis(70));

        let before = Instant::now();
        let dropped = ticker.wait();
        assert!(before.elapsed() < interval);
        assert!(dropped >= 2, "dropped {dropped}");
    }
}
