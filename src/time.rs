// Clock abstraction and elapsed-time helpers

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic instants and wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Monotonic instant used for elapsed-time measurement
    fn now(&self) -> Instant;

    /// Wall-clock time recorded as a snapshot's start time
    fn wall(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        #[cfg(miri)]
        {
            DateTime::<Utc>::UNIX_EPOCH
        }
        #[cfg(not(miri))]
        {
            Utc::now()
        }
    }
}

/// Deterministic clock that only moves when told to.
///
/// Used by event replay, where each record carries its own offset, and by
/// tests that need exact iteration timings.
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `ms` milliseconds
    pub fn advance_ms(&self, ms: u64) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += Duration::from_millis(ms);
    }

    /// Jump to an absolute offset from the origin. Going backwards is ignored.
    pub fn set_ms(&self, ms: u64) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        let target = Duration::from_millis(ms);
        if target > *offset {
            *offset = target;
        }
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset =
            chrono::Duration::from_std(self.offset()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + offset
    }
}

/// Whole milliseconds between two instants. Saturates at zero when `end`
/// precedes `start`.
pub fn elapsed_ms(start: Instant, end: Instant) -> u64 {
    let elapsed = end.saturating_duration_since(start).as_millis();
    u64::try_from(elapsed).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_ms_forward() {
        let start = Instant::now();
        let end = start + Duration::from_millis(250);
        assert_eq!(elapsed_ms(start, end), 250);
    }

    #[test]
    fn test_elapsed_ms_saturates() {
        let end = Instant::now();
        let start = end + Duration::from_millis(10);
        assert_eq!(elapsed_ms(start, end), 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        let w0 = clock.wall();

        clock.advance_ms(50);
        clock.advance_ms(30);

        assert_eq!(elapsed_ms(t0, clock.now()), 80);
        assert_eq!((clock.wall() - w0).num_milliseconds(), 80);
    }

    #[test]
    fn test_manual_clock_set_ignores_rewind() {
        let clock = ManualClock::new();
        let t0 = clock.now();

        clock.set_ms(100);
        clock.set_ms(40);

        assert_eq!(elapsed_ms(t0, clock.now()), 100);
    }
}
