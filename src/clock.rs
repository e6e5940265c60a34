//! Monotone wall time + quantization to bucket boundaries (spec §4.1, C1).

use crate::types::BucketStart;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of "now" for every other component. Injected so tests can
/// drive the engine with a deterministic clock instead of real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Quantizes an instant down to the start of the bucket containing it.
pub fn bucket_of(t: DateTime<Utc>, bucket_width_secs: i64) -> BucketStart {
    let secs = t.timestamp();
    BucketStart(secs - secs.rem_euclid(bucket_width_secs))
}

/// Wall-clock `Clock`. Any observed jump backwards is clamped forward
/// so `now()` is monotone non-decreasing even if the OS clock steps.
pub struct SystemClock {
    high_water_mark: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            high_water_mark: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let observed = Utc::now().timestamp_millis();
        let clamped = self
            .high_water_mark
            .fetch_max(observed, Ordering::Relaxed)
            .max(observed);
        DateTime::from_timestamp_millis(clamped).unwrap_or_else(Utc::now)
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only
/// moves forward when explicitly told to.
#[cfg(any(test, feature = "test-support"))]
pub struct TestClock {
    now: parking_lot::RwLock<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-support"))]
impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        TestClock {
            now: parking_lot::RwLock::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut guard = self.now.write();
        *guard += chrono::Duration::seconds(secs);
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.write() = t;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_of_quantizes_down() {
        let t = DateTime::from_timestamp(125, 0).unwrap();
        assert_eq!(bucket_of(t, 60), BucketStart(120));
        let t2 = DateTime::from_timestamp(120, 0).unwrap();
        assert_eq!(bucket_of(t2, 60), BucketStart(120));
    }

    #[test]
    fn system_clock_is_monotone_under_clamp() {
        let clock = SystemClock::new();
        let a = clock.now();
        // Force the high water mark ahead, simulating what a backwards
        // OS clock step would otherwise produce.
        clock
            .high_water_mark
            .store(a.timestamp_millis() + 10_000, Ordering::Relaxed);
        let b = clock.now();
        assert!(b >= a);
    }
}
