//! `MetricsSink` — the one process-wide injected interface spec §9's
//! redesign notes call out explicitly ("only process-wide thing is
//! the metrics sink, which is an injected interface"). Formatting and
//! export are out of scope (spec §1); this only defines the counters
//! the core increments.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait MetricsSink: Send + Sync {
    fn incr_duplicate(&self) {}
    fn incr_invalid_event(&self) {}
    fn incr_overloaded(&self) {}
    fn incr_storage_drop(&self) {}
    fn incr_slow_consumer_disconnect(&self) {}
    fn incr_snapshot_build_failed(&self) {}
    fn incr_snapshot_persist_failed(&self) {}
}

/// A dependency-free sink that does nothing, used when the host
/// application doesn't wire up real metrics export.
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}

/// In-process atomic counters, handy for tests and for the default
/// binary's status endpoint.
#[derive(Default)]
pub struct CountingMetricsSink {
    pub duplicates: AtomicU64,
    pub invalid_events: AtomicU64,
    pub overloaded: AtomicU64,
    pub storage_drops: AtomicU64,
    pub slow_consumer_disconnects: AtomicU64,
    pub snapshot_build_failures: AtomicU64,
    pub snapshot_persist_failures: AtomicU64,
}

impl MetricsSink for CountingMetricsSink {
    fn incr_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_invalid_event(&self) {
        self.invalid_events.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_overloaded(&self) {
        self.overloaded.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_storage_drop(&self) {
        self.storage_drops.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_slow_consumer_disconnect(&self) {
        self.slow_consumer_disconnects.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_snapshot_build_failed(&self) {
        self.snapshot_build_failures.fetch_add(1, Ordering::Relaxed);
    }
    fn incr_snapshot_persist_failed(&self) {
        self.snapshot_persist_failures.fetch_add(1, Ordering::Relaxed);
    }
}
