//! Cached query surface for the current Top-K (spec §4.10, C10).

use crate::engine::TrendingEngine;
use crate::types::{Category, Snapshot};
use std::sync::Arc;

pub struct ReadApi {
    engine: Arc<TrendingEngine>,
}

impl ReadApi {
    pub fn new(engine: Arc<TrendingEngine>) -> Self {
        ReadApi { engine }
    }

    /// Returns the most recently committed snapshot, truncated to at
    /// most `k_prime` entries. Never blocks on refresh; an unknown
    /// `(window, category)` or a not-yet-refreshed pair both read as
    /// an empty snapshot with generation 0 (spec §4.10, §7).
    pub fn get_topk(&self, window: &str, category: &Category, k_prime: usize) -> Snapshot {
        let snapshot = self
            .engine
            .current_snapshot(window, category)
            .unwrap_or_else(|| Arc::new(Snapshot::empty()));
        let mut entries = snapshot.entries.clone();
        entries.truncate(k_prime);
        Snapshot {
            generation: snapshot.generation,
            entries,
        }
    }
}
