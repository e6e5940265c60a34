//! Periodic persistence of rankings for restart and history (spec
//! §4.9, C9). Writes are best-effort and must never block the engine.

use crate::types::{Category, Snapshot};
use dashmap::DashMap;
use std::collections::BTreeMap;

pub trait SnapshotStore: Send + Sync {
    /// Persist one snapshot. Failures are logged and counted by the
    /// caller; they must never propagate back into the refresh loop.
    fn persist(
        &self,
        window: &str,
        category: &Category,
        snapshot: &Snapshot,
    ) -> Result<(), String>;

    /// Most recent snapshot for `(window, category)`, used to seed the
    /// engine on startup.
    fn load_latest(&self, window: &str, category: &Category) -> Option<Snapshot>;
}

/// In-memory history, bounded per `(window, category)` by
/// `retention_generations`. Keyed by generation so history reads are
/// cheap and ordered.
pub struct InMemorySnapshotStore {
    history: DashMap<(String, Category), BTreeMap<u64, Snapshot>>,
    retention_generations: u32,
}

impl InMemorySnapshotStore {
    pub fn new(retention_generations: u32) -> Self {
        InMemorySnapshotStore {
            history: DashMap::new(),
            retention_generations,
        }
    }

    #[cfg(test)]
    pub fn generation_count(&self, window: &str, category: &Category) -> usize {
        self.history
            .get(&(window.to_owned(), category.clone()))
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn persist(
        &self,
        window: &str,
        category: &Category,
        snapshot: &Snapshot,
    ) -> Result<(), String> {
        let mut entry = self
            .history
            .entry((window.to_owned(), category.clone()))
            .or_default();
        entry.insert(snapshot.generation, snapshot.clone());
        while entry.len() > self.retention_generations as usize {
            let oldest = *entry.keys().next().expect("non-empty");
            entry.remove(&oldest);
        }
        Ok(())
    }

    fn load_latest(&self, window: &str, category: &Category) -> Option<Snapshot> {
        self.history
            .get(&(window.to_owned(), category.clone()))
            .and_then(|m| m.values().last().cloned())
    }
}
