//! `EngineContext` — replaces the "global mutable registries /
//! module-level singletons" pattern the source hinted at (spec §9
//! REDESIGN FLAGS) with a single value threaded through construction.
//! The only process-wide thing left standing is the metrics sink,
//! which is itself an injected interface rather than a singleton.

use crate::bucket_store::{BucketStore, InMemoryBucketStore};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::idempotency::IdempotencyGuard;
use crate::metrics::MetricsSink;
use crate::snapshot_store::SnapshotStore;
use crate::types::Category;
use crate::window::Scorer;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// One `BucketStore` per category (including `ALL`), per spec §4.7's
/// "implementer's choice" note: the ALL aggregate is its own counter
/// series, incremented alongside the category-specific one.
pub struct CategoryStores {
    stores: DashMap<Category, Arc<dyn BucketStore>>,
}

impl CategoryStores {
    pub fn new(categories: &[Category]) -> Self {
        let stores = DashMap::new();
        for c in categories {
            stores.insert(c.clone(), Arc::new(InMemoryBucketStore::new()) as Arc<dyn BucketStore>);
        }
        CategoryStores { stores }
    }

    pub fn get(&self, category: &Category) -> Option<Arc<dyn BucketStore>> {
        self.stores.get(category).map(|e| e.value().clone())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.stores.iter().map(|e| e.key().clone()).collect()
    }
}

pub struct EngineContext {
    pub config: Arc<EngineConfig>,
    pub clock: Arc<dyn Clock>,
    pub stores: Arc<CategoryStores>,
    pub idempotency: Arc<IdempotencyGuard>,
    pub scorer: Arc<dyn Scorer>,
    pub metrics: Arc<dyn MetricsSink>,
    pub snapshot_store: Arc<dyn SnapshotStore>,
}

impl EngineContext {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        scorer: Arc<dyn Scorer>,
        metrics: Arc<dyn MetricsSink>,
        snapshot_store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, String> {
        config.validate()?;
        let categories = config.all_categories();
        let idempotency_ttl = Duration::from_secs(
            config.effective_idempotency_ttl_seconds().max(0) as u64,
        );
        Ok(EngineContext {
            stores: Arc::new(CategoryStores::new(&categories)),
            idempotency: Arc::new(IdempotencyGuard::new(idempotency_ttl)),
            config: Arc::new(config),
            clock,
            scorer,
            metrics,
            snapshot_store,
        })
    }
}
