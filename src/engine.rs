//! Owns one `TopKHeap` per `(window, category)`; orchestrates the
//! refresh tick (spec §4.6, C6).

use crate::broadcaster::{diff, ChangeBroadcaster};
use crate::clock::bucket_of;
use crate::registry::EngineContext;
use crate::topk::TopKHeap;
use crate::types::{BucketStart, Category, Snapshot, WindowDef};
use crate::window::score_of;
use parking_lot::{Mutex, RwLock};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type PairKey = (String, Category);

/// Owns every heap and published snapshot. Refresh is the sole writer
/// of both; `ReadAPI` only ever reads the published `Arc<Snapshot>`.
pub struct TrendingEngine {
    ctx: Arc<EngineContext>,
    broadcaster: Arc<ChangeBroadcaster>,
    heaps: DashMap<PairKey, Mutex<TopKHeap>>,
    snapshots: DashMap<PairKey, RwLock<Arc<Snapshot>>>,
    tick_count: AtomicU64,
}

impl TrendingEngine {
    pub fn new(ctx: Arc<EngineContext>, broadcaster: Arc<ChangeBroadcaster>) -> Self {
        let heaps = DashMap::new();
        let snapshots = DashMap::new();
        for window in &ctx.config.windows {
            for category in ctx.config.all_categories() {
                let key = (window.name.clone(), category.clone());
                heaps.insert(key.clone(), Mutex::new(TopKHeap::new(ctx.config.k)));
                let seeded = ctx
                    .snapshot_store
                    .load_latest(&window.name, &category)
                    .unwrap_or_else(Snapshot::empty);
                snapshots.insert(key, RwLock::new(Arc::new(seeded)));
            }
        }
        TrendingEngine {
            ctx,
            broadcaster,
            heaps,
            snapshots,
            tick_count: AtomicU64::new(0),
        }
    }

    /// Current committed snapshot for `(window, category)`. Never
    /// blocks on refresh (spec §4.10).
    pub fn current_snapshot(&self, window: &str, category: &Category) -> Option<Arc<Snapshot>> {
        self.snapshots
            .get(&(window.to_owned(), category.clone()))
            .map(|entry| entry.read().clone())
    }

    pub fn subscribe(&self, window: &str, category: &Category) -> crate::broadcaster::Subscription {
        self.broadcaster.subscribe(window, category)
    }

    /// Runs one full refresh tick across every configured
    /// `(window, category)` pair, then evicts expired buckets and
    /// idempotency entries (spec §4.6 steps 1-3).
    pub fn refresh_once(&self) {
        let now = self.ctx.clock.now();
        let bucket_width = self.ctx.config.bucket_width_seconds;
        let now_bucket = bucket_of(now, bucket_width);

        for window in &self.ctx.config.windows {
            for category in self.ctx.config.all_categories() {
                self.refresh_pair(window, &category, now_bucket);
            }
        }

        let window_max = self.ctx.config.window_max_seconds();
        let cutoff = BucketStart(now_bucket.0 - window_max - self.ctx.config.grace_seconds);
        for category in self.ctx.config.all_categories() {
            if let Some(store) = self.ctx.stores.get(&category) {
                store.evict_older_than(cutoff, bucket_width);
            }
        }
        self.ctx.idempotency.sweep();

        self.tick_count.fetch_add(1, Ordering::Relaxed);
    }

    fn refresh_pair(&self, window: &WindowDef, category: &Category, now_bucket: BucketStart) {
        let Some(store) = self.ctx.stores.get(category) else {
            return;
        };
        let bucket_width = self.ctx.config.bucket_width_seconds;
        let key = (window.name.clone(), category.clone());

        let candidates = match store.all_videos_in_window(window, bucket_width, now_bucket) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(window = %window.name, category = %category, error = %e, "all_videos_in_window failed, keeping prior snapshot");
                return;
            }
        };

        let Some(heap_lock) = self.heaps.get(&key) else {
            return;
        };
        let mut heap = heap_lock.lock();

        let heap_videos = heap.video_ids();
        let mut candidate_set: HashSet<_> = candidates.iter().cloned().collect();
        candidate_set.extend(heap_videos.iter().cloned());

        let mut build_failed = false;
        for video in &candidate_set {
            match score_of(
                store.as_ref(),
                video,
                window,
                bucket_width,
                now_bucket,
                self.ctx.scorer.as_ref(),
            ) {
                Ok(score) => {
                    if heap.contains(video) {
                        heap.update(video, score);
                    } else {
                        heap.offer(video.clone(), score);
                    }
                }
                Err(e) => {
                    tracing::warn!(window = %window.name, category = %category, video = %video, error = %e, "scoring failed");
                    build_failed = true;
                    break;
                }
            }
        }

        if build_failed {
            self.ctx.metrics.incr_snapshot_build_failed();
            return;
        }

        // Anything left in the heap that wasn't reachable from this
        // scan has fully expired out of the window; remove it.
        for video in heap.video_ids() {
            if !candidate_set.contains(&video) {
                heap.remove(&video);
            }
        }

        let Some(snapshot_lock) = self.snapshots.get(&key) else {
            return;
        };
        let old_snapshot = snapshot_lock.read().clone();
        let new_generation = old_snapshot.generation + 1;
        let new_snapshot = Arc::new(Snapshot {
            generation: new_generation,
            entries: heap.snapshot_entries(),
        });
        drop(heap);

        *snapshot_lock.write() = new_snapshot.clone();

        let delta = diff(
            &window.name,
            category,
            new_generation,
            &old_snapshot,
            &new_snapshot,
        );
        self.broadcaster.publish(delta);

        let tick = self.tick_count.load(Ordering::Relaxed);
        if tick.is_multiple_of(self.ctx.config.snapshot_persist_every_n_ticks as u64) {
            if let Err(e) = self
                .ctx
                .snapshot_store
                .persist(&window.name, category, &new_snapshot)
            {
                tracing::warn!(window = %window.name, category = %category, error = %e, "snapshot persist failed");
                self.ctx.metrics.incr_snapshot_persist_failed();
            }
        }
    }
}
