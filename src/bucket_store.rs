//! Per-(video, bucket) integer counters with TTL-driven eviction
//! (spec §4.2, C2).

use crate::error::EngineError;
use crate::types::{BucketStart, VideoId, WindowDef};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sparse counter store: absent entries read as zero. Enumerable two
/// ways — per-video (all buckets for a video) and per-window (all
/// videos with any activity in a window) — per spec §4.2.
pub trait BucketStore: Send + Sync {
    /// Atomically add `delta` to `(video, bucket_start)`, creating the
    /// row if needed, and return the post-increment value.
    fn increment(
        &self,
        video: &VideoId,
        bucket_start: BucketStart,
        delta: u64,
    ) -> Result<u64, EngineError>;

    /// Sum of counts across the `N` most recent buckets of `window`
    /// ending at `bucket_of(now)`, for a single video.
    fn window_sum(
        &self,
        video: &VideoId,
        window: &WindowDef,
        bucket_width_secs: i64,
        now_bucket: BucketStart,
    ) -> Result<u64, EngineError>;

    /// Every video with at least one non-zero bucket inside `window`.
    /// Finite, not restartable — a fresh call re-scans current state.
    fn all_videos_in_window(
        &self,
        window: &WindowDef,
        bucket_width_secs: i64,
        now_bucket: BucketStart,
    ) -> Result<Vec<VideoId>, EngineError>;

    /// Drop every bucket row whose end is at or before `cutoff`.
    fn evict_older_than(&self, cutoff: BucketStart, bucket_width_secs: i64);
}

/// Default in-memory implementation. Sharded by video id via
/// `DashMap` (same pattern as the pack's `agentreplay` sharded metrics
/// aggregator) so concurrent ingest workers never contend on a single
/// global lock; the innermost counter is a lock-free `AtomicU64`.
pub struct InMemoryBucketStore {
    counts: DashMap<VideoId, DashMap<BucketStart, AtomicU64>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        InMemoryBucketStore {
            counts: DashMap::new(),
        }
    }

    fn recent_buckets(
        window: &WindowDef,
        bucket_width_secs: i64,
        now_bucket: BucketStart,
    ) -> impl Iterator<Item = BucketStart> {
        let n = window.bucket_count(bucket_width_secs);
        (0..n).map(move |i| BucketStart(now_bucket.0 - i * bucket_width_secs))
    }

    #[cfg(test)]
    pub fn bucket_row_count(&self) -> usize {
        self.counts.iter().map(|row| row.value().len()).sum()
    }
}

impl Default for InMemoryBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn increment(
        &self,
        video: &VideoId,
        bucket_start: BucketStart,
        delta: u64,
    ) -> Result<u64, EngineError> {
        if delta == 0 {
            return Err(EngineError::InvalidEvent(
                "increment delta must be positive".into(),
            ));
        }
        let row = self.counts.entry(video.clone()).or_default();
        let counter = row.entry(bucket_start).or_insert_with(|| AtomicU64::new(0));
        Ok(counter.fetch_add(delta, Ordering::Relaxed) + delta)
    }

    fn window_sum(
        &self,
        video: &VideoId,
        window: &WindowDef,
        bucket_width_secs: i64,
        now_bucket: BucketStart,
    ) -> Result<u64, EngineError> {
        let Some(row) = self.counts.get(video) else {
            return Ok(0);
        };
        let sum = Self::recent_buckets(window, bucket_width_secs, now_bucket)
            .filter_map(|b| row.get(&b).map(|c| c.load(Ordering::Relaxed)))
            .sum();
        Ok(sum)
    }

    fn all_videos_in_window(
        &self,
        window: &WindowDef,
        bucket_width_secs: i64,
        now_bucket: BucketStart,
    ) -> Result<Vec<VideoId>, EngineError> {
        let buckets: Vec<BucketStart> =
            Self::recent_buckets(window, bucket_width_secs, now_bucket).collect();
        let mut out = Vec::new();
        for entry in self.counts.iter() {
            let has_activity = buckets.iter().any(|b| {
                entry
                    .value()
                    .get(b)
                    .map(|c| c.load(Ordering::Relaxed) > 0)
                    .unwrap_or(false)
            });
            if has_activity {
                out.push(entry.key().clone());
            }
        }
        Ok(out)
    }

    fn evict_older_than(&self, cutoff: BucketStart, bucket_width_secs: i64) {
        for row in self.counts.iter() {
            row.value()
                .retain(|bucket_start, _| bucket_start.0 + bucket_width_secs > cutoff.0);
        }
        self.counts.retain(|_, row| !row.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(name: &str, secs: i64) -> WindowDef {
        WindowDef {
            name: name.into(),
            duration_secs: secs,
        }
    }

    #[test]
    fn increment_is_sparse_and_accumulates() {
        let store = InMemoryBucketStore::new();
        let v = VideoId::from("v1");
        assert_eq!(store.increment(&v, BucketStart(0), 3).unwrap(), 3);
        assert_eq!(store.increment(&v, BucketStart(0), 2).unwrap(), 5);
        assert_eq!(
            store
                .window_sum(&v, &w("5m", 300), 60, BucketStart(0))
                .unwrap(),
            5
        );
    }

    #[test]
    fn window_sum_excludes_stale_buckets() {
        let store = InMemoryBucketStore::new();
        let v = VideoId::from("v1");
        store.increment(&v, BucketStart(0), 10).unwrap();
        // A 5-minute (300s) window of 60s buckets covers the 5 most
        // recent buckets ending at now_bucket; at now_bucket=240 that's
        // {240,180,120,60,0}, still including bucket 0.
        let now_bucket = BucketStart(240);
        assert_eq!(
            store.window_sum(&v, &w("5m", 300), 60, now_bucket).unwrap(),
            10
        );
        // One bucket later, the window is {300,240,180,120,60} — 0 has
        // slid out.
        let now_bucket_past = BucketStart(300);
        assert_eq!(
            store
                .window_sum(&v, &w("5m", 300), 60, now_bucket_past)
                .unwrap(),
            0
        );
    }

    #[test]
    fn eviction_drops_rows_older_than_cutoff() {
        let store = InMemoryBucketStore::new();
        let v = VideoId::from("v1");
        store.increment(&v, BucketStart(0), 1).unwrap();
        store.increment(&v, BucketStart(600), 1).unwrap();
        store.evict_older_than(BucketStart(600), 60);
        assert_eq!(store.bucket_row_count(), 1);
    }

    #[test]
    fn all_videos_in_window_is_sparse_union() {
        let store = InMemoryBucketStore::new();
        store.increment(&VideoId::from("a"), BucketStart(0), 1).unwrap();
        store.increment(&VideoId::from("b"), BucketStart(600), 1).unwrap();
        let mut ids = store
            .all_videos_in_window(&w("5m", 300), 60, BucketStart(0))
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec![VideoId::from("a")]);
    }
}
