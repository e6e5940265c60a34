//! Dedup of view events by `(video, session, bucket)` (spec §4.3, C3).

use crate::types::{BucketStart, VideoId};
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Duplicate,
}

/// Safe for concurrent callers: backed by a sharded `DashMap`, the
/// same concurrent-map choice used for `BucketStore`.
pub struct IdempotencyGuard {
    seen: DashMap<(VideoId, String, BucketStart), Instant>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(ttl: Duration) -> Self {
        IdempotencyGuard {
            seen: DashMap::new(),
            ttl,
        }
    }

    /// Checks and records `(video, session, bucket)` in one step. When
    /// `session_id` is absent the guard is bypassed entirely — the
    /// event is always fresh (spec §4.3).
    pub fn check(
        &self,
        video: &VideoId,
        session_id: Option<&str>,
        bucket_start: BucketStart,
    ) -> Freshness {
        let Some(session_id) = session_id else {
            return Freshness::Fresh;
        };
        let key = (video.clone(), session_id.to_owned(), bucket_start);
        let now = Instant::now();
        match self.seen.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut e) => {
                if now.duration_since(*e.get()) > self.ttl {
                    // Entry aged out; treat as fresh and re-arm it.
                    e.insert(now);
                    Freshness::Fresh
                } else {
                    Freshness::Duplicate
                }
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(now);
                Freshness::Fresh
            }
        }
    }

    /// Periodic sweep dropping entries past their TTL. Invoked from
    /// the same refresh tick that evicts expired buckets.
    pub fn sweep(&self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) <= ttl);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_submission_is_fresh_repeats_are_duplicate() {
        let guard = IdempotencyGuard::new(Duration::from_secs(3600));
        let v = VideoId::from("v1");
        assert_eq!(guard.check(&v, Some("s1"), BucketStart(0)), Freshness::Fresh);
        assert_eq!(
            guard.check(&v, Some("s1"), BucketStart(0)),
            Freshness::Duplicate
        );
        assert_eq!(
            guard.check(&v, Some("s1"), BucketStart(0)),
            Freshness::Duplicate
        );
    }

    #[test]
    fn missing_session_bypasses_the_guard() {
        let guard = IdempotencyGuard::new(Duration::from_secs(3600));
        let v = VideoId::from("v1");
        assert_eq!(guard.check(&v, None, BucketStart(0)), Freshness::Fresh);
        assert_eq!(guard.check(&v, None, BucketStart(0)), Freshness::Fresh);
    }

    #[test]
    fn different_buckets_or_sessions_are_independent() {
        let guard = IdempotencyGuard::new(Duration::from_secs(3600));
        let v = VideoId::from("v1");
        assert_eq!(guard.check(&v, Some("s1"), BucketStart(0)), Freshness::Fresh);
        assert_eq!(guard.check(&v, Some("s2"), BucketStart(0)), Freshness::Fresh);
        assert_eq!(guard.check(&v, Some("s1"), BucketStart(60)), Freshness::Fresh);
    }

    #[test]
    fn sweep_drops_entries_past_ttl() {
        let guard = IdempotencyGuard::new(Duration::from_millis(1));
        let v = VideoId::from("v1");
        guard.check(&v, Some("s1"), BucketStart(0));
        std::thread::sleep(Duration::from_millis(5));
        guard.sweep();
        assert_eq!(guard.len(), 0);
    }
}
