//! Pure scoring function over windowed bucket counts (spec §4.4, C4).
//!
//! Not a goroutine-owning component: invoked directly on the hot path
//! by the engine, O(N) in the number of sub-buckets per call.

use crate::bucket_store::BucketStore;
use crate::error::EngineError;
use crate::types::{BucketStart, Score, VideoId, WindowDef};

/// A monotone function of per-bucket counts. The default (`sum`) adds
/// every bucket equally; callers may plug in a different monotone
/// function (e.g. a decayed weighting) without changing the heap or
/// engine logic. Whether decay should be the *default* is an open
/// question the source left unresolved (spec §9) — left pluggable.
pub trait Scorer: Send + Sync {
    fn score(&self, per_bucket_counts: &[u64]) -> Score;
}

/// Identity sum — the spec's default scorer.
pub struct SumScorer;

impl Scorer for SumScorer {
    fn score(&self, per_bucket_counts: &[u64]) -> Score {
        per_bucket_counts.iter().sum()
    }
}

/// Computes the score for a single video within a window, by summing
/// its `bucket_count` most recent per-bucket counts through `scorer`.
pub fn score_of(
    store: &dyn BucketStore,
    video: &VideoId,
    window: &WindowDef,
    bucket_width_secs: i64,
    now_bucket: BucketStart,
    scorer: &dyn Scorer,
) -> Result<Score, EngineError> {
    let n = window.bucket_count(bucket_width_secs);
    let mut counts = Vec::with_capacity(n as usize);
    for i in 0..n {
        let bucket = BucketStart(now_bucket.0 - i * bucket_width_secs);
        // A single-bucket slice keeps this O(N) regardless of scorer;
        // the store already answers window_sum in O(N) too, but we
        // need per-bucket granularity for non-identity scorers.
        let count = store.window_sum(
            video,
            &WindowDef {
                name: window.name.clone(),
                duration_secs: bucket_width_secs,
            },
            bucket_width_secs,
            bucket,
        )?;
        counts.push(count);
    }
    Ok(scorer.score(&counts))
}
