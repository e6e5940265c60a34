//! Event validation → idempotency → bucket increment → refresh signal
//! (spec §4.7, C7). Generalizes the teacher's fixed worker-pool
//! pattern (`load_generator::run`/`worker`) from a Redis load
//! generator to a bounded ingest queue with retryable storage writes.

use crate::clock::bucket_of;
use crate::error::EngineError;
use crate::idempotency::Freshness;
use crate::registry::EngineContext;
use crate::types::{Accepted, Category, Event};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Small bounded exponential backoff budget for transient storage
/// failures (spec §4.7 "retried with exponential backoff up to a
/// small cap; on exhaustion the event is dropped").
const MAX_STORAGE_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 10;

pub struct IngestPipeline {
    ctx: Arc<EngineContext>,
    sender: mpsc::Sender<Event>,
    // Kept alive so the channel's receiving end stays open even when
    // `worker_count` is 0 and no worker task holds a clone of it —
    // otherwise `submit` would see the channel as closed immediately.
    _rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Event>>>,
}

impl IngestPipeline {
    /// Spawns `worker_count` tokio tasks draining the bounded ingest
    /// queue, returning a handle producers call `submit` on. `0` is a
    /// valid count: the queue fills and every `submit` past its
    /// capacity observes backpressure, but nothing drains it.
    pub fn spawn(ctx: Arc<EngineContext>, worker_count: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(ctx.config.ingest_queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for _ in 0..worker_count {
            let ctx = ctx.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let event = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match event {
                        Some(event) => {
                            if let Err(e) = process_event(&ctx, event).await {
                                tracing::warn!(error = %e, "dropped event after exhausting retries");
                            }
                        }
                        None => break,
                    }
                }
            });
        }

        Arc::new(IngestPipeline {
            ctx,
            sender: tx,
            _rx: rx,
        })
    }

    /// Validates and enqueues an event. Non-blocking: a full queue
    /// yields `Overloaded` immediately rather than waiting (spec §4.7
    /// backpressure, §5 "never block an ingest caller indefinitely").
    pub fn submit(&self, event: Event) -> Result<Accepted, EngineError> {
        validate(&self.ctx, &event)?;
        match self.sender.try_send(event) {
            Ok(()) => Ok(Accepted { duplicate: false }),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.ctx.metrics.incr_overloaded();
                Err(EngineError::Overloaded)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.ctx.metrics.incr_overloaded();
                Err(EngineError::Overloaded)
            }
        }
    }
}

fn validate(ctx: &EngineContext, event: &Event) -> Result<(), EngineError> {
    if event.video_id.0.trim().is_empty() {
        return Err(EngineError::InvalidEvent("missing video_id".into()));
    }
    let known = ctx.config.all_categories();
    if !known.contains(&event.category) {
        return Err(EngineError::InvalidEvent(format!(
            "unknown category '{}'",
            event.category
        )));
    }

    let now = ctx.clock.now();
    let skew = chrono::Duration::seconds(ctx.config.effective_max_event_skew_seconds());
    let small_future = chrono::Duration::seconds(ctx.config.small_future_seconds);
    if event.occurred_at < now - skew {
        return Err(EngineError::InvalidEvent(
            "occurred_at is older than max_event_skew_seconds".into(),
        ));
    }
    if event.occurred_at > now + small_future {
        return Err(EngineError::InvalidEvent(
            "occurred_at is too far in the future".into(),
        ));
    }
    Ok(())
}

/// The asynchronous half of `Submit`: idempotency check, then
/// increment both the category-specific and the `ALL` aggregate
/// bucket store, retrying storage failures with backoff.
async fn process_event(ctx: &Arc<EngineContext>, event: Event) -> Result<(), EngineError> {
    let bucket_start = bucket_of(event.occurred_at, ctx.config.bucket_width_seconds);

    let freshness = ctx.idempotency.check(
        &event.video_id,
        event.session_id.as_deref(),
        bucket_start,
    );
    if freshness == Freshness::Duplicate {
        ctx.metrics.incr_duplicate();
        return Ok(());
    }

    let all = Category::all();
    increment_with_retry(ctx, &event.category, &event.video_id, bucket_start).await?;
    if event.category != all {
        increment_with_retry(ctx, &all, &event.video_id, bucket_start).await?;
    }
    Ok(())
}

async fn increment_with_retry(
    ctx: &Arc<EngineContext>,
    category: &Category,
    video_id: &crate::types::VideoId,
    bucket_start: crate::types::BucketStart,
) -> Result<(), EngineError> {
    let Some(store) = ctx.stores.get(category) else {
        return Err(EngineError::UnknownSelector(category.to_string(), String::new()));
    };

    let mut attempt = 0;
    loop {
        match store.increment(video_id, bucket_start, 1) {
            Ok(_) => return Ok(()),
            Err(e) if attempt < MAX_STORAGE_RETRIES => {
                attempt += 1;
                tracing::debug!(attempt, error = %e, "retrying bucket increment");
                tokio::time::sleep(Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt))).await;
            }
            Err(e) => {
                ctx.metrics.incr_storage_drop();
                return Err(EngineError::StorageUnavailable(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::config::EngineConfig;
    use crate::metrics::{CountingMetricsSink, NoopMetricsSink};
    use crate::snapshot_store::InMemorySnapshotStore;
    use crate::types::VideoId;
    use crate::window::SumScorer;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::Ordering;

    fn ctx_with(clock: Arc<TestClock>, metrics: Arc<dyn crate::metrics::MetricsSink>) -> Arc<EngineContext> {
        ctx_with_capacity(clock, metrics, 16)
    }

    fn ctx_with_capacity(
        clock: Arc<TestClock>,
        metrics: Arc<dyn crate::metrics::MetricsSink>,
        ingest_queue_capacity: usize,
    ) -> Arc<EngineContext> {
        let config = EngineConfig {
            windows: vec![crate::types::WindowDef {
                name: "5m".into(),
                duration_secs: 300,
            }],
            bucket_width_seconds: 60,
            k: 3,
            ingest_queue_capacity,
            ..EngineConfig::default()
        };
        Arc::new(
            EngineContext::new(
                config,
                clock,
                Arc::new(SumScorer),
                metrics,
                Arc::new(InMemorySnapshotStore::new(10)),
            )
            .unwrap(),
        )
    }

    fn event(video: &str, session: Option<&str>, t: i64) -> Event {
        Event {
            video_id: VideoId::from(video),
            category: Category::all(),
            session_id: session.map(|s| s.to_owned()),
            occurred_at: Utc.timestamp_opt(t, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn s4_idempotency_counts_once() {
        let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let metrics = Arc::new(CountingMetricsSink::default());
        let ctx = ctx_with(clock.clone(), metrics.clone());
        let pipeline = IngestPipeline::spawn(ctx.clone(), 2);

        for _ in 0..3 {
            pipeline.submit(event("v1", Some("s"), 0)).unwrap();
        }
        // Give the worker tasks a moment to drain the channel.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let store = ctx.stores.get(&Category::all()).unwrap();
        let sum = store
            .window_sum(
                &VideoId::from("v1"),
                &crate::types::WindowDef {
                    name: "5m".into(),
                    duration_secs: 300,
                },
                60,
                crate::types::BucketStart(0),
            )
            .unwrap();
        assert_eq!(sum, 1);
        assert_eq!(metrics.duplicates.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn s6_overload_on_full_queue() {
        let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let ctx = ctx_with_capacity(clock, Arc::new(NoopMetricsSink), 2);
        // Zero workers: nothing drains the channel, so it saturates
        // at its configured capacity of 2.
        let pipeline = IngestPipeline::spawn(ctx, 0);

        let r1 = pipeline.submit(event("v1", None, 0));
        let r2 = pipeline.submit(event("v2", None, 0));
        let r3 = pipeline.submit(event("v3", None, 0));
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert!(matches!(r3, Err(EngineError::Overloaded)));
    }

    #[tokio::test]
    async fn invalid_event_rejected_for_unknown_category() {
        let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let ctx = ctx_with(clock, Arc::new(NoopMetricsSink));
        let pipeline = IngestPipeline::spawn(ctx, 1);
        let mut bad = event("v1", None, 0);
        bad.category = Category::from("nonexistent");
        assert!(matches!(
            pipeline.submit(bad),
            Err(EngineError::InvalidEvent(_))
        ));
    }

    #[tokio::test]
    async fn skewed_timestamp_rejected() {
        let clock = Arc::new(TestClock::new(Utc.timestamp_opt(10_000, 0).unwrap()));
        let ctx = ctx_with(clock, Arc::new(NoopMetricsSink));
        let pipeline = IngestPipeline::spawn(ctx, 1);
        // Far older than the 300s window_max used as default skew.
        let stale = event("v1", None, 0);
        assert!(matches!(
            pipeline.submit(stale),
            Err(EngineError::InvalidEvent(_))
        ));
    }
}
