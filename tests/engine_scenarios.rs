//! End-to-end reproductions of the literal scenarios (S1-S6), driven
//! through the public `IngestPipeline` -> `TrendingEngine` ->
//! `ReadApi` path rather than poking internal bucket stores directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use youtube_top_k::broadcaster::ChangeBroadcaster;
use youtube_top_k::clock::TestClock;
use youtube_top_k::config::EngineConfig;
use youtube_top_k::engine::TrendingEngine;
use youtube_top_k::ingest::IngestPipeline;
use youtube_top_k::metrics::{CountingMetricsSink, NoopMetricsSink};
use youtube_top_k::read_api::ReadApi;
use youtube_top_k::registry::EngineContext;
use youtube_top_k::snapshot_store::InMemorySnapshotStore;
use youtube_top_k::types::{Category, Event, VideoId, WindowDef};
use youtube_top_k::window::SumScorer;

fn config() -> EngineConfig {
    EngineConfig {
        windows: vec![WindowDef {
            name: "5m".into(),
            duration_secs: 300,
        }],
        bucket_width_seconds: 60,
        k: 3,
        ingest_queue_capacity: 64,
        ..EngineConfig::default()
    }
}

async fn harness(
    clock: Arc<TestClock>,
    metrics: Arc<dyn youtube_top_k::metrics::MetricsSink>,
) -> (Arc<TrendingEngine>, Arc<IngestPipeline>, ReadApi) {
    let ctx = Arc::new(
        EngineContext::new(
            config(),
            clock,
            Arc::new(SumScorer),
            metrics,
            Arc::new(InMemorySnapshotStore::new(10)),
        )
        .unwrap(),
    );
    let broadcaster = Arc::new(ChangeBroadcaster::new(64, Arc::new(NoopMetricsSink)));
    let engine = Arc::new(TrendingEngine::new(ctx.clone(), broadcaster));
    let ingest = IngestPipeline::spawn(ctx, 4);
    let read_api = ReadApi::new(engine.clone());
    (engine, ingest, read_api)
}

fn view(video: &str, at: i64) -> Event {
    Event {
        video_id: VideoId::from(video),
        category: Category::all(),
        session_id: None,
        occurred_at: Utc.timestamp_opt(at, 0).unwrap(),
    }
}

#[tokio::test]
async fn s1_simple_top3() {
    let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
    let (engine, ingest, read_api) = harness(clock.clone(), Arc::new(NoopMetricsSink)).await;

    for _ in 0..5 {
        ingest.submit(view("v1", 0)).unwrap();
    }
    for _ in 0..3 {
        ingest.submit(view("v2", 0)).unwrap();
    }
    for _ in 0..4 {
        ingest.submit(view("v3", 0)).unwrap();
    }
    for _ in 0..1 {
        ingest.submit(view("v4", 0)).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    clock.advance(1);
    engine.refresh_once();

    let snap = read_api.get_topk("5m", &Category::all(), 10);
    let ids: Vec<_> = snap.entries.iter().map(|e| e.video_id.0.clone()).collect();
    assert_eq!(ids, vec!["v1", "v3", "v2"]);
}

#[tokio::test]
async fn s4_duplicate_submission_counts_once() {
    let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
    let metrics = Arc::new(CountingMetricsSink::default());
    let (engine, ingest, read_api) = harness(clock.clone(), metrics.clone()).await;

    let mut event = view("v1", 0);
    event.session_id = Some("session-a".into());
    for _ in 0..3 {
        ingest.submit(event.clone()).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    clock.advance(1);
    engine.refresh_once();

    let snap = read_api.get_topk("5m", &Category::all(), 10);
    assert_eq!(snap.entries.len(), 1);
    assert_eq!(snap.entries[0].score, 1);
    assert_eq!(
        metrics
            .duplicates
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[tokio::test]
async fn s6_overloaded_queue_rejects_excess_submissions() {
    let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
    let ctx = Arc::new(
        EngineContext::new(
            EngineConfig {
                ingest_queue_capacity: 1,
                ..config()
            },
            clock,
            Arc::new(SumScorer),
            Arc::new(NoopMetricsSink),
            Arc::new(InMemorySnapshotStore::new(10)),
        )
        .unwrap(),
    );
    // Zero workers: the queue saturates immediately at its capacity.
    let ingest = IngestPipeline::spawn(ctx, 0);

    assert!(ingest.submit(view("v1", 0)).is_ok());
    let err = ingest.submit(view("v2", 0));
    assert!(matches!(
        err,
        Err(youtube_top_k::error::EngineError::Overloaded)
    ));
}

#[tokio::test]
async fn unknown_category_is_rejected_before_reaching_the_queue() {
    let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
    let (_engine, ingest, _read_api) = harness(clock, Arc::new(NoopMetricsSink)).await;

    let mut bad = view("v1", 0);
    bad.category = Category::from("sports");
    assert!(matches!(
        ingest.submit(bad),
        Err(youtube_top_k::error::EngineError::InvalidEvent(_))
    ));
}

#[tokio::test]
async fn subscriber_sees_deltas_as_the_engine_ticks() {
    let clock = Arc::new(TestClock::new(Utc.timestamp_opt(0, 0).unwrap()));
    let (engine, ingest, _read_api) = harness(clock.clone(), Arc::new(NoopMetricsSink)).await;
    let mut sub = engine.subscribe("5m", &Category::all());

    ingest.submit(view("v1", 0)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    clock.advance(1);
    engine.refresh_once();

    let delta = sub.receiver.try_recv().unwrap();
    assert_eq!(delta.entered.len(), 1);
    assert_eq!(delta.entered[0].video_id, VideoId::from("v1"));
}
