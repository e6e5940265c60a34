use std::sync::Arc;
use youtube_top_k::broadcaster::ChangeBroadcaster;
use youtube_top_k::clock::SystemClock;
use youtube_top_k::config::EngineConfig;
use youtube_top_k::engine::TrendingEngine;
use youtube_top_k::ingest::IngestPipeline;
use youtube_top_k::metrics::CountingMetricsSink;
use youtube_top_k::read_api::ReadApi;
use youtube_top_k::registry::EngineContext;
use youtube_top_k::snapshot_store::InMemorySnapshotStore;
use youtube_top_k::window::SumScorer;
use youtube_top_k::AppState;

const INGEST_WORKER_COUNT: usize = 8;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("YOUTUBE_TOP_K_CONFIG") {
        Ok(path) => EngineConfig::from_file(std::path::Path::new(&path)).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load config file, using defaults");
            EngineConfig::default()
        }),
        Err(_) => EngineConfig::default(),
    };

    let ctx = Arc::new(
        EngineContext::new(
            config,
            Arc::new(SystemClock::new()),
            Arc::new(SumScorer),
            Arc::new(CountingMetricsSink::default()),
            Arc::new(InMemorySnapshotStore::new(100)),
        )
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }),
    );

    let broadcaster = Arc::new(ChangeBroadcaster::new(
        ctx.config.subscriber_mailbox_capacity,
        ctx.metrics.clone(),
    ));
    let engine = Arc::new(TrendingEngine::new(ctx.clone(), broadcaster));
    let ingest = IngestPipeline::spawn(ctx.clone(), INGEST_WORKER_COUNT);
    let read_api = ReadApi::new(engine.clone());

    let refresh_interval =
        std::time::Duration::from_secs_f64(ctx.config.refresh_interval_seconds);
    let refresh_engine = engine.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        loop {
            ticker.tick().await;
            refresh_engine.refresh_once();
        }
    });

    let state = Arc::new(AppState {
        ctx,
        engine,
        ingest,
        read_api,
    });

    let app = youtube_top_k::server::create_router(state);

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to port 3000 — is it already in use?");

    tracing::info!(%addr, "youtube-top-k listening");
    axum::serve(listener, app)
        .await
        .expect("server exited with error");
}
