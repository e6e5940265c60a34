//! Top-K Trending Video Engine: windowed counting, bounded Top-K
//! maintenance, idempotent ingest, and a change-push layer for
//! subscribers (spec §1).

pub mod broadcaster;
pub mod bucket_store;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod ingest;
pub mod metrics;
pub mod read_api;
pub mod registry;
pub mod server;
pub mod snapshot_store;
pub mod topk;
pub mod types;
pub mod window;

use std::sync::Arc;

/// Shared application state available to every HTTP handler via
/// `State<Arc<AppState>>` — the same shape as the teacher's
/// `AppState` (`src/main.rs`), generalized from a single Redis
/// connection + metrics collector to the full engine context.
pub struct AppState {
    pub ctx: Arc<registry::EngineContext>,
    pub engine: Arc<engine::TrendingEngine>,
    pub ingest: Arc<ingest::IngestPipeline>,
    pub read_api: read_api::ReadApi,
}
