use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::AppState;

/// Builds the full Axum `Router`: ingest, cached Top-K reads, and the
/// SSE delta stream (spec §6 external interfaces).
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/events", post(handlers::ingest::submit_event))
        .route("/api/topk/:window/:category", get(handlers::query::get_topk))
        .route(
            "/api/topk/:window/:category/snapshot",
            get(handlers::query::get_topk),
        )
        .route(
            "/api/topk/:window/:category/stream",
            get(handlers::stream::topk_stream),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
}
