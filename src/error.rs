//! Unified error taxonomy (spec §7), generalizing the teacher's
//! `AppError` (`handlers/mod.rs`) from a single Redis-failure variant
//! to the full validation / backpressure / storage / consistency /
//! subscriber taxonomy spec.md §7 enumerates.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad category, skewed timestamp, missing video id. Not retried
    /// internally — surfaced straight back to the caller.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Ingest queue full. Retryable by the caller.
    #[error("ingest queue overloaded")]
    Overloaded,

    /// Transient storage failure. Retried within a small budget by the
    /// pipeline; surfaced only once that budget is exhausted.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An invariant (e.g. I4, the heap index bijection) was found
    /// broken during refresh. That `(window, category)` pair is
    /// paused; the prior snapshot remains valid.
    #[error("snapshot build failed for {window}/{category}: {reason}")]
    SnapshotBuildFailed {
        window: String,
        category: String,
        reason: String,
    },

    /// A subscriber's mailbox overflowed and it was disconnected.
    #[error("slow consumer disconnected")]
    SlowConsumer,

    /// Requested `(window, category)` was never configured.
    #[error("unknown window/category: {0}/{1}")]
    UnknownSelector(String, String),
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidEvent(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Overloaded => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::StorageUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            Self::SnapshotBuildFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Self::SlowConsumer => (StatusCode::GONE, self.to_string()),
            Self::UnknownSelector(..) => (StatusCode::NOT_FOUND, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
