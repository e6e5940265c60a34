//! `POST /api/events` — wire-form event validation and submission
//! (spec §6: ingest input JSON, §4.7 `IngestPipeline::submit`).

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::EngineError;
use crate::types::{Accepted, Category, Event, VideoId};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub video_id: String,
    pub category: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub duplicate: bool,
}

impl From<Accepted> for AcceptedResponse {
    fn from(a: Accepted) -> Self {
        AcceptedResponse { duplicate: a.duplicate }
    }
}

pub async fn submit_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EventBody>,
) -> Result<Json<AcceptedResponse>, EngineError> {
    let event = Event {
        video_id: VideoId::from(body.video_id),
        category: Category::from(body.category.as_str()),
        session_id: body.session_id,
        occurred_at: body.occurred_at,
    };
    let accepted = state.ingest.submit(event)?;
    Ok(Json(accepted.into()))
}
