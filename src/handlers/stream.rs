//! `GET /api/topk/:window/:category/stream` — server-sent delta feed
//! (spec §4.8, §6 push interface). Generalizes the teacher's
//! `metrics/stream.rs` fixed-interval snapshot poll into a genuine
//! subscriber: on connect we first resync the client with the full
//! current snapshot, then forward each `Delta` the broadcaster
//! publishes, in generation order.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::types::{Category, Delta, Snapshot};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamFrame {
    Resync { snapshot: Snapshot },
    Delta(Delta),
}

pub async fn topk_stream(
    State(state): State<Arc<AppState>>,
    Path((window, category)): Path<(String, String)>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let category = Category::from(category.as_str());
    let subscription = state.engine.subscribe(&window, &category);
    let resync = state.read_api.get_topk(&window, &category, usize::MAX);

    let resync_frame = StreamFrame::Resync { snapshot: resync };
    let resync_event = Ok(Event::default().data(
        serde_json::to_string(&resync_frame).unwrap_or_default(),
    ));

    let delta_stream = ReceiverStream::new(subscription.receiver).map(|delta| {
        let frame = StreamFrame::Delta(delta);
        Ok(Event::default().data(serde_json::to_string(&frame).unwrap_or_default()))
    });

    let stream = tokio_stream::once(resync_event).chain(delta_stream);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
