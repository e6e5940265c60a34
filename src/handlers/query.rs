//! `GET /api/topk/:window/:category[/snapshot]` — cached Top-K reads
//! (spec §4.10, §6).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{RankedEntryWire, TopKResponse};
use crate::types::Category;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TopKQuery {
    #[serde(default = "default_k_prime")]
    pub k: usize,
}

fn default_k_prime() -> usize {
    100
}

pub async fn get_topk(
    State(state): State<Arc<AppState>>,
    Path((window, category)): Path<(String, String)>,
    Query(params): Query<TopKQuery>,
) -> Json<TopKResponse> {
    let category = Category::from(category.as_str());
    let snapshot = state.read_api.get_topk(&window, &category, params.k);
    Json(TopKResponse {
        generation: snapshot.generation,
        entries: snapshot.entries.iter().map(RankedEntryWire::from).collect(),
    })
}
