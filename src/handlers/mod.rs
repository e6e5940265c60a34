pub mod ingest;
pub mod query;
pub mod stream;

use crate::types::RankedEntry;
use serde::Serialize;

/// Query-path wire form for one ranked entry (spec §6: `get_topk`
/// response shape `{video_id, score, rank, generation}`).
#[derive(Debug, Serialize)]
pub struct TopKResponse {
    pub generation: u64,
    pub entries: Vec<RankedEntryWire>,
}

#[derive(Debug, Serialize)]
pub struct RankedEntryWire {
    pub video_id: String,
    pub score: u64,
    pub rank: u32,
}

impl From<&RankedEntry> for RankedEntryWire {
    fn from(e: &RankedEntry) -> Self {
        RankedEntryWire {
            video_id: e.video_id.0.clone(),
            score: e.score,
            rank: e.rank,
        }
    }
}
