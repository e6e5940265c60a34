//! Core value types shared across every component (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable video identifier. Total order gives deterministic
/// tie-breaking: smaller `VideoId` wins when scores are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VideoId(pub String);

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        VideoId(s.to_owned())
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        VideoId(s)
    }
}

/// Small enumerated tag. The distinguished `ALL` category aggregates
/// every video and is always implicitly present (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Category(pub String);

impl Category {
    pub const ALL_NAME: &'static str = "ALL";

    pub fn all() -> Self {
        Category(Self::ALL_NAME.to_owned())
    }

    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL_NAME
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category(s.to_owned())
    }
}

/// Tumbling bucket start, in whole seconds since the Unix epoch.
/// The interval it names is `[start, start + bucket_width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketStart(pub i64);

/// A named sliding window: `bucket_count` contiguous buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDef {
    pub name: String,
    pub duration_secs: i64,
}

impl WindowDef {
    /// Number of sub-buckets this window spans, given a bucket width.
    pub fn bucket_count(&self, bucket_width_secs: i64) -> i64 {
        // Ceil-divide so a window that isn't an exact multiple of the
        // bucket width still covers its full duration.
        (self.duration_secs + bucket_width_secs - 1) / bucket_width_secs
    }
}

/// Raw view-count score. A fixed 64-bit unsigned integer avoids the
/// silent precision loss floating point scores would eventually hit
/// at high counts (spec §9).
pub type Score = u64;

/// One ranked slot in a committed snapshot. `rank` is 1-based, dense,
/// and unique within the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub video_id: VideoId,
    pub score: Score,
    pub rank: u32,
}

/// An immutable, ranked view of at most K videos for one
/// `(window, category)` pair, tagged with a monotone generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generation: u64,
    pub entries: Vec<RankedEntry>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot {
            generation: 0,
            entries: Vec::new(),
        }
    }

    pub fn find(&self, video: &VideoId) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| &e.video_id == video)
    }
}

/// One entry moving between two snapshots, old rank to new rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedEntry {
    pub video_id: VideoId,
    pub from_rank: u32,
    pub to_rank: u32,
}

/// The difference between two successive snapshots for the same
/// `(window, category)` (spec §4.8, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub window: String,
    pub category: Category,
    pub generation: u64,
    pub entered: Vec<RankedEntry>,
    pub moved: Vec<MovedEntry>,
    pub left: Vec<RankedEntry>,
}

/// A raw view event as accepted from producers (spec §3, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub video_id: VideoId,
    pub category: Category,
    pub session_id: Option<String>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of a successful `IngestPipeline::submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Accepted {
    pub duplicate: bool,
}
