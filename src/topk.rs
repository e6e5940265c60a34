//! Bounded min-heap + position index, O(log K) updates (spec §4.5, C5).
//!
//! Single-writer: the refresh runner is the only mutator. Concurrent
//! readers use `snapshot()`, which allocates an immutable sorted copy.

use crate::types::{RankedEntry, Score, VideoId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapEntry {
    score: Score,
    video_id: VideoId,
}

impl HeapEntry {
    /// `true` if `self` is the weaker entry under the heap's ordering
    /// (lower score wins weakest, ties broken by *larger* VideoId
    /// being weaker so that the *smaller* VideoId survives — spec §3
    /// "Score equality is broken by smaller VideoId wins").
    fn weaker_than(&self, other: &HeapEntry) -> bool {
        (self.score, &other.video_id) < (other.score, &self.video_id)
    }
}

/// A bounded priority queue of size <= K, min-heap keyed by
/// `(score, -video_id)` so the weakest entry sits at the root.
pub struct TopKHeap {
    k: usize,
    heap: Vec<HeapEntry>,
    index: HashMap<VideoId, usize>,
}

impl TopKHeap {
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "K must be positive");
        TopKHeap {
            k,
            heap: Vec::with_capacity(k),
            index: HashMap::with_capacity(k),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, video: &VideoId) -> bool {
        self.index.contains_key(video)
    }

    /// Video ids currently held, independent of rank order. Used by
    /// the engine's refresh scan to re-score entries whose buckets may
    /// have expired (spec §4.6 step 2).
    pub fn video_ids(&self) -> Vec<VideoId> {
        self.heap.iter().map(|e| e.video_id.clone()).collect()
    }

    fn root_is_weaker_than(&self, candidate_score: Score, candidate_video: &VideoId) -> bool {
        match self.heap.first() {
            None => true,
            Some(root) => {
                let candidate = HeapEntry {
                    score: candidate_score,
                    video_id: candidate_video.clone(),
                };
                root.weaker_than(&candidate)
            }
        }
    }

    /// Offer a video not currently tracked in the heap. If the heap
    /// has room, it's inserted outright; otherwise it replaces the
    /// current weakest entry only if it's strictly stronger, per the
    /// min-heap replacement rule in spec §4.5.
    pub fn offer(&mut self, video: VideoId, score: Score) {
        debug_assert!(!self.index.contains_key(&video));
        if self.heap.len() < self.k {
            self.push(HeapEntry {
                score,
                video_id: video,
            });
        } else if self.root_is_weaker_than(score, &video) {
            self.replace_root(HeapEntry {
                score,
                video_id: video,
            });
        }
        // else: dropped, candidate is not strong enough.
    }

    /// Update the score of a video already present in the heap,
    /// sifting it up or down as needed.
    pub fn update(&mut self, video: &VideoId, new_score: Score) {
        let Some(&i) = self.index.get(video) else {
            return;
        };
        let old_score = self.heap[i].score;
        self.heap[i].score = new_score;
        // Root holds the weakest entry: a score drop makes this entry
        // weaker, so it belongs closer to the root (sift up); a rise
        // makes it stronger, so it belongs further from the root
        // (sift down).
        if new_score < old_score {
            self.sift_up(i);
        } else if new_score > old_score {
            self.sift_down(i);
        }
    }

    /// Remove a video from the heap entirely (used on eviction).
    pub fn remove(&mut self, video: &VideoId) {
        let Some(&i) = self.index.get(video) else {
            return;
        };
        self.index.remove(video);
        let last = self.heap.len() - 1;
        if i != last {
            self.heap.swap(i, last);
            self.index.insert(self.heap[i].video_id.clone(), i);
        }
        self.heap.pop();
        if i < self.heap.len() {
            let moved = self.heap[i].video_id.clone();
            self.sift_down(i);
            // sift_down only relocates `moved` if some child is weaker
            // than it; if it stayed put, it may still need to rise.
            if self.index.get(&moved) == Some(&i) {
                self.sift_up(i);
            }
        }
    }

    /// Produces a list sorted descending by score, ties ascending by
    /// VideoId. O(K log K), allocates.
    pub fn snapshot_entries(&self) -> Vec<RankedEntry> {
        let mut entries: Vec<&HeapEntry> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.video_id.cmp(&b.video_id)));
        entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| RankedEntry {
                video_id: e.video_id.clone(),
                score: e.score,
                rank: (i + 1) as u32,
            })
            .collect()
    }

    // ── internal heap mechanics ──────────────────────────────────

    fn push(&mut self, entry: HeapEntry) {
        self.heap.push(entry);
        let i = self.heap.len() - 1;
        self.index.insert(self.heap[i].video_id.clone(), i);
        self.sift_up(i);
    }

    fn replace_root(&mut self, entry: HeapEntry) {
        self.index.remove(&self.heap[0].video_id);
        self.heap[0] = entry;
        self.index.insert(self.heap[0].video_id.clone(), 0);
        self.sift_down(0);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].weaker_than(&self.heap[parent]) {
                self.swap_entries(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut weakest = i;
            if left < len && self.heap[left].weaker_than(&self.heap[weakest]) {
                weakest = left;
            }
            if right < len && self.heap[right].weaker_than(&self.heap[weakest]) {
                weakest = right;
            }
            if weakest == i {
                break;
            }
            self.swap_entries(i, weakest);
            i = weakest;
        }
    }

    fn swap_entries(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].video_id.clone(), a);
        self.index.insert(self.heap[b].video_id.clone(), b);
    }

    /// Debug-only invariant check: I3 (within what this heap knows,
    /// the root is never weaker than anything it holds) and I4 (index
    /// is a bijection onto heap slots).
    #[cfg(test)]
    fn check_invariants(&self) {
        assert!(self.heap.len() <= self.k);
        assert_eq!(self.heap.len(), self.index.len());
        for (video, &i) in &self.index {
            assert_eq!(&self.heap[i].video_id, video);
        }
        for i in 0..self.heap.len() {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            if left < self.heap.len() {
                assert!(!self.heap[left].weaker_than(&self.heap[i]));
            }
            if right < self.heap.len() {
                assert!(!self.heap[right].weaker_than(&self.heap[i]));
            }
        }
    }
}
