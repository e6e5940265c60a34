//! Diffs successive Top-K snapshots and fans deltas out to bounded
//! per-subscriber mailboxes (spec §4.8, C8).

use crate::metrics::MetricsSink;
use crate::types::{Category, Delta, MovedEntry, RankedEntry, Snapshot};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Computes the `(entered, moved, left)` difference between two
/// successive snapshots for the same `(window, category)`.
pub fn diff(
    window: &str,
    category: &Category,
    generation: u64,
    old: &Snapshot,
    new: &Snapshot,
) -> Delta {
    let entered: Vec<RankedEntry> = new
        .entries
        .iter()
        .filter(|e| old.find(&e.video_id).is_none())
        .cloned()
        .collect();

    let left: Vec<RankedEntry> = old
        .entries
        .iter()
        .filter(|e| new.find(&e.video_id).is_none())
        .cloned()
        .collect();

    let moved: Vec<MovedEntry> = new
        .entries
        .iter()
        .filter_map(|e| {
            old.find(&e.video_id).and_then(|old_entry| {
                if old_entry.rank != e.rank {
                    Some(MovedEntry {
                        video_id: e.video_id.clone(),
                        from_rank: old_entry.rank,
                        to_rank: e.rank,
                    })
                } else {
                    None
                }
            })
        })
        .collect();

    Delta {
        window: window.to_owned(),
        category: category.clone(),
        generation,
        entered,
        moved,
        left,
    }
}

/// Applies a `Delta` to a snapshot, reproducing the successor
/// snapshot. Used by both the broadcaster's own tests and external
/// consumers verifying the delta law (spec §8 P6).
pub fn apply(base: &Snapshot, delta: &Delta) -> Snapshot {
    let mut entries: Vec<RankedEntry> = base
        .entries
        .iter()
        .filter(|e| !delta.left.iter().any(|l| l.video_id == e.video_id))
        .cloned()
        .collect();

    for m in &delta.moved {
        if let Some(e) = entries.iter_mut().find(|e| e.video_id == m.video_id) {
            e.rank = m.to_rank;
        }
    }
    entries.extend(delta.entered.iter().cloned());
    entries.sort_by_key(|e| e.rank);

    Snapshot {
        generation: delta.generation,
        entries,
    }
}

struct Subscriber {
    selector: (String, Category),
    sender: mpsc::Sender<Delta>,
}

/// Fans deltas out to subscribers registered against a
/// `(window, category)` selector. A subscriber whose mailbox fills is
/// disconnected rather than silently skipped — deltas for a live
/// subscriber are never dropped (spec §4.8).
pub struct ChangeBroadcaster {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    mailbox_capacity: usize,
    metrics: Arc<dyn MetricsSink>,
}

pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Delta>,
}

impl ChangeBroadcaster {
    pub fn new(mailbox_capacity: usize, metrics: Arc<dyn MetricsSink>) -> Self {
        ChangeBroadcaster {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            mailbox_capacity,
            metrics,
        }
    }

    pub fn subscribe(&self, window: &str, category: &Category) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        self.subscribers.insert(
            id,
            Subscriber {
                selector: (window.to_owned(), category.clone()),
                sender: tx,
            },
        );
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.remove(&id);
    }

    /// Publish a delta to every subscriber whose selector matches.
    /// Subscribers whose mailbox is full are dropped (a slow
    /// consumer); subscribers that already disconnected cleanly are
    /// just removed, with no metric bump.
    pub fn publish(&self, delta: Delta) {
        let mut slow = Vec::new();
        let mut closed = Vec::new();
        let selector = (delta.window.clone(), delta.category.clone());
        for entry in self.subscribers.iter() {
            if entry.value().selector != selector {
                continue;
            }
            match entry.value().sender.try_send(delta.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => slow.push(*entry.key()),
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
        for id in slow {
            self.subscribers.remove(&id);
            self.metrics.incr_slow_consumer_disconnect();
        }
    }
}
