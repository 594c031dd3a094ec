//! Shared work queue.
//!
//! An unordered multi-producer/multi-consumer bag of [`WorkItem`]s. Backed by
//! an unbounded crossbeam channel: the queue owns both ends, so sends never
//! fail and every item is delivered to exactly one `try_take` caller.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::model::WorkItem;

pub struct WorkQueue {
    tx: Sender<WorkItem>,
    rx: Receiver<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Add an item. Visible to consumers immediately.
    pub fn add(&self, item: WorkItem) {
        // The receiver lives as long as `self`, so the channel cannot be
        // disconnected here.
        let _ = self.tx.send(item);
    }

    /// Claim one item if any is available. Never blocks.
    pub fn try_take(&self) -> Option<WorkItem> {
        self.rx.try_recv().ok()
    }

    /// Number of unclaimed items. May already be stale when it returns.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue").field("len", &self.len()).finish()
    }
}
