//! Worker pool controller.
//!
//! Keeps the live worker set sized to the queue backlog, capped at
//! `max_workers`. Workers retire themselves when the queue runs dry; the pool
//! only prunes them and tops the set back up.

use std::sync::Mutex;

use tracing::debug;

use super::worker::{Worker, WorkerContext};
use crate::processor::Processor;
use crate::telemetry::metrics;

pub struct WorkerPool {
    max_workers: usize,
    workers: Mutex<Vec<Worker>>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Prune finished workers, then spawn enough new ones to cover the
    /// backlog up to `max_workers`. Returns the number spawned.
    ///
    /// Prune and spawn happen under one lock, which is never held across an
    /// await.
    pub fn actualize<P: Processor>(&self, ctx: &WorkerContext<P>) -> usize {
        let mut workers = self.lock();
        workers.retain(|w| !w.is_finished());

        let backlog = ctx.queue.len();
        let required = backlog.min(self.max_workers);
        let to_add = required.saturating_sub(workers.len());

        for _ in 0..to_add {
            let worker = Worker::spawn(ctx.clone());
            debug!(worker = %worker.id(), "worker spawned");
            workers.push(worker);
        }
        if to_add > 0 {
            metrics::workers_spawned().add(to_add as u64, &[]);
        }

        debug!(
            running = workers.len(),
            spawned = to_add,
            backlog,
            "workers actualized"
        );
        to_add
    }

    /// Number of workers that have not finished yet.
    pub fn running_count(&self) -> usize {
        self.lock().iter().filter(|w| !w.is_finished()).count()
    }

    /// Empty the set, handing back the workers still running so the caller
    /// can wait for them without holding the lock.
    pub fn drain(&self) -> Vec<Worker> {
        let mut workers = std::mem::take(&mut *self.lock());
        workers.retain(|w| !w.is_finished());
        workers
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Worker>> {
        // Poisoning is ignored: no code path leaves the Vec half-updated.
        self.workers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_workers", &self.max_workers)
            .field("running", &self.running_count())
            .finish()
    }
}
