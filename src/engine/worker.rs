//! Workers: cancellable tasks that drain the shared queue.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use crate::model::{ItemOutcome, WorkItem, WorkerId, WorkerState};
use crate::processor::Processor;
use crate::queue::WorkQueue;
use crate::telemetry::metrics;
use crate::telemetry::worker::{item_span, record_outcome, worker_span};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Owning side of a level-triggered cancellation signal.
#[derive(Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Every [`CancelFlag`] observes it from now on.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// A read-only view to hand to workers.
    pub fn flag(&self) -> CancelFlag {
        CancelFlag(Arc::clone(&self.flag))
    }
}

/// Read-only view of a [`Cancellation`].
#[derive(Debug, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Worker context
// ---------------------------------------------------------------------------

/// Everything a worker needs for one service run.
pub struct WorkerContext<P> {
    pub queue: Arc<WorkQueue>,
    pub processor: Arc<P>,
    pub cancel: CancelFlag,
}

impl<P> WorkerContext<P> {
    pub fn new(queue: Arc<WorkQueue>, processor: Arc<P>, cancel: CancelFlag) -> Self {
        Self {
            queue,
            processor,
            cancel,
        }
    }
}

impl<P> Clone for WorkerContext<P> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            processor: Arc::clone(&self.processor),
            cancel: self.cancel.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// A running (or finished) worker task.
///
/// Starts as soon as it is spawned. It stops on its own once the queue is
/// empty or cancellation is observed, checking only between items.
pub struct Worker {
    id: WorkerId,
    handle: JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

impl Worker {
    /// Spawn a worker onto the current tokio runtime.
    pub fn spawn<P: Processor>(ctx: WorkerContext<P>) -> Self {
        let id = WorkerId::new();
        let finished = Arc::new(AtomicBool::new(false));
        let marker = FinishMarker(Arc::clone(&finished));
        let handle = tokio::spawn(run(id, ctx, marker).instrument(worker_span(id)));
        Self {
            id,
            handle,
            finished,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        if self.finished.load(Ordering::Acquire) {
            WorkerState::Finished
        } else {
            WorkerState::Running
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() == WorkerState::Finished
    }

    /// Wait for the worker task to end.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(worker = %self.id, error = %e, "worker task ended abnormally");
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Marks the worker finished when its run loop exits, including by panic.
struct FinishMarker(Arc<AtomicBool>);

impl Drop for FinishMarker {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

async fn run<P: Processor>(id: WorkerId, ctx: WorkerContext<P>, marker: FinishMarker) {
    let mut handled = 0usize;

    while !ctx.cancel.is_cancelled() {
        let Some(item) = ctx.queue.try_take() else {
            break;
        };
        let span = item_span(id, item.source());
        let start = Instant::now();
        let outcome = AssertUnwindSafe(handle_item(id, ctx.processor.as_ref(), &item))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| {
                warn!(
                    worker = %id,
                    file = ?item.name(),
                    panic = %panic_message(&*panic),
                    "processor panicked"
                );
                ItemOutcome::Failed
            });
        record_outcome(&span, outcome);
        metrics::record_completed(outcome, start.elapsed().as_secs_f64() * 1000.0);
        handled += 1;
    }

    // Free the slot before logging.
    drop(marker);
    info!(
        worker = %id,
        handled,
        cancelled = ctx.cancel.is_cancelled(),
        "worker finished"
    );
}

async fn handle_item<P: Processor>(id: WorkerId, processor: &P, item: &WorkItem) -> ItemOutcome {
    if !source_exists(item.source()).await {
        debug!(worker = %id, file = ?item.name(), "source is gone, skipping");
        return ItemOutcome::Skipped;
    }

    let result = match processor.process(item.source()).await {
        Ok(output) => processor.persist(item.destination(), output).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!(worker = %id, file = ?item.name(), "file processed");
            ItemOutcome::Processed
        }
        Err(e) => {
            warn!(worker = %id, file = ?item.name(), error = %e, "failed to process file");
            ItemOutcome::Failed
        }
    }
}

async fn source_exists(path: &Path) -> bool {
    matches!(tokio::fs::try_exists(path).await, Ok(true))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
