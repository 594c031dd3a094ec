//! Service lifecycle: start/stop state machine gluing the notification
//! source, the work queue, and the worker pool together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::pool::WorkerPool;
use super::worker::{Cancellation, WorkerContext};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{ServiceState, WorkItem, is_eligible};
use crate::processor::{CharCounter, Processor};
use crate::queue::WorkQueue;
use crate::source::{FsWatcher, NotificationSource};
use crate::telemetry::metrics;

/// The folder-watching service.
///
/// Built once for a fixed input/output pair. `start` and `stop` take
/// `&mut self`, so a single owner drives the lifecycle.
pub struct Service<P: Processor = CharCounter> {
    input_dir: PathBuf,
    output_dir: PathBuf,
    processor: Arc<P>,
    source: Box<dyn NotificationSource>,
    pool: Arc<WorkerPool>,
    run: Option<Run<P>>,
}

/// State that exists only while the service is started.
struct Run<P> {
    ctx: WorkerContext<P>,
    cancellation: Cancellation,
    shutdown: Arc<Notify>,
    dispatcher: JoinHandle<()>,
}

impl Service<CharCounter> {
    /// Service counting characters, fed by the OS file watcher.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_components(config, Arc::new(CharCounter), FsWatcher::new())
    }
}

impl<P: Processor> Service<P> {
    /// Build a service from a custom processor and notification source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the input directory does not exist or the
    /// configuration is invalid.
    pub fn with_components(
        config: &Config,
        processor: Arc<P>,
        source: impl NotificationSource + 'static,
    ) -> Result<Self> {
        config.validate()?;
        if !config.input_dir.is_dir() {
            return Err(Error::Config(format!(
                "input directory {} must exist",
                config.input_dir.display()
            )));
        }

        Ok(Self {
            input_dir: config.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            processor,
            source: Box::new(source),
            pool: Arc::new(WorkerPool::new(config.max_workers)),
            run: None,
        })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state(&self) -> ServiceState {
        if self.run.is_some() {
            ServiceState::Started
        } else {
            ServiceState::Stopped
        }
    }

    /// Workers that have not finished yet.
    pub fn running_workers(&self) -> usize {
        self.pool.running_count()
    }

    /// Unclaimed items in the current run's queue. Zero when stopped.
    pub fn pending_items(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.ctx.queue.len())
    }

    /// Start watching and processing. No-op when already started.
    ///
    /// Every eligible file present in the input directory is queued before
    /// this returns. On error the service stays stopped.
    pub async fn start(&mut self) -> Result<()> {
        if self.run.is_some() {
            debug!("start ignored, service already started");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let cancellation = Cancellation::new();
        let ctx = WorkerContext::new(
            Arc::new(WorkQueue::new()),
            Arc::clone(&self.processor),
            cancellation.flag(),
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.source.subscribe(&self.input_dir, events_tx)?;

        let initial = match scan_input(&self.input_dir, &self.output_dir).await {
            Ok(items) => items,
            Err(e) => {
                self.source.unsubscribe();
                return Err(e);
            }
        };
        let queued = initial.len();
        for item in initial {
            ctx.queue.add(item);
        }
        metrics::record_enqueued("scan", queued as u64);

        info!(
            input = %self.input_dir.display(),
            output = %self.output_dir.display(),
            queued,
            "service started"
        );

        self.pool.actualize(&ctx);

        let shutdown = Arc::new(Notify::new());
        let dispatcher = tokio::spawn(dispatch(
            events_rx,
            ctx.clone(),
            Arc::clone(&self.pool),
            self.output_dir.clone(),
            Arc::clone(&shutdown),
        ));

        self.run = Some(Run {
            ctx,
            cancellation,
            shutdown,
            dispatcher,
        });
        Ok(())
    }

    /// Stop gracefully. No-op when already stopped.
    ///
    /// Stops accepting notifications, signals cancellation, and waits for
    /// every running worker to finish its current item. Items still queued
    /// are dropped; the next `start` rescans the input directory.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            debug!("stop ignored, service not started");
            return;
        };

        self.source.unsubscribe();
        run.shutdown.notify_one();
        if let Err(e) = run.dispatcher.await {
            error!(error = %e, "notification dispatcher ended abnormally");
        }

        run.cancellation.cancel();

        let workers = self.pool.drain();
        if !workers.is_empty() {
            info!(
                workers = workers.len(),
                "service is waiting for workers to finish"
            );
        }
        for worker in workers {
            debug!(worker = %worker.id(), state = %worker.state(), "awaiting worker");
            worker.join().await;
        }

        let abandoned = run.ctx.queue.len();
        if abandoned > 0 {
            info!(abandoned, "unclaimed items dropped");
        }
        info!("service stopped");
    }
}

impl<P: Processor> Drop for Service<P> {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            warn!("service dropped while started, cancelling without waiting");
            self.source.unsubscribe();
            run.shutdown.notify_one();
            run.cancellation.cancel();
        }
    }
}

impl<P: Processor> std::fmt::Debug for Service<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("state", &self.state())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Work items for every eligible regular file directly inside `input_dir`.
async fn scan_input(input_dir: &Path, output_dir: &Path) -> Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    let mut entries = tokio::fs::read_dir(input_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_eligible(&path) {
            continue;
        }
        // Follows symlinks; dangling links are skipped.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }
        if let Some(item) = WorkItem::new(path, output_dir) {
            items.push(item);
        }
    }
    Ok(items)
}

/// Turn each notification into a queued item plus a pool actualization,
/// until shutdown is signaled or the source drops its sender.
async fn dispatch<P: Processor>(
    mut events: UnboundedReceiver<PathBuf>,
    ctx: WorkerContext<P>,
    pool: Arc<WorkerPool>,
    output_dir: PathBuf,
    shutdown: Arc<Notify>,
) {
    loop {
        let path = tokio::select! {
            _ = shutdown.notified() => break,
            event = events.recv() => match event {
                Some(path) => path,
                None => break,
            },
        };

        let Some(item) = WorkItem::new(path, &output_dir) else {
            continue;
        };
        info!(file = ?item.name(), "file added");
        ctx.queue.add(item);
        metrics::record_enqueued("notification", 1);
        pool.actualize(&ctx);
    }
    debug!("notification dispatcher finished");
}
