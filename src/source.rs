//! Notification sources: where "a new input file appeared" comes from.
//!
//! A source pushes the path of every newly created eligible file onto a
//! channel. The service owns the receiving end and turns each message into a
//! work item.

use std::path::{Path, PathBuf};

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::is_eligible;

/// Sender half handed to a source on subscribe.
pub type NotificationSender = UnboundedSender<PathBuf>;

/// Something that reports newly created input files.
///
/// `subscribe` replaces any previous subscription; `unsubscribe` is a no-op
/// when not subscribed.
pub trait NotificationSource: Send {
    fn subscribe(&mut self, dir: &Path, events: NotificationSender) -> Result<()>;

    fn unsubscribe(&mut self);
}

/// OS filesystem watcher reporting `*.txt` files created directly inside the
/// watched directory.
///
/// Backends can drop events under heavy bursts; when they say so the loss is
/// logged and nothing else is done about it.
#[derive(Default)]
pub struct FsWatcher {
    watcher: Option<RecommendedWatcher>,
}

impl FsWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.watcher.is_some()
    }
}

impl NotificationSource for FsWatcher {
    fn subscribe(&mut self, dir: &Path, events: NotificationSender) -> Result<()> {
        self.unsubscribe();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => forward_created(event, &events),
                Err(e) => warn!(error = %e, "file watcher error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        debug!(dir = %dir.display(), "file watcher subscribed");
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        // Dropping the watcher stops the backend and releases the sender.
        if self.watcher.take().is_some() {
            debug!("file watcher unsubscribed");
        }
    }
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

fn forward_created(event: Event, events: &NotificationSender) {
    if event.need_rescan() {
        warn!("file watcher dropped events; files created meanwhile may be missed");
    }
    if !is_file_creation(&event.kind) {
        return;
    }
    for path in event.paths {
        if is_eligible(&path) {
            debug!(path = %path.display(), "file added");
            // Receiver gone means the service is stopping.
            let _ = events.send(path);
        }
    }
}

fn is_file_creation(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(create) if *create != CreateKind::Folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind};
    use tokio::sync::mpsc;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn forwards_created_txt_files_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        forward_created(event(EventKind::Create(CreateKind::File), "/in/a.txt"), &tx);
        forward_created(event(EventKind::Create(CreateKind::Any), "/in/b.TXT"), &tx);
        forward_created(event(EventKind::Create(CreateKind::File), "/in/c.log"), &tx);
        forward_created(event(EventKind::Create(CreateKind::Folder), "/in/d.txt"), &tx);
        forward_created(
            event(EventKind::Modify(ModifyKind::Data(DataChange::Any)), "/in/e.txt"),
            &tx,
        );

        assert_eq!(rx.try_recv().unwrap(), PathBuf::from("/in/a.txt"));
        assert_eq!(rx.try_recv().unwrap(), PathBuf::from("/in/b.TXT"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        forward_created(event(EventKind::Create(CreateKind::File), "/in/a.txt"), &tx);
    }
}
