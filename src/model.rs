//! Core data model.
//!
//! A work item is one input file waiting to be turned into one output file.
//! Workers are identified only for diagnostics.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// Extension of the files the service picks up.
pub const INPUT_EXTENSION: &str = "txt";

/// A unit of work: read `source`, write the result to `destination`.
///
/// Immutable once built. Consumed by exactly one worker and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    source: PathBuf,
    destination: PathBuf,
}

impl WorkItem {
    /// Build the item for `source`, placing its result under `output_dir`
    /// with the same file name.
    ///
    /// Returns `None` when `source` has no file name component.
    pub fn new(source: impl Into<PathBuf>, output_dir: &Path) -> Option<Self> {
        let source = source.into();
        let destination = output_dir.join(source.file_name()?);
        Some(Self {
            source,
            destination,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// File name of the source, for log lines.
    pub fn name(&self) -> &OsStr {
        // `new` guarantees a file name.
        self.source.file_name().unwrap_or_default()
    }
}

/// Does `path` name a file the service should process?
///
/// Matches on the extension only, ignoring ASCII case.
pub fn is_eligible(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
}

// ---------------------------------------------------------------------------
// Worker identity and state
// ---------------------------------------------------------------------------

/// Newtype for worker IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Lifecycle state of a worker. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Finished,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Running => "running",
            WorkerState::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Started,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Started => "started",
        };
        write!(f, "{s}")
    }
}

/// What a worker did with one claimed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Result computed and persisted.
    Processed,
    /// Source was gone when the item was claimed.
    Skipped,
    /// Processing or persisting failed; the item is dropped.
    Failed,
}

impl ItemOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemOutcome::Processed => "processed",
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_keeps_file_name_under_output_dir() {
        let item = WorkItem::new("/data/in/00001-(12 chars).txt", Path::new("/data/out")).unwrap();
        assert_eq!(item.source(), Path::new("/data/in/00001-(12 chars).txt"));
        assert_eq!(item.destination(), Path::new("/data/out/00001-(12 chars).txt"));
        assert_eq!(item.name(), "00001-(12 chars).txt");
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        assert!(WorkItem::new("/", Path::new("out")).is_none());
        assert!(WorkItem::new("in/..", Path::new("out")).is_none());
    }

    #[test]
    fn states_display_lowercase() {
        assert_eq!(WorkerState::Running.to_string(), "running");
        assert_eq!(WorkerState::Finished.to_string(), "finished");
        assert_eq!(ServiceState::Started.to_string(), "started");
    }

    #[test]
    fn eligibility_matches_txt_in_any_case() {
        assert!(is_eligible(Path::new("a.txt")));
        assert!(is_eligible(Path::new("dir/B.TXT")));
        assert!(!is_eligible(Path::new("a.txt.tmp")));
        assert!(!is_eligible(Path::new("notes")));
        assert!(!is_eligible(Path::new(".txt")));
    }
}
