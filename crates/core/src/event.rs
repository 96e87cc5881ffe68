//! File event data structures

use std::fmt;
use std::path::PathBuf;

/// Type of file system event, as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// File appeared under the watch root
    Add,
    /// File contents changed
    Change,
    /// File disappeared from the watch root
    Remove,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Add => "add",
            EventKind::Change => "change",
            EventKind::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A single file event produced by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Type of change
    pub kind: EventKind,
    /// Absolute or root-relative path that changed
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn add(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Add, path)
    }

    pub fn change(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Change, path)
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Self::new(EventKind::Remove, path)
    }
}

/// Events collected within one quiet window, in arrival order
///
/// May hold several events for the same path, including contradictory ones.
pub type Batch = Vec<FileEvent>;
