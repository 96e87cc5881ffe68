//! File system watching for hmr
//!
//! This crate provides:
//! - Recursive watching of the watch root (notify)
//! - Ignore rules (.gitignore / .hmrignore / config patterns)
//! - The initial explicit file set
//! - Translation of notify events into add / change / remove events
//!
//! Cross-event coalescing is not done here; that is the aggregator's job.

pub mod ignore;
pub mod scan;

use hmr_core::{EventKind, FileEvent};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

pub use crate::ignore::{IgnoreConfig, IgnoreRules};

/// Errors that end the watch
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot watch {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to load ignore rules: {0}")]
    Ignore(#[from] ::ignore::Error),

    #[error("failed to scan watch root: {0}")]
    Scan(#[from] walkdir::Error),

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("watch root {0} was removed or moved")]
    RootRemoved(PathBuf),
}

/// Live stream of file events; an `Err` item means the watch is over
pub type EventStream = mpsc::UnboundedReceiver<Result<FileEvent, WatchError>>;

type EventSender = mpsc::UnboundedSender<Result<FileEvent, WatchError>>;

/// A file re-created this soon after it vanished was saved in place
const ATOMIC_WINDOW: Duration = Duration::from_millis(100);

/// How often the root itself is checked; moving it away raises no event
const ROOT_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// File system watcher over one root directory
///
/// Watching stops when this value is dropped.
pub struct Watcher {
    root: PathBuf,
    initial: Vec<PathBuf>,
    monitor: Option<JoinHandle<()>>,
    _inner: RecommendedWatcher,
}

impl Watcher {
    /// Scan the root and start watching it
    pub fn start(root: &Path, config: IgnoreConfig) -> Result<(Self, EventStream), WatchError> {
        let root = root.canonicalize().map_err(|source| WatchError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root));
        }

        let rules = IgnoreRules::load(&root, config)?;
        debug!(
            target: "hmr::watch",
            "Loaded {} ignore source(s) for {}",
            rules.active_sources(),
            root.display()
        );

        let initial = scan::initial_files(&rules)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::new(rules, &initial, tx.clone());
        let root_lost = handler.root_lost();

        let monitor = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(monitor_root(root.clone(), tx, root_lost))),
            Err(_) => {
                debug!(
                    target: "hmr::watch",
                    "No async runtime, root loss is only detected from events"
                );
                None
            }
        };

        let mut inner =
            notify::recommended_watcher(move |res: notify::Result<Event>| handler.handle(res))?;
        inner.watch(&root, RecursiveMode::Recursive)?;

        info!(
            target: "hmr::watch",
            "Initially watching {} files for changes",
            initial.len()
        );

        Ok((
            Self {
                root,
                initial,
                monitor,
                _inner: inner,
            },
            rx,
        ))
    }

    /// Canonicalized watch root; event paths are absolute under it
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files present at startup (sorted)
    pub fn initial_files(&self) -> &[PathBuf] {
        &self.initial
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

/// Poll the root until it disappears or the stream is dropped
async fn monitor_root(root: PathBuf, tx: EventSender, lost: Arc<AtomicBool>) {
    let mut ticks = tokio::time::interval(ROOT_CHECK_INTERVAL);
    loop {
        ticks.tick().await;
        if tx.is_closed() || lost.load(Ordering::SeqCst) {
            return;
        }
        if !root.is_dir() {
            report_root_lost(&root, &lost, &tx);
            return;
        }
    }
}

/// Send `RootRemoved` unless it was already sent
fn report_root_lost(root: &Path, lost: &AtomicBool, tx: &EventSender) {
    if lost.swap(true, Ordering::SeqCst) {
        return;
    }
    error!(target: "hmr::watch", "Watch root {} is gone", root.display());
    let _ = tx.send(Err(WatchError::RootRemoved(root.to_path_buf())));
}

/// Map a notify event to engine events, without filtering
pub fn translate(event: &Event) -> Vec<FileEvent> {
    let each = |kind: EventKind| -> Vec<FileEvent> {
        event
            .paths
            .iter()
            .map(|path| FileEvent::new(kind, path.clone()))
            .collect()
    };

    match event.kind {
        notify::EventKind::Create(CreateKind::Folder) => vec![],
        notify::EventKind::Create(_) => each(EventKind::Add),

        notify::EventKind::Modify(ModifyKind::Metadata(_)) => vec![],
        notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(EventKind::Remove),
        notify::EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(EventKind::Add),
        notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::new();
            if let Some(from) = event.paths.first() {
                events.push(FileEvent::remove(from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                events.push(FileEvent::add(to.clone()));
            }
            events
        }
        // Backends that cannot tell which side of a rename this is
        notify::EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                if path.exists() {
                    FileEvent::add(path.clone())
                } else {
                    FileEvent::remove(path.clone())
                }
            })
            .collect(),
        notify::EventKind::Modify(_) => each(EventKind::Change),

        notify::EventKind::Remove(RemoveKind::Folder) => vec![],
        notify::EventKind::Remove(_) => each(EventKind::Remove),

        notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => vec![],
    }
}

/// Runs on notify's thread: filters events and forwards them to the stream
///
/// Tracks which files exist so that atomic saves (write a temp file, rename
/// it over the target) come out as a `Change` of the target.
struct EventHandler {
    rules: IgnoreRules,
    tx: EventSender,
    root_lost: Arc<AtomicBool>,
    known: HashSet<PathBuf>,
    recently_removed: HashMap<PathBuf, Instant>,
}

impl EventHandler {
    fn new(rules: IgnoreRules, initial: &[PathBuf], tx: EventSender) -> Self {
        Self {
            rules,
            tx,
            root_lost: Arc::new(AtomicBool::new(false)),
            known: initial.iter().cloned().collect(),
            recently_removed: HashMap::new(),
        }
    }

    fn root_lost(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.root_lost)
    }

    fn handle(&mut self, res: notify::Result<Event>) {
        if self.root_lost.load(Ordering::SeqCst) {
            return;
        }

        let event = match res {
            Ok(event) => event,
            Err(e) => {
                error!(target: "hmr::watch", "File watcher error: {}", e);
                let _ = self.tx.send(Err(WatchError::Notify(e)));
                return;
            }
        };

        trace!(target: "hmr::watch", kind = ?event.kind, paths = ?event.paths, "notify event");

        if self.may_affect_root(&event) && !self.rules.root().is_dir() {
            report_root_lost(self.rules.root(), &self.root_lost, &self.tx);
            return;
        }

        let now = Instant::now();
        self.recently_removed
            .retain(|_, removed_at| now.duration_since(*removed_at) <= ATOMIC_WINDOW);

        for file_event in translate(&event) {
            if !self.accept(&file_event) {
                continue;
            }

            let file_event = self.track(file_event, now);
            debug!(
                target: "hmr::watch",
                "{} {}",
                file_event.kind,
                file_event.path.display()
            );
            let _ = self.tx.send(Ok(file_event));
        }
    }

    fn may_affect_root(&self, event: &Event) -> bool {
        matches!(
            event.kind,
            notify::EventKind::Remove(_) | notify::EventKind::Modify(ModifyKind::Name(_))
        ) || event.paths.iter().any(|path| path == self.rules.root())
    }

    /// Update the known file set; an `Add` over an existing or just removed
    /// file becomes a `Change`
    fn track(&mut self, event: FileEvent, now: Instant) -> FileEvent {
        match event.kind {
            EventKind::Add => {
                let replaced = self.known.contains(&event.path)
                    || self
                        .recently_removed
                        .remove(&event.path)
                        .is_some_and(|removed_at| now.duration_since(removed_at) <= ATOMIC_WINDOW);
                self.known.insert(event.path.clone());

                if replaced {
                    trace!(target: "hmr::watch", "{} replaced in place", event.path.display());
                    FileEvent::change(event.path)
                } else {
                    event
                }
            }
            EventKind::Change => {
                self.known.insert(event.path.clone());
                event
            }
            EventKind::Remove => {
                self.known.remove(&event.path);
                self.recently_removed.insert(event.path.clone(), now);
                event
            }
        }
    }

    fn accept(&self, event: &FileEvent) -> bool {
        let Ok(relative) = event.path.strip_prefix(self.rules.root()) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        let is_dir = event.kind != EventKind::Remove && event.path.is_dir();
        if is_dir {
            return false;
        }

        !self.rules.should_ignore(relative, is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn notify_event<P: AsRef<Path>>(kind: notify::EventKind, paths: &[P]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(path.as_ref().to_path_buf()))
    }

    #[test]
    fn test_translate_basic_kinds() {
        let path = Path::new("/app/index.js");

        assert_eq!(
            translate(&notify_event(notify::EventKind::Create(CreateKind::File), &[path])),
            vec![FileEvent::add(path)]
        );
        assert_eq!(
            translate(&notify_event(
                notify::EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &[path]
            )),
            vec![FileEvent::change(path)]
        );
        assert_eq!(
            translate(&notify_event(notify::EventKind::Modify(ModifyKind::Any), &[path])),
            vec![FileEvent::change(path)]
        );
        assert_eq!(
            translate(&notify_event(notify::EventKind::Remove(RemoveKind::File), &[path])),
            vec![FileEvent::remove(path)]
        );
    }

    #[test]
    fn test_translate_drops_noise() {
        let path = Path::new("/app/index.js");

        for kind in [
            notify::EventKind::Access(notify::event::AccessKind::Any),
            notify::EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            notify::EventKind::Create(CreateKind::Folder),
            notify::EventKind::Remove(RemoveKind::Folder),
            notify::EventKind::Other,
        ] {
            assert!(translate(&notify_event(kind, &[path])).is_empty());
        }
    }

    #[test]
    fn test_translate_renames() {
        let from = Path::new("/app/old.js");
        let to = Path::new("/app/new.js");

        assert_eq!(
            translate(&notify_event(
                notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[from, to]
            )),
            vec![FileEvent::remove(from), FileEvent::add(to)]
        );
        assert_eq!(
            translate(&notify_event(
                notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &[from]
            )),
            vec![FileEvent::remove(from)]
        );
        assert_eq!(
            translate(&notify_event(
                notify::EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                &[to]
            )),
            vec![FileEvent::add(to)]
        );
    }

    #[test]
    fn test_handler_filters_ignored_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("app.js"), "app").unwrap();

        let rules = IgnoreRules::load(&root, IgnoreConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::new(rules, &[], tx);

        let modify = notify::EventKind::Modify(ModifyKind::Data(DataChange::Any));
        handler.handle(Ok(notify_event(modify, &[&root.join("node_modules/x/index.js")])));
        handler.handle(Ok(notify_event(modify, &[&root.join("lib")])));
        handler.handle(Ok(notify_event(modify, &[Path::new("/elsewhere/a.js")])));
        handler.handle(Ok(notify_event(modify, &[&root.join("app.js")])));

        let received = rx.try_recv().unwrap().unwrap();
        assert_eq!(received, FileEvent::change(root.join("app.js")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_reports_root_removal_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("app");
        fs::create_dir_all(&root).unwrap();

        let rules = IgnoreRules::load(&root, IgnoreConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::new(rules, &[], tx);

        fs::remove_dir_all(&root).unwrap();
        let removed = notify::EventKind::Remove(RemoveKind::Any);
        handler.handle(Ok(notify_event(removed, &[&root])));
        handler.handle(Ok(notify_event(removed, &[&root])));

        match rx.try_recv().unwrap() {
            Err(WatchError::RootRemoved(path)) => assert_eq!(path, root),
            other => panic!("unexpected item: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_reports_replace_by_rename_as_change() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let target = root.join("index.js");
        let temp = root.join("index.js.tmp123");

        let rules = IgnoreRules::load(&root, IgnoreConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::new(rules, &[target.clone()], tx);

        handler.handle(Ok(notify_event(notify::EventKind::Create(CreateKind::File), &[&temp])));
        handler.handle(Ok(notify_event(
            notify::EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &[&temp],
        )));
        handler.handle(Ok(notify_event(
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&temp, &target],
        )));

        let mut received = Vec::new();
        while let Ok(item) = rx.try_recv() {
            received.push(item.unwrap());
        }
        assert_eq!(
            received,
            vec![
                FileEvent::add(&temp),
                FileEvent::change(&temp),
                FileEvent::remove(&temp),
                FileEvent::change(&target),
            ]
        );
    }

    #[test]
    fn test_handler_recreate_after_remove_is_change() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let target = root.join("index.js");
        let fresh = root.join("fresh.js");

        let rules = IgnoreRules::load(&root, IgnoreConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::new(rules, &[target.clone()], tx);

        let created = notify::EventKind::Create(CreateKind::File);
        handler.handle(Ok(notify_event(notify::EventKind::Remove(RemoveKind::File), &[&target])));
        handler.handle(Ok(notify_event(created, &[&target])));
        handler.handle(Ok(notify_event(created, &[&fresh])));

        let mut received = Vec::new();
        while let Ok(item) = rx.try_recv() {
            received.push(item.unwrap());
        }
        assert_eq!(
            received,
            vec![
                FileEvent::remove(&target),
                FileEvent::change(&target),
                FileEvent::add(&fresh),
            ]
        );
    }

    #[test]
    fn test_handler_reports_renamed_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("app");
        fs::create_dir_all(&root).unwrap();

        let rules = IgnoreRules::load(&root, IgnoreConfig::default()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::new(rules, &[], tx);

        fs::rename(&root, temp_dir.path().join("moved")).unwrap();
        handler.handle(Ok(notify_event(
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[&root],
        )));

        match rx.try_recv().unwrap() {
            Err(WatchError::RootRemoved(path)) => assert_eq!(path, root),
            other => panic!("unexpected item: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_start_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        assert!(matches!(
            Watcher::start(&missing, IgnoreConfig::default()),
            Err(WatchError::Root { .. })
        ));
    }

    #[tokio::test]
    async fn test_watcher_reports_modification() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("app.js");
        fs::write(&file, "v1").unwrap();

        let (watcher, mut events) = Watcher::start(temp_dir.path(), IgnoreConfig::default()).unwrap();
        let watched = watcher.root().join("app.js");
        assert_eq!(watcher.initial_files(), &[watched.clone()]);

        fs::write(&file, "v2").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(Ok(event)) if event.kind == EventKind::Change => return event,
                    Some(_) => continue,
                    None => panic!("event stream closed"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(event.path, watched);
    }

    #[tokio::test]
    async fn test_watcher_reports_atomic_save_as_change() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("index.js");
        fs::write(&file, "v1").unwrap();

        let (watcher, mut events) = Watcher::start(temp_dir.path(), IgnoreConfig::default()).unwrap();
        let watched = watcher.root().join("index.js");

        let temp = temp_dir.path().join("index.js.tmp123");
        fs::write(&temp, "v2").unwrap();
        fs::rename(&temp, &file).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(Ok(event)) if event.path == watched && event.kind == EventKind::Change => {
                        return event
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => panic!("watch failed: {}", e),
                    None => panic!("event stream closed"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(event, FileEvent::change(&watched));
    }

    #[tokio::test]
    async fn test_watcher_reports_moved_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("app");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("index.js"), "v1").unwrap();

        let (watcher, mut events) = Watcher::start(&root, IgnoreConfig::default()).unwrap();
        fs::rename(&root, temp_dir.path().join("moved")).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(Err(e)) => return e,
                    Some(Ok(_)) => continue,
                    None => panic!("event stream closed"),
                }
            }
        })
        .await
        .unwrap();

        match err {
            WatchError::RootRemoved(path) => assert_eq!(path, watcher.root()),
            other => panic!("unexpected error: {}", other),
        }
    }
}
