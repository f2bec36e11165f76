//! Filesystem watcher implementation

use crate::error::WatchError;
use depscope_core::FileEvent;
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One change to a Go source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub event: FileEvent,
}

/// File system watcher for Go sources under a root
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    for change in translate(&event) {
                        if let Err(e) = event_tx.send(change) {
                            warn!("Failed to forward watch event: {}", e);
                        }
                    }
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Watch the root recursively
    pub fn start(&mut self) -> Result<(), WatchError> {
        let root = self.root_path.clone();
        self.watch_directory(root)
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        info!("Watching directory: {:?}", path);

        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: path.to_path_buf(),
                source,
            })?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        info!("Stopping watch for: {:?}", path);

        self.watcher.unwatch(path).map_err(|source| WatchError::Watch {
            path: path.to_path_buf(),
            source,
        })?;
        self.watched_paths.remove(path);
        Ok(())
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }
}

/// Map a notify event onto core file events, dropping everything that is not
/// a Go source outside ignored trees.
pub fn translate(event: &notify::Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => FileEvent::Create,
        EventKind::Modify(ModifyKind::Name(_)) => FileEvent::Rename,
        EventKind::Modify(_) => FileEvent::Write,
        EventKind::Remove(_) => FileEvent::Remove,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|path| is_go_file(path) && !should_ignore_path(path))
        .map(|path| WatchEvent {
            path: path.clone(),
            event: kind,
        })
        .collect()
}

fn is_go_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("go")
}

/// Check if a path should be ignored (e.g., target/, .git/, vendor/)
fn should_ignore_path(path: &Path) -> bool {
    path.components().any(|component| {
        matches!(
            component.as_os_str().to_str(),
            Some("target" | ".git" | "node_modules" | "vendor")
        )
    })
}
