//! Serial fan-out of watch events to registered handlers

use crate::error::WatchError;
use crate::watcher::WatchEvent;
use depscope_core::{
    CatalogProvider, DependencyCache, FileEvent, FileValidity, OwnershipResolver, paths,
};
use depscope_golang::{GoCatalog, GoFileValidator, Settings};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A build target that wants to hear about the changes it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub name: String,
    /// Entry-point file, relative to the root or absolute
    pub entry: PathBuf,
}

impl Handler {
    pub fn new(name: impl Into<String>, entry: impl Into<PathBuf>) -> Self {
        Handler {
            name: name.into(),
            entry: entry.into(),
        }
    }
}

/// Whether one handler owns one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub handler: String,
    pub path: PathBuf,
    pub event: FileEvent,
    pub owned: bool,
}

/// Owns the resolver; events are processed strictly one at a time.
pub struct Dispatcher<C, V> {
    resolver: OwnershipResolver<C, V>,
    handlers: Vec<Handler>,
}

pub type GoDispatcher = Dispatcher<GoCatalog, GoFileValidator>;

impl GoDispatcher {
    /// Dispatcher over the Go module at `root`.
    pub fn for_go_module(root: &Path, settings: &Settings) -> anyhow::Result<Self> {
        let catalog = GoCatalog::open(root, settings)?;
        let root = catalog.root().to_path_buf();
        let cache = DependencyCache::new(root, catalog);
        Ok(Dispatcher::new(OwnershipResolver::new(cache, GoFileValidator::new())))
    }
}

impl<C: CatalogProvider, V: FileValidity> Dispatcher<C, V> {
    pub fn new(resolver: OwnershipResolver<C, V>) -> Self {
        Dispatcher {
            resolver,
            handlers: Vec::new(),
        }
    }

    /// Register a handler. Names are unique and the entry point must exist.
    pub fn register(&mut self, handler: Handler) -> Result<(), WatchError> {
        if self.handlers.iter().any(|h| h.name == handler.name) {
            return Err(WatchError::DuplicateHandler(handler.name));
        }
        let entry = paths::absolutize(&handler.entry, self.resolver.cache().root());
        if !entry.is_file() {
            return Err(WatchError::MissingEntryPoint {
                name: handler.name,
                path: entry,
            });
        }
        info!("Registered handler {} ({})", handler.name, handler.entry.display());
        self.handlers.push(handler);
        Ok(())
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn resolver(&self) -> &OwnershipResolver<C, V> {
        &self.resolver
    }

    /// Ask every handler, in registration order, whether it owns `change`.
    ///
    /// Failures are logged and produce no verdict; they never stop the loop.
    pub fn dispatch(&mut self, change: &WatchEvent) -> Vec<Verdict> {
        let entries: Vec<&Path> = self.handlers.iter().map(|h| h.entry.as_path()).collect();
        let answers = match self.resolver.owners_of(&entries, &change.path, change.event) {
            Ok(answers) => answers,
            Err(e) => {
                warn!("Cannot process {} of {}: {}", change.event, change.path.display(), e);
                return Vec::new();
            }
        };

        self.handlers
            .iter()
            .zip(answers)
            .filter_map(|(handler, answer)| match answer {
                Ok(owned) => Some(Verdict {
                    handler: handler.name.clone(),
                    path: change.path.clone(),
                    event: change.event,
                    owned,
                }),
                Err(e) => {
                    warn!("Handler {} failed on {}: {}", handler.name, change.path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Consume events until the channel closes or nobody listens for verdicts.
    pub async fn run(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<WatchEvent>,
        verdicts: mpsc::UnboundedSender<Verdict>,
    ) -> anyhow::Result<()> {
        while let Some(change) = events.recv().await {
            debug!("Dispatching {} of {}", change.event, change.path.display());
            for verdict in self.dispatch(&change) {
                if verdict.owned {
                    info!("{} owns {} ({})", verdict.handler, verdict.path.display(), verdict.event);
                }
                if verdicts.send(verdict).is_err() {
                    debug!("Verdict receiver dropped, stopping dispatch");
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
