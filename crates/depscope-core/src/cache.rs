//! In-memory dependency cache and its event-driven maintenance

use crate::catalog::CatalogProvider;
use crate::error::{CatalogError, Result};
use crate::file_index::FileIndex;
use crate::graph::DependencyGraph;
use crate::model::{CompilationUnit, FileEvent, FileMatch, UnitId};
use crate::paths;
use crate::selector::Selector;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One consistent view of the source tree.
#[derive(Debug, Default)]
struct Snapshot {
    graph: DependencyGraph,
    files: FileIndex,
    units: BTreeMap<UnitId, CompilationUnit>,
    entry_points: BTreeSet<UnitId>,
}

impl Snapshot {
    fn from_units(units: Vec<CompilationUnit>) -> Self {
        let mut snapshot = Snapshot::default();
        for unit in units {
            snapshot.install_unit(unit);
        }
        snapshot
    }

    /// Insert or replace a unit, diffing edges and member files.
    fn install_unit(&mut self, unit: CompilationUnit) {
        if let Some(previous) = self.units.get(&unit.id) {
            let stale: Vec<PathBuf> = previous
                .files
                .iter()
                .filter(|f| !unit.files.contains(f))
                .cloned()
                .collect();
            for file in stale {
                self.files.forget_file(&file);
            }
        }
        for file in &unit.files {
            self.files.record_file(file, &unit.id);
        }

        self.graph.upsert_unit(&unit.id, unit.dependency_set());
        if unit.is_entry_point() {
            self.entry_points.insert(unit.id.clone());
        } else {
            self.entry_points.remove(&unit.id);
        }
        self.units.insert(unit.id.clone(), unit);
    }

    fn drop_unit(&mut self, id: &UnitId) {
        if let Some(unit) = self.units.remove(id) {
            for file in &unit.files {
                self.files.forget_file(file);
            }
        }
        self.graph.remove_unit(id);
        self.entry_points.remove(id);
    }

    fn unit_in_directory(&self, directory: &Path) -> Option<UnitId> {
        self.units
            .values()
            .find(|u| u.directory == directory)
            .map(|u| u.id.clone())
    }
}

/// Lazily populated, incrementally maintained dependency cache for one root.
///
/// The cache is plain mutable state: callers serialize event delivery.
pub struct DependencyCache<C> {
    root: PathBuf,
    catalog: C,
    populated: bool,
    generation: u64,
    snapshot: Snapshot,
}

impl<C> std::fmt::Debug for DependencyCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyCache")
            .field("root", &self.root)
            .field("populated", &self.populated)
            .field("generation", &self.generation)
            .field("units", &self.snapshot.units.len())
            .field("files", &self.snapshot.files.len())
            .finish()
    }
}

impl<C: CatalogProvider> DependencyCache<C> {
    /// Create an empty cache. Nothing is scanned until the first query.
    pub fn new(root: impl AsRef<Path>, catalog: C) -> Self {
        DependencyCache {
            root: paths::absolute(root.as_ref()),
            catalog,
            populated: false,
            generation: 0,
            snapshot: Snapshot::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Number of completed full rebuilds.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Populate from the catalog on first use.
    pub fn ensure_populated(&mut self) -> Result<()> {
        if !self.populated {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Rescan the whole tree. On failure the previous state is kept.
    pub fn rebuild(&mut self) -> Result<()> {
        let units = self.catalog.list_units(&Selector::All)?;
        let snapshot = Snapshot::from_units(units);
        info!(
            "Dependency cache rebuilt: {} units, {} files, {} entry points",
            snapshot.units.len(),
            snapshot.files.len(),
            snapshot.entry_points.len()
        );
        self.snapshot = snapshot;
        self.populated = true;
        self.generation += 1;
        Ok(())
    }

    /// Apply one file-system event.
    ///
    /// `handler_entry` is the entry-point file of the handler on whose behalf
    /// the event is processed; a write to that exact file forces a rebuild.
    pub fn apply_event(
        &mut self,
        path: &Path,
        event: FileEvent,
        handler_entry: Option<&Path>,
    ) -> Result<()> {
        let path = paths::absolutize(path, &self.root);
        let is_handler_entry = handler_entry
            .map(|entry| paths::absolutize(entry, &self.root) == path)
            .unwrap_or(false);
        if event == FileEvent::Write && is_handler_entry {
            info!("Entry point {} changed, rebuilding", path.display());
            return self.rebuild();
        }

        self.ensure_populated()?;
        debug!("Applying {} event for {}", event, path.display());

        match event {
            FileEvent::Write => self.handle_write(&path),
            FileEvent::Create => self.handle_create(&path),
            FileEvent::Remove => {
                self.handle_remove(&path);
                Ok(())
            }
            FileEvent::Rename => {
                self.handle_remove(&path);
                self.handle_create(&path)
            }
        }
    }

    fn handle_create(&mut self, path: &Path) -> Result<()> {
        let Some(directory) = path.parent() else {
            return Ok(());
        };
        let resolved = self.catalog.resolve_unit(directory)?;
        self.apply_resolution(directory, resolved);
        Ok(())
    }

    fn handle_write(&mut self, path: &Path) -> Result<()> {
        let Some(owner) = self.snapshot.files.unit_for_file(path).cloned() else {
            return self.handle_create(path);
        };
        let Some(directory) = self.snapshot.units.get(&owner).map(|u| u.directory.clone()) else {
            return self.handle_create(path);
        };
        let resolved = self.catalog.resolve_unit(&directory)?;
        self.apply_resolution(&directory, resolved);
        Ok(())
    }

    fn handle_remove(&mut self, path: &Path) {
        let Some(owner) = self.snapshot.files.forget_file(path) else {
            debug!("Removed file {} was not indexed", path.display());
            return;
        };
        let emptied = match self.snapshot.units.get_mut(&owner) {
            Some(unit) => {
                unit.files.retain(|f| f != path);
                unit.files.is_empty()
            }
            None => false,
        };
        if emptied {
            debug!("Unit {} lost its last file", owner);
            self.snapshot.drop_unit(&owner);
        }
    }

    fn apply_resolution(&mut self, directory: &Path, resolved: Option<CompilationUnit>) {
        let known = self.snapshot.unit_in_directory(directory);
        match resolved {
            Some(unit) => {
                if let Some(old) = known.filter(|old| *old != unit.id) {
                    self.snapshot.drop_unit(&old);
                }
                debug!("Refreshing unit {} ({} files)", unit.id, unit.files.len());
                self.snapshot.install_unit(unit);
            }
            None => {
                if let Some(old) = known {
                    debug!("Directory {} no longer holds unit {}", directory.display(), old);
                    self.snapshot.drop_unit(&old);
                }
            }
        }
    }

    /// Owning unit of a file: exact path first, then by name.
    pub fn resolve_file(&self, path: &Path) -> Option<FileMatch> {
        let path = paths::absolutize(path, &self.root);
        let found = self.snapshot.files.resolve(&path);
        if let Some(FileMatch::ByName(unit)) = &found {
            warn!(
                "{} is not indexed, guessing owner {} from its file name",
                path.display(),
                unit
            );
        }
        found
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.snapshot.graph
    }

    pub fn files(&self) -> &FileIndex {
        &self.snapshot.files
    }

    pub fn unit(&self, id: &UnitId) -> Option<&CompilationUnit> {
        self.snapshot.units.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.snapshot.units.values()
    }

    pub fn entry_points(&self) -> &BTreeSet<UnitId> {
        &self.snapshot.entry_points
    }

    pub fn is_entry_point(&self, id: &UnitId) -> bool {
        self.snapshot.entry_points.contains(id)
    }

    /// Dependencies one file declares, straight from the catalog.
    pub fn file_dependencies(&self, file: &Path) -> std::result::Result<Vec<UnitId>, CatalogError> {
        self.catalog.file_dependencies(&paths::absolutize(file, &self.root))
    }
}
