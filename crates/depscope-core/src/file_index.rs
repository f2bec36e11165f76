//! File → unit lookup tables

use crate::model::{FileMatch, UnitId};
use crate::paths;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Exact-path and by-name indexes derived from one catalog snapshot.
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    by_path: HashMap<PathBuf, UnitId>,
    /// Candidates per base name, sorted by identity and free of duplicates.
    by_name: HashMap<String, Vec<UnitId>>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` belongs to `unit`, replacing any previous owner.
    pub fn record_file(&mut self, path: &Path, unit: &UnitId) {
        let path = paths::normalize(path);
        if let Some(previous) = self.by_path.get(&path) {
            if previous != unit {
                let previous = previous.clone();
                self.drop_name(&path, &previous);
            }
        }

        if let Some(name) = paths::base_name(&path) {
            let candidates = self.by_name.entry(name).or_default();
            if let Err(pos) = candidates.binary_search(unit) {
                candidates.insert(pos, unit.clone());
            }
        }
        self.by_path.insert(path, unit.clone());
    }

    /// Forget a file. Returns the unit that owned it, if any.
    pub fn forget_file(&mut self, path: &Path) -> Option<UnitId> {
        let path = paths::normalize(path);
        let unit = self.by_path.remove(&path)?;
        self.drop_name(&path, &unit);
        Some(unit)
    }

    /// Exact lookup only.
    pub fn unit_for_file(&self, path: &Path) -> Option<&UnitId> {
        self.by_path.get(&paths::normalize(path))
    }

    /// Units owning a file with this base name, in identity order.
    pub fn candidate_units_for_name(&self, name: &str) -> &[UnitId] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Exact lookup, falling back to the first by-name candidate.
    pub fn resolve(&self, path: &Path) -> Option<FileMatch> {
        if let Some(unit) = self.unit_for_file(path) {
            return Some(FileMatch::Exact(unit.clone()));
        }
        let name = paths::base_name(path)?;
        self.candidate_units_for_name(&name)
            .first()
            .map(|unit| FileMatch::ByName(unit.clone()))
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    fn drop_name(&mut self, path: &Path, unit: &UnitId) {
        let Some(name) = paths::base_name(path) else {
            return;
        };
        // Another file with the same name may still tie this unit to the name.
        let still_owned = self
            .by_path
            .iter()
            .any(|(other, owner)| owner == unit && other != path && other.file_name() == path.file_name());
        if still_owned {
            return;
        }
        if let Some(candidates) = self.by_name.get_mut(&name) {
            candidates.retain(|c| c != unit);
            if candidates.is_empty() {
                self.by_name.remove(&name);
            }
        }
    }
}
