//! Test utilities: an in-memory catalog backed by real files in a temp dir

use crate::catalog::CatalogProvider;
use crate::error::CatalogError;
use crate::model::{CompilationUnit, UnitId, UnitKind};
use crate::selector::Selector;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Default)]
struct MemoryState {
    units: BTreeMap<PathBuf, CompilationUnit>,
    file_deps: HashMap<PathBuf, Vec<UnitId>>,
    failing: HashSet<PathBuf>,
    list_calls: usize,
}

/// Catalog whose answers are scripted by the test. Clones share state, so a
/// test can keep a handle while the cache owns another.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryCatalog {
    pub fn put_unit(&self, unit: CompilationUnit) {
        self.state.borrow_mut().units.insert(unit.directory.clone(), unit);
    }

    pub fn remove_directory(&self, directory: &Path) {
        self.state.borrow_mut().units.remove(directory);
    }

    pub fn set_file_deps(&self, file: &Path, deps: Vec<UnitId>) {
        self.state.borrow_mut().file_deps.insert(file.to_path_buf(), deps);
    }

    /// Make `resolve_unit` fail for this directory.
    pub fn set_failing(&self, directory: &Path, failing: bool) {
        let mut state = self.state.borrow_mut();
        if failing {
            state.failing.insert(directory.to_path_buf());
        } else {
            state.failing.remove(directory);
        }
    }

    pub fn list_calls(&self) -> usize {
        self.state.borrow().list_calls
    }
}

impl CatalogProvider for MemoryCatalog {
    fn list_units(&self, _selector: &Selector) -> Result<Vec<CompilationUnit>, CatalogError> {
        let mut state = self.state.borrow_mut();
        state.list_calls += 1;
        Ok(state
            .units
            .iter()
            .filter(|(dir, _)| !state.failing.contains(*dir))
            .map(|(_, unit)| unit.clone())
            .collect())
    }

    fn resolve_unit(&self, directory: &Path) -> Result<Option<CompilationUnit>, CatalogError> {
        let state = self.state.borrow();
        if state.failing.contains(directory) {
            return Err(CatalogError::Parse {
                path: directory.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(state.units.get(directory).cloned())
    }

    fn file_dependencies(&self, file: &Path) -> Result<Vec<UnitId>, CatalogError> {
        let state = self.state.borrow();
        if let Some(deps) = state.file_deps.get(file) {
            return Ok(deps.clone());
        }
        state
            .units
            .values()
            .find(|u| u.files.iter().any(|f| f == file))
            .map(|u| u.dependencies.clone())
            .ok_or_else(|| CatalogError::Parse {
                path: file.to_path_buf(),
                reason: "file not scripted".to_string(),
            })
    }
}

/// A temp directory plus the catalog describing it.
pub struct TestTree {
    pub dir: TempDir,
    pub catalog: MemoryCatalog,
}

impl TestTree {
    pub fn new() -> Self {
        TestTree {
            dir: TempDir::new().unwrap(),
            catalog: MemoryCatalog::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write the unit's files to disk and register it with the catalog.
    pub fn unit(&self, id: &str, rel_dir: &str, kind: UnitKind, files: &[&str], deps: &[&str]) {
        let directory = self.path(rel_dir);
        fs::create_dir_all(&directory).unwrap();
        let files: Vec<PathBuf> = files.iter().map(|f| directory.join(f)).collect();
        for file in &files {
            if !file.exists() {
                fs::write(file, "// test file\n").unwrap();
            }
        }
        self.catalog.put_unit(CompilationUnit {
            id: UnitId::from(id),
            directory,
            kind,
            dependencies: deps.iter().map(|d| UnitId::from(*d)).collect(),
            files,
        });
    }

    pub fn library(&self, id: &str, rel_dir: &str, files: &[&str], deps: &[&str]) {
        self.unit(id, rel_dir, UnitKind::Library, files, deps);
    }

    pub fn entry_point(&self, id: &str, rel_dir: &str, files: &[&str], deps: &[&str]) {
        self.unit(id, rel_dir, UnitKind::EntryPoint, files, deps);
    }

    /// Give one file its own import list.
    pub fn file_imports(&self, rel_file: &str, deps: &[&str]) {
        let path = self.path(rel_file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        if !path.exists() {
            fs::write(&path, "// test file\n").unwrap();
        }
        self.catalog
            .set_file_deps(&path, deps.iter().map(|d| UnitId::from(*d)).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_writes_files() {
        let tree = TestTree::new();
        tree.library("m/db", "db", &["db.go"], &[]);
        assert!(tree.path("db/db.go").exists());
        let listed = tree.catalog.list_units(&Selector::All).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(tree.catalog.list_calls(), 1);
    }
}
