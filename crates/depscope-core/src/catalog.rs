//! Collaborator interfaces consumed by the cache and the resolver

use crate::error::CatalogError;
use crate::model::{CompilationUnit, UnitId};
use crate::selector::Selector;
use std::path::Path;

/// Describes the compilation units of one source tree.
///
/// Implementations are bound to a root directory when constructed.
pub trait CatalogProvider {
    /// Every unit matching `selector`. Units that cannot be described are
    /// skipped as long as at least one resolves.
    fn list_units(&self, selector: &Selector) -> Result<Vec<CompilationUnit>, CatalogError>;

    /// Describe the unit living in `directory`, or `None` when the directory
    /// currently holds no unit.
    fn resolve_unit(&self, directory: &Path) -> Result<Option<CompilationUnit>, CatalogError>;

    /// Dependencies declared by one file, independent of which files its unit
    /// selects.
    fn file_dependencies(&self, file: &Path) -> Result<Vec<UnitId>, CatalogError>;
}

/// Tells whether a file looks fully written.
pub trait FileValidity {
    fn is_complete(&self, path: &Path) -> std::io::Result<bool>;

    /// Whether an incomplete file looks like a write still in progress,
    /// as opposed to one that is simply empty or broken.
    fn is_being_written(&self, _path: &Path) -> std::io::Result<bool> {
        Ok(false)
    }
}

/// Validator that accepts every file.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysComplete;

impl FileValidity for AlwaysComplete {
    fn is_complete(&self, _path: &Path) -> std::io::Result<bool> {
        Ok(true)
    }
}
