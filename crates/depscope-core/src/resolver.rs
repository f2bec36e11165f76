//! Handler ownership decisions on top of the dependency cache

use crate::cache::DependencyCache;
use crate::catalog::{CatalogProvider, FileValidity};
use crate::error::{DepError, Result};
use crate::model::{FileEvent, FileImpact, ImpactLevel, ImpactStatus, UnitId};
use crate::paths;
use crate::selector::Selector;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Answers "does the handler rooted at this entry-point file own this change?"
///
/// A handler is identified by the path of its entry-point file relative to
/// the cache root, e.g. `pwa/main.server.go`. Two handlers whose entry points
/// share a directory are told apart by the imports of their own files.
pub struct OwnershipResolver<C, V> {
    cache: DependencyCache<C>,
    validator: V,
}

impl<C: CatalogProvider, V: FileValidity> OwnershipResolver<C, V> {
    pub fn new(cache: DependencyCache<C>, validator: V) -> Self {
        OwnershipResolver { cache, validator }
    }

    pub fn cache(&self) -> &DependencyCache<C> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DependencyCache<C> {
        &mut self.cache
    }

    /// Decide whether `handler_entry` owns a change to `changed_file`.
    ///
    /// Soft misses (file mid-write, file in no known unit) are `Ok(false)`.
    pub fn owns_file(
        &mut self,
        handler_entry: impl AsRef<Path>,
        changed_file: impl AsRef<Path>,
        event: FileEvent,
    ) -> Result<bool> {
        let (handler_abs, changed_abs) =
            self.validate_inputs(handler_entry.as_ref(), changed_file.as_ref())?;
        let verdicts = self.decide(std::slice::from_ref(&handler_abs), &changed_abs, event)?;
        Ok(verdicts.first().copied().unwrap_or(false))
    }

    /// Ask several handlers about one change. Every handler sees the same
    /// cache state and the event is applied exactly once.
    ///
    /// The outer error covers the change itself; a handler whose entry point
    /// is unusable gets its own error without affecting the others.
    pub fn owners_of<P: AsRef<Path>>(
        &mut self,
        handler_entries: &[P],
        changed_file: impl AsRef<Path>,
        event: FileEvent,
    ) -> Result<Vec<Result<bool>>> {
        let changed_file = changed_file.as_ref();
        if changed_file.as_os_str().is_empty() {
            return Err(DepError::EmptyPath { what: "changed file path" });
        }
        let changed_abs = paths::absolutize(changed_file, self.cache.root());

        let checked: Vec<Result<PathBuf>> = handler_entries
            .iter()
            .map(|entry| self.validate_handler(entry.as_ref()))
            .collect();
        let valid: Vec<PathBuf> = checked
            .iter()
            .filter_map(|c| c.as_ref().ok().cloned())
            .collect();

        let mut answers = self.decide(&valid, &changed_abs, event)?.into_iter();
        Ok(checked
            .into_iter()
            .map(|c| c.map(|_| answers.next().unwrap_or(false)))
            .collect())
    }

    /// Validate the change, apply it to the cache once and answer for every
    /// handler, before the event when the file has left the disk.
    fn decide(&mut self, handlers: &[PathBuf], changed_abs: &Path, event: FileEvent) -> Result<Vec<bool>> {
        let departed = has_departed(changed_abs, event);
        if !departed && !self.is_complete(changed_abs)? {
            debug!("Skipping incomplete file {}", changed_abs.display());
            return Ok(vec![false; handlers.len()]);
        }

        let trigger = handlers
            .iter()
            .find(|h| h.as_path() == changed_abs)
            .map(PathBuf::as_path);

        if departed {
            self.cache.ensure_populated()?;
            let answers = self.answer_all(handlers, changed_abs);
            self.cache.apply_event(changed_abs, event, trigger)?;
            Ok(answers)
        } else {
            self.cache.apply_event(changed_abs, event, trigger)?;
            Ok(self.answer_all(handlers, changed_abs))
        }
    }

    fn answer_all(&self, handlers: &[PathBuf], changed_abs: &Path) -> Vec<bool> {
        handlers
            .iter()
            .map(|handler| handler == changed_abs || self.check_ownership(handler, changed_abs))
            .collect()
    }

    /// Entry points whose artifact includes a file with this base name.
    pub fn units_depending_on_file(&mut self, file_name: &str) -> Result<Vec<UnitId>> {
        self.cache.ensure_populated()?;
        let candidates = self.cache.files().candidate_units_for_name(file_name);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let graph = self.cache.graph();
        let mains = self
            .cache
            .entry_points()
            .iter()
            .filter(|entry| {
                candidates.iter().any(|candidate| {
                    *entry == candidate
                        || graph.transitively_depends_on(entry, candidate) == Some(true)
                })
            })
            .cloned()
            .collect();
        Ok(mains)
    }

    /// Units selected by `source` that are, or transitively depend on, any
    /// identity selected by `targets`.
    pub fn reverse_dependents(
        &mut self,
        source: &Selector,
        targets: &[Selector],
    ) -> Result<Vec<UnitId>> {
        self.cache.ensure_populated()?;
        let graph = self.cache.graph();

        let target_ids: BTreeSet<UnitId> = graph
            .identities()
            .filter(|id| targets.iter().any(|t| t.matches_identity(id)))
            .cloned()
            .chain(
                self.cache
                    .units()
                    .filter(|u| targets.iter().any(|t| t.matches_unit(u, self.cache.root())))
                    .map(|u| u.id.clone()),
            )
            .collect();
        debug!("Reverse dependency targets: {:?}", target_ids);

        let closure = graph.dependents_closure(&target_ids);
        let root = self.cache.root();
        let result = self
            .cache
            .units()
            .filter(|u| closure.contains(&u.id) && source.matches_unit(u, root))
            .map(|u| u.id.clone())
            .collect();
        Ok(result)
    }

    /// Ownership plus the set of entry points a change reaches.
    ///
    /// Both halves of the report are taken from the same cache state.
    pub fn analyze_impact(
        &mut self,
        handler_entry: impl AsRef<Path>,
        changed_file: impl AsRef<Path>,
        event: FileEvent,
    ) -> Result<FileImpact> {
        let changed_file = changed_file.as_ref();
        let (_, changed_abs) = self.validate_inputs(handler_entry.as_ref(), changed_file)?;
        let departed = has_departed(&changed_abs, event);

        if !departed && !self.is_complete(&changed_abs)? {
            let reason = match self.validator.is_being_written(&changed_abs) {
                Ok(true) => "file is still being written",
                Ok(false) => "file is empty or does not parse",
                Err(source) => {
                    return Err(DepError::Validation {
                        path: changed_abs,
                        source,
                    });
                }
            };
            return Ok(FileImpact {
                status: ImpactStatus::Skipped,
                reason: Some(reason.to_string()),
                belongs_to_handler: false,
                affected_entry_points: Vec::new(),
                impact: ImpactLevel::None,
            });
        }

        let name = paths::base_name(&changed_abs);
        let before = if departed {
            Some(self.entry_points_for(name.as_deref())?)
        } else {
            None
        };
        let belongs = self.owns_file(handler_entry, changed_file, event)?;
        let affected = match before {
            Some(affected) => affected,
            None => self.entry_points_for(name.as_deref())?,
        };

        Ok(FileImpact {
            status: ImpactStatus::Analyzed,
            reason: None,
            belongs_to_handler: belongs,
            impact: ImpactLevel::grade(affected.len(), belongs),
            affected_entry_points: affected,
        })
    }

    fn entry_points_for(&mut self, file_name: Option<&str>) -> Result<Vec<UnitId>> {
        match file_name {
            Some(name) => self.units_depending_on_file(name),
            None => Ok(Vec::new()),
        }
    }

    fn is_complete(&self, path: &Path) -> Result<bool> {
        self.validator
            .is_complete(path)
            .map_err(|source| DepError::Validation {
                path: path.to_path_buf(),
                source,
            })
    }

    fn validate_inputs(&self, handler_entry: &Path, changed_file: &Path) -> Result<(PathBuf, PathBuf)> {
        if changed_file.as_os_str().is_empty() {
            return Err(DepError::EmptyPath { what: "changed file path" });
        }
        let handler_abs = self.validate_handler(handler_entry)?;
        Ok((handler_abs, paths::absolutize(changed_file, self.cache.root())))
    }

    fn validate_handler(&self, handler_entry: &Path) -> Result<PathBuf> {
        if handler_entry.as_os_str().is_empty() {
            return Err(DepError::EmptyPath { what: "handler entry point path" });
        }
        let handler_abs = paths::absolutize(handler_entry, self.cache.root());
        match std::fs::metadata(&handler_abs) {
            Ok(_) => Ok(handler_abs),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DepError::HandlerEntryMissing {
                path: handler_entry.to_path_buf(),
            }),
            Err(source) => Err(DepError::Io {
                path: handler_abs,
                source,
            }),
        }
    }

    fn check_ownership(&self, handler_abs: &Path, changed_abs: &Path) -> bool {
        let Some(found) = self.cache.resolve_file(changed_abs) else {
            debug!("{} belongs to no known unit", changed_abs.display());
            return false;
        };
        let target = found.unit();

        if self.cache.is_entry_point(target) {
            return self.same_entry_directory(target, handler_abs);
        }
        self.handler_file_depends_on(handler_abs, target)
    }

    /// Entry-point units are claimed only by handlers rooted in their folder.
    fn same_entry_directory(&self, target: &UnitId, handler_abs: &Path) -> bool {
        let root = self.cache.root();
        let handler_dir = handler_abs.parent().unwrap_or(root);
        let handler_rel = paths::relative_slash(handler_dir, root);

        let unit_rel = self
            .cache
            .unit(target)
            .and_then(|u| paths::relative_slash(&u.directory, root));
        match (unit_rel, handler_rel) {
            (Some(unit_rel), Some(handler_rel)) => unit_rel == handler_rel,
            _ => {
                let handler_base = paths::base_name(handler_dir).unwrap_or_default();
                target.base_name() == handler_base
            }
        }
    }

    /// File-level check: does the handler's own entry file import `target`,
    /// directly or through its imports?
    fn handler_file_depends_on(&self, handler_abs: &Path, target: &UnitId) -> bool {
        let imports = match self.cache.file_dependencies(handler_abs) {
            Ok(imports) => imports,
            Err(e) => {
                warn!("Cannot read imports of {}: {}", handler_abs.display(), e);
                return false;
            }
        };

        let graph = self.cache.graph();
        imports.iter().any(|import| {
            import == target || graph.transitively_depends_on(import, target) == Some(true)
        })
    }
}

/// The file is gone and the event says so: answer from the state before it.
fn has_departed(path: &Path, event: FileEvent) -> bool {
    !path.exists() && matches!(event, FileEvent::Remove | FileEvent::Rename)
}
