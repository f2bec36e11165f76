//! Catalog provider for a single Go module on disk

use crate::config::{ConfigError, Settings};
use crate::constraint::BuildContext;
use crate::module::GoModule;
use crate::parser::GoParser;
use depscope_core::paths;
use depscope_core::{CatalogError, CatalogProvider, CompilationUnit, Selector, UnitId, UnitKind};
use globset::GlobSet;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolves Go packages the way `go list` would for one build context.
#[derive(Debug, Clone)]
pub struct GoCatalog {
    root: PathBuf,
    module: GoModule,
    context: BuildContext,
    exclude: GlobSet,
}

impl GoCatalog {
    pub fn new(module: GoModule, context: BuildContext, exclude: GlobSet) -> Self {
        GoCatalog {
            root: paths::absolute(&module.root),
            module,
            context,
            exclude,
        }
    }

    /// Discover the module under `root` and apply `settings`.
    pub fn open(root: &Path, settings: &Settings) -> Result<Self, ConfigError> {
        let root = paths::absolute(root);
        let module = GoModule::discover(&root)?;
        debug!("Go module {} at {}", module.path, root.display());
        Ok(Self::new(module, settings.build_context(), settings.exclude_set()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module(&self) -> &GoModule {
        &self.module
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    fn parser(&self) -> Result<GoParser, CatalogError> {
        GoParser::new().map_err(|e| CatalogError::Parse {
            path: self.root.clone(),
            reason: e.to_string(),
        })
    }

    /// File-name rules applied before a file is even read.
    fn selects_file_name(&self, name: &str) -> bool {
        if !name.ends_with(".go") || name.starts_with('_') || name.starts_with('.') {
            return false;
        }
        if name.ends_with("_test.go") && !self.context.include_tests {
            return false;
        }
        self.context.matches_file_name(name)
    }

    /// Every directory that may hold a package, root included.
    fn package_directories(&self) -> Vec<PathBuf> {
        let root = self.root.clone();
        let exclude = self.exclude.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                entry.file_type().is_some_and(|t| t.is_dir())
                    && !is_skipped_directory(entry.path(), &root, &exclude)
            })
            .build();

        walker
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_some_and(|t| t.is_dir()) => {
                    Some(entry.into_path())
                }
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Whether `directory` lies inside the module and outside skipped trees.
    fn is_reachable(&self, directory: &Path) -> bool {
        if directory.strip_prefix(&self.root).is_err() {
            return false;
        }
        directory
            .ancestors()
            .take_while(|dir| *dir != self.root.as_path())
            .all(|dir| !is_skipped_directory(dir, &self.root, &self.exclude))
    }

    fn scan_directory(
        &self,
        directory: &Path,
        parser: &mut GoParser,
    ) -> Result<Option<CompilationUnit>, CatalogError> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CatalogError::io(directory, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::io(directory, e))?;
            if entry.file_type().is_ok_and(|t| t.is_file()) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        let mut package: Option<(String, String)> = None;
        let mut files = Vec::new();
        let mut imports = BTreeSet::new();

        for name in names.into_iter().filter(|n| self.selects_file_name(n)) {
            let path = directory.join(&name);
            let source = fs::read_to_string(&path).map_err(|e| CatalogError::io(&path, e))?;

            let selected = self
                .context
                .matches_source(&source)
                .map_err(|e| CatalogError::Parse {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            if !selected {
                debug!("{} excluded by build constraints", path.display());
                continue;
            }

            let facts = parser.parse(&source).ok_or_else(|| CatalogError::Parse {
                path: path.clone(),
                reason: "parser produced no tree".to_string(),
            })?;
            let Some(name_in_clause) = facts.package.clone() else {
                return Err(CatalogError::Parse {
                    path,
                    reason: "missing package clause".to_string(),
                });
            };

            if !facts.is_external_test() {
                match &package {
                    None => package = Some((name_in_clause, name.clone())),
                    Some((first, first_file)) if *first != name_in_clause => {
                        return Err(CatalogError::MixedPackages {
                            directory: directory.to_path_buf(),
                            first: format!("{first} ({first_file})"),
                            second: format!("{name_in_clause} ({name})"),
                        });
                    }
                    Some(_) => {}
                }
                imports.extend(facts.imports);
            }
            files.push(path);
        }

        let Some((package, _)) = package else {
            return Ok(None);
        };
        let Some(id) = self.module.unit_id(directory) else {
            return Ok(None);
        };
        let kind = if package == "main" {
            UnitKind::EntryPoint
        } else {
            UnitKind::Library
        };

        Ok(Some(CompilationUnit {
            id,
            directory: directory.to_path_buf(),
            kind,
            dependencies: imports.into_iter().map(UnitId::new).collect(),
            files,
        }))
    }
}

/// vendor, testdata, `_x`, `.x`, nested modules and excluded globs.
fn is_skipped_directory(dir: &Path, root: &Path, exclude: &GlobSet) -> bool {
    let name = paths::base_name(dir).unwrap_or_default();
    if name == "vendor" || name == "testdata" || name.starts_with('_') || name.starts_with('.') {
        return true;
    }
    if dir != root && dir.join("go.mod").is_file() {
        return true;
    }
    match paths::relative_slash(dir, root) {
        Some(rel) => rel != "." && exclude.is_match(&rel),
        None => true,
    }
}

impl CatalogProvider for GoCatalog {
    fn list_units(&self, selector: &Selector) -> Result<Vec<CompilationUnit>, CatalogError> {
        if !self.root.is_dir() {
            return Err(CatalogError::NoUnits {
                root: self.root.clone(),
            });
        }

        let mut parser = self.parser()?;
        let mut units = Vec::new();
        let mut first_error = None;

        for directory in self.package_directories() {
            match self.scan_directory(&directory, &mut parser) {
                Ok(Some(unit)) => {
                    if selector.matches_unit(&unit, &self.root) {
                        units.push(unit);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping {}: {}", directory.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if units.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        debug!("Listed {} packages matching {}", units.len(), selector);
        Ok(units)
    }

    fn resolve_unit(&self, directory: &Path) -> Result<Option<CompilationUnit>, CatalogError> {
        let directory = paths::absolute(directory);
        if !self.is_reachable(&directory) {
            debug!("{} is outside the scanned tree", directory.display());
            return Ok(None);
        }
        let mut parser = self.parser()?;
        self.scan_directory(&directory, &mut parser)
    }

    fn file_dependencies(&self, file: &Path) -> Result<Vec<UnitId>, CatalogError> {
        let file = paths::absolute(file);
        let mut parser = self.parser()?;
        let facts = parser
            .parse_file(&file)
            .map_err(|e| CatalogError::io(&file, e))?
            .ok_or_else(|| CatalogError::Parse {
                path: file.clone(),
                reason: "parser produced no tree".to_string(),
            })?;
        if facts.package.is_none() {
            return Err(CatalogError::Parse {
                path: file,
                reason: "missing package clause".to_string(),
            });
        }
        Ok(facts.imports.into_iter().map(UnitId::new).collect())
    }
}
