//! Go module discovery (go.mod)

use depscope_core::paths;
use depscope_core::{CatalogError, UnitId};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const MODULE_DIRECTIVE: &str =
    r#"(?m)^\s*module\s+(?:"([^"]+)"|`([^`]+)`|([^\s/][^\s]*?))\s*(?://.*)?$"#;

/// The module a source tree belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    /// Module path from the `module` directive, e.g. `github.com/acme/app`
    pub path: String,
    /// Directory holding go.mod (or the tree root when there is none)
    pub root: PathBuf,
}

impl GoModule {
    /// Read `<root>/go.mod`, falling back to the root directory's name.
    pub fn discover(root: &Path) -> Result<Self, CatalogError> {
        let go_mod = root.join("go.mod");
        let path = match fs::read_to_string(&go_mod) {
            Ok(content) => parse_module_path(&content)
                .map_err(|e| CatalogError::Parse {
                    path: go_mod.clone(),
                    reason: e.to_string(),
                })?
                .ok_or_else(|| CatalogError::Parse {
                    path: go_mod.clone(),
                    reason: "missing module directive".to_string(),
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let fallback = paths::base_name(root).unwrap_or_else(|| "main".to_string());
                debug!("No go.mod under {}, using module path {}", root.display(), fallback);
                fallback
            }
            Err(e) => return Err(CatalogError::io(go_mod, e)),
        };

        Ok(GoModule {
            path,
            root: root.to_path_buf(),
        })
    }

    /// Identity of the package in `directory`, or `None` outside the module.
    pub fn unit_id(&self, directory: &Path) -> Option<UnitId> {
        let rel = paths::relative_slash(directory, &self.root)?;
        if rel == "." {
            Some(UnitId::new(self.path.clone()))
        } else {
            Some(UnitId::new(format!("{}/{}", self.path, rel)))
        }
    }
}

/// Extract the module path from go.mod content.
pub fn parse_module_path(content: &str) -> Result<Option<String>, regex::Error> {
    let directive = Regex::new(MODULE_DIRECTIVE)?;
    let Some(caps) = directive.captures(content) else {
        return Ok(None);
    };
    Ok(caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string()))
}
