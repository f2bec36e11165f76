//! Package-pattern selectors (`./...`, `./pkg/...`, `module/pkg`)

use crate::model::{CompilationUnit, UnitId};
use crate::paths;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Chooses a subset of units, either by directory or by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every unit under the root.
    All,
    /// Units by directory relative to the root (slash separated).
    Directory { path: String, recursive: bool },
    /// Units (or external dependencies) by identity.
    Identity { id: String, recursive: bool },
}

impl Selector {
    /// Whether a catalogued unit under `root` is selected.
    pub fn matches_unit(&self, unit: &CompilationUnit, root: &Path) -> bool {
        match self {
            Selector::All => true,
            Selector::Directory { path, recursive } => {
                let Some(rel) = paths::relative_slash(&unit.directory, root) else {
                    return false;
                };
                prefix_match(&rel, path, *recursive)
            }
            Selector::Identity { .. } => self.matches_identity(&unit.id),
        }
    }

    /// Identity-only matching, usable for external dependencies too.
    /// Directory selectors never match here.
    pub fn matches_identity(&self, id: &UnitId) -> bool {
        match self {
            Selector::All => true,
            Selector::Directory { .. } => false,
            Selector::Identity { id: pattern, recursive } => {
                prefix_match(id.as_str(), pattern, *recursive)
            }
        }
    }
}

fn prefix_match(candidate: &str, pattern: &str, recursive: bool) -> bool {
    if candidate == pattern {
        return true;
    }
    if !recursive {
        return false;
    }
    if pattern == "." {
        return true;
    }
    candidate
        .strip_prefix(pattern)
        .is_some_and(|rest| rest.starts_with('/'))
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('/');
        if s.is_empty() || s == "..." || s == "./..." {
            return Ok(Selector::All);
        }

        let (body, recursive) = match s.strip_suffix("/...") {
            Some(body) => (body, true),
            None => (s, false),
        };

        if body == "." || body.starts_with("./") {
            let rel = paths::to_slash(&paths::normalize(Path::new(body)));
            return Ok(Selector::Directory {
                path: rel,
                recursive,
            });
        }

        Ok(Selector::Identity {
            id: body.to_string(),
            recursive,
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("./..."),
            Selector::Directory { path, recursive } => {
                let base = if path == "." { ".".to_string() } else { format!("./{path}") };
                if *recursive {
                    write!(f, "{base}/...")
                } else {
                    f.write_str(&base)
                }
            }
            Selector::Identity { id, recursive } => {
                if *recursive {
                    write!(f, "{id}/...")
                } else {
                    f.write_str(id)
                }
            }
        }
    }
}
