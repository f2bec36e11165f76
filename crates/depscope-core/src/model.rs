//! Core data structures for the dependency cache

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable, path-like identity of a compilation unit (e.g. `example.com/app/db`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        UnitId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last `/`-separated segment of the identity.
    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        UnitId(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        UnitId(s)
    }
}

/// Whether a unit can be the root of a built artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    EntryPoint,
    Library,
}

/// One compilation unit as described by a catalog provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub id: UnitId,
    /// Absolute directory holding the unit's files.
    pub directory: PathBuf,
    pub kind: UnitKind,
    /// Declared dependencies in source order. Duplicates are tolerated.
    pub dependencies: Vec<UnitId>,
    /// Absolute paths of member files.
    pub files: Vec<PathBuf>,
}

impl CompilationUnit {
    pub fn is_entry_point(&self) -> bool {
        self.kind == UnitKind::EntryPoint
    }

    /// Declared dependencies as a set.
    pub fn dependency_set(&self) -> BTreeSet<UnitId> {
        self.dependencies.iter().cloned().collect()
    }
}

/// File-system event kinds delivered by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEvent {
    Create,
    Write,
    Remove,
    Rename,
}

impl FileEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileEvent::Create => "create",
            FileEvent::Write => "write",
            FileEvent::Remove => "remove",
            FileEvent::Rename => "rename",
        }
    }
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown file event '{0}' (expected create, write, remove or rename)")]
pub struct UnknownEvent(pub String);

impl FromStr for FileEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(FileEvent::Create),
            "write" => Ok(FileEvent::Write),
            "remove" => Ok(FileEvent::Remove),
            "rename" => Ok(FileEvent::Rename),
            _ => Err(UnknownEvent(s.to_string())),
        }
    }
}

/// How a file was matched to its owning unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMatch {
    /// The absolute path is recorded in the index.
    Exact(UnitId),
    /// Only the base name matched; first candidate in identity order.
    ByName(UnitId),
}

impl FileMatch {
    pub fn unit(&self) -> &UnitId {
        match self {
            FileMatch::Exact(id) | FileMatch::ByName(id) => id,
        }
    }
}

/// Result of an impact analysis for one changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileImpact {
    pub status: ImpactStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub belongs_to_handler: bool,
    pub affected_entry_points: Vec<UnitId>,
    pub impact: ImpactLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactStatus {
    Analyzed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    /// Grade how far a change reaches given the number of affected entry
    /// points and whether the asking handler owns it.
    pub fn grade(affected: usize, owned: bool) -> Self {
        match (affected, owned) {
            (0, _) => ImpactLevel::None,
            (1, true) => ImpactLevel::Low,
            (_, true) => ImpactLevel::Medium,
            (_, false) => ImpactLevel::High,
        }
    }
}
