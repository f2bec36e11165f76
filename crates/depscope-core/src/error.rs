//! Error types for catalog access and ownership queries.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a catalog provider.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("found packages {first} and {second} in {directory}")]
    MixedPackages {
        directory: PathBuf,
        first: String,
        second: String,
    },

    #[error("no compilation units could be resolved under {root}")]
    NoUnits { root: PathBuf },
}

impl CatalogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by the cache and the ownership resolver.
#[derive(Error, Debug)]
pub enum DepError {
    #[error("{what} cannot be empty")]
    EmptyPath { what: &'static str },

    #[error("handler entry point does not exist: {path}")]
    HandlerEntryMissing { path: PathBuf },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file validation failed for {path}: {source}")]
    Validation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog failure: {0}")]
    Catalog(#[from] CatalogError),
}

pub type Result<T, E = DepError> = std::result::Result<T, E>;
