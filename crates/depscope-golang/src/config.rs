//! Settings loaded from `<root>/.depscope.toml`

use crate::constraint::BuildContext;
use depscope_core::CatalogError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const SETTINGS_FILE: &str = ".depscope.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid exclude pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("cannot determine the Go module: {0}")]
    Module(#[from] CatalogError),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Select `_test.go` files as well
    #[serde(default)]
    pub include_tests: bool,

    /// Extra tags satisfied during constraint evaluation
    #[serde(default)]
    pub build_tags: Vec<String>,

    #[serde(default = "host_goos")]
    pub goos: String,

    #[serde(default = "host_goarch")]
    pub goarch: String,

    /// Globs, relative to the root, for directories never scanned
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            include_tests: false,
            build_tags: Vec::new(),
            goos: host_goos(),
            goarch: host_goarch(),
            exclude: Vec::new(),
        }
    }
}

impl Settings {
    /// Load `<root>/.depscope.toml`, or defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(SETTINGS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).map_err(|source| ConfigError::Parse { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No {} under {}, using defaults", SETTINGS_FILE, root.display());
                Ok(Settings::default())
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply command-line overrides. Tags are added to the configured ones.
    pub fn with_overrides(mut self, tags: &[String], include_tests: bool) -> Self {
        for tag in tags {
            if !self.build_tags.contains(tag) {
                self.build_tags.push(tag.clone());
            }
        }
        self.include_tests |= include_tests;
        self
    }

    pub fn build_context(&self) -> BuildContext {
        BuildContext::new(self.goos.clone(), self.goarch.clone())
            .with_tags(self.build_tags.iter().cloned())
            .with_tests(self.include_tests)
    }

    pub fn exclude_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::Glob {
            pattern: self.exclude.join(","),
            source,
        })
    }
}

/// Host OS under its Go name.
pub fn host_goos() -> String {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
    .to_string()
}

/// Host architecture under its Go name.
pub fn host_goarch() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "wasm32" => "wasm",
        other => other,
    }
    .to_string()
}
