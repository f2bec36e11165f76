//! Completeness checks for Go files caught mid-write

use crate::parser::GoParser;
use depscope_core::FileValidity;
use std::io;
use std::path::Path;
use tracing::debug;

fn is_go_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "go")
}

fn parser() -> io::Result<GoParser> {
    GoParser::new().map_err(io::Error::other)
}

/// Treats empty or syntactically broken `.go` files as incomplete.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoFileValidator;

impl GoFileValidator {
    pub fn new() -> Self {
        GoFileValidator
    }
}

impl FileValidity for GoFileValidator {
    fn is_complete(&self, path: &Path) -> io::Result<bool> {
        if !is_go_file(path) {
            return Ok(true);
        }
        let source = std::fs::read_to_string(path)?;
        if source.trim().is_empty() {
            debug!("{} is empty", path.display());
            return Ok(false);
        }
        let Some(facts) = parser()?.parse(&source) else {
            return Ok(false);
        };
        if facts.has_error || facts.package.is_none() {
            debug!("{} does not parse yet", path.display());
            return Ok(false);
        }
        Ok(true)
    }

    /// Content present but no package clause yet and the syntax is broken:
    /// an editor is most likely still flushing the file.
    fn is_being_written(&self, path: &Path) -> io::Result<bool> {
        let source = std::fs::read_to_string(path)?;
        if source.trim().is_empty() {
            return Ok(false);
        }
        match parser()?.parse(&source) {
            Some(facts) => Ok(facts.has_error && facts.package.is_none()),
            None => Ok(true),
        }
    }
}
