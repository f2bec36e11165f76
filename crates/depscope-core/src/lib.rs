//! Depscope Core: unit dependency graph, file index, cache and ownership resolver

pub mod catalog;
pub mod cache;
pub mod error;
pub mod file_index;
pub mod graph;
pub mod model;
pub mod paths;
pub mod resolver;
pub mod selector;


#[cfg(test)]
pub mod test_utils;

pub use catalog::{AlwaysComplete, CatalogProvider, FileValidity};
pub use cache::DependencyCache;
pub use error::{CatalogError, DepError, Result};
pub use file_index::FileIndex;
pub use graph::DependencyGraph;
pub use model::{
    CompilationUnit, FileEvent, FileImpact, FileMatch, ImpactLevel, ImpactStatus, UnitId,
    UnitKind, UnknownEvent,
};
pub use resolver::OwnershipResolver;
pub use selector::Selector;
