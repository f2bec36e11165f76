//! Go source trees: module discovery, build constraints, tree-sitter facts
//! and the catalog provider the dependency cache is fed from

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod module;
pub mod parser;
pub mod validator;

#[cfg(test)]
pub mod tests;

pub use catalog::GoCatalog;
pub use config::{ConfigError, Settings};
pub use constraint::BuildContext;
pub use module::GoModule;
pub use parser::{GoFileFacts, GoParser};
pub use validator::GoFileValidator;
