//! Per-file facts from tree-sitter-go: package clause, imports, syntax errors

use std::path::Path;
use tree_sitter::{Language, LanguageError, Node, Parser};

/// What the catalog needs to know about one Go source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoFileFacts {
    /// Name from the package clause, if one was found
    pub package: Option<String>,
    /// Import paths in source order, duplicates removed
    pub imports: Vec<String>,
    /// Tree contains ERROR or MISSING nodes
    pub has_error: bool,
}

impl GoFileFacts {
    /// `package x_test` files form a separate package.
    pub fn is_external_test(&self) -> bool {
        self.package.as_deref().is_some_and(|p| p.ends_with("_test"))
    }
}

pub fn go_language() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

/// Wraps one tree-sitter parser configured for Go.
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, LanguageError> {
        let mut parser = Parser::new();
        parser.set_language(&go_language())?;
        Ok(Self { parser })
    }

    /// Parse source text. `None` only when tree-sitter gives up entirely.
    pub fn parse(&mut self, source: &str) -> Option<GoFileFacts> {
        let tree = self.parser.parse(source, None)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut facts = GoFileFacts {
            has_error: root.has_error(),
            ..Default::default()
        };
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    if facts.package.is_none() {
                        facts.package = package_name(child, bytes);
                    }
                }
                "import_declaration" => collect_imports(child, bytes, &mut facts.imports),
                _ => {}
            }
        }
        Some(facts)
    }

    /// Read and parse a file from disk.
    pub fn parse_file(&mut self, path: &Path) -> std::io::Result<Option<GoFileFacts>> {
        let source = std::fs::read_to_string(path)?;
        Ok(self.parse(&source))
    }
}

fn package_name(clause: Node, source: &[u8]) -> Option<String> {
    let mut cursor = clause.walk();
    let name = clause
        .children(&mut cursor)
        .find(|c| c.kind() == "package_identifier")?;
    name.utf8_text(source).ok().map(str::to_string)
}

fn collect_imports(node: Node, source: &[u8], out: &mut Vec<String>) {
    if node.kind() == "import_spec" {
        if let Some(path) = node.child_by_field_name("path").and_then(|p| literal(p, source)) {
            if !out.contains(&path) {
                out.push(path);
            }
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_imports(child, source, out);
    }
}

/// Contents of an interpreted or raw string literal.
fn literal(node: Node, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('`').and_then(|t| t.strip_suffix('`')))?;
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}
