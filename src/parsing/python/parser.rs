//! Python parser built on tree-sitter.
//!
//! Emits module, class, function, method, decorator, variable and import
//! symbols. Functions nested inside a class body are classified as methods;
//! a single leading underscore marks private visibility (dunder names stay
//! public). Docstrings become the symbol documentation.

use crate::parsing::parser::{ParsedFile, SourceParser, signature_line};
use crate::parsing::treesitter::{has_ancestor, node_first_line, node_range, node_text, query_hits};
use crate::symbol::Symbol;
use crate::types::{Range, SymbolKind, Visibility};
use std::path::Path;
use tree_sitter::{Node, Parser, Query};

const QUERY_SRC: &str = r#"
(class_definition name: (identifier) @name) @class
(function_definition name: (identifier) @name) @function
(decorator) @decorator
(module (expression_statement (assignment left: (identifier) @name) @variable))
(import_statement) @import
(import_from_statement) @import_from
"#;

pub struct PythonParser {
    parser: Parser,
    query: Query,
}

impl PythonParser {
    pub fn new() -> Result<Self, String> {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| format!("failed to load Python grammar: {e}"))?;
        let query = Query::new(&language, QUERY_SRC)
            .map_err(|e| format!("invalid Python query: {e}"))?;
        Ok(Self { parser, query })
    }

    /// First statement of a definition body when it is a string literal.
    fn docstring(node: &Node, content: &str) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let raw = node_text(&string, content);
        let trimmed = raw
            .trim_start_matches(['r', 'b', 'u', 'f', 'R', 'B', 'U', 'F'])
            .trim_start_matches("\"\"\"")
            .trim_start_matches("'''")
            .trim_start_matches('"')
            .trim_start_matches('\'')
            .trim_end_matches("\"\"\"")
            .trim_end_matches("'''")
            .trim_end_matches('"')
            .trim_end_matches('\'');
        let doc = trimmed.trim().to_string();
        (!doc.is_empty()).then_some(doc)
    }

    fn visibility_of(name: &str) -> Visibility {
        let dunder = name.starts_with("__") && name.ends_with("__");
        if name.starts_with('_') && !dunder {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    /// Decorator name: the text after `@`, up to the first call parenthesis.
    fn decorator_name(text: &str) -> String {
        text.trim_start_matches('@')
            .split('(')
            .next()
            .unwrap_or("")
            .trim()
            .to_string()
    }

    fn collect_imports(statement: &str, imports: &mut Vec<String>) {
        let statement = statement.trim();
        if let Some(rest) = statement.strip_prefix("from ") {
            let mut parts = rest.splitn(2, " import ");
            let module = parts.next().unwrap_or("").trim();
            let names = parts.next().unwrap_or("").trim();
            for name in names.split(',') {
                let name = name.split(" as ").next().unwrap_or("").trim();
                if !name.is_empty() && !module.is_empty() {
                    imports.push(format!("{module}.{name}"));
                }
            }
        } else if let Some(rest) = statement.strip_prefix("import ") {
            for name in rest.split(',') {
                let name = name.split(" as ").next().unwrap_or("").trim();
                if !name.is_empty() {
                    imports.push(name.to_string());
                }
            }
        }
    }
}

impl SourceParser for PythonParser {
    fn language(&self) -> &'static str {
        "python"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let mut parsed = ParsedFile::new(self.language());
        if content.trim().is_empty() {
            return parsed;
        }

        let Some(tree) = self.parser.parse(content, None) else {
            parsed.partial = true;
            return parsed;
        };
        let root = tree.root_node();

        // Module symbol spanning the whole file.
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");
        let line_count = content.lines().count().max(1) as u32;
        let mut module_symbol = Symbol::new(stem, SymbolKind::Module, Range::new(1, 0, line_count, 0))
            .with_signature(format!("module {stem}"));
        if let Some(doc) = Self::docstring(&root, content) {
            module_symbol = module_symbol.with_doc(doc);
        }
        parsed.symbols.push(module_symbol);

        for hit in query_hits(&self.query, root, content) {
            match hit.capture.as_str() {
                "class" => {
                    let Some(name) = hit.name else { continue };
                    let mut symbol = Symbol::new(&name, SymbolKind::Class, node_range(&hit.node))
                        .with_signature(signature_line(node_first_line(&hit.node, content)))
                        .with_visibility(Self::visibility_of(&name));
                    if let Some(doc) = Self::docstring(&hit.node, content) {
                        symbol = symbol.with_doc(doc);
                    }
                    parsed.symbols.push(symbol);
                }
                "function" => {
                    let Some(name) = hit.name else { continue };
                    let kind = if has_ancestor(&hit.node, "class_definition", 32) {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    let mut symbol = Symbol::new(&name, kind, node_range(&hit.node))
                        .with_signature(signature_line(node_first_line(&hit.node, content)))
                        .with_visibility(Self::visibility_of(&name));
                    if let Some(doc) = Self::docstring(&hit.node, content) {
                        symbol = symbol.with_doc(doc);
                    }
                    parsed.symbols.push(symbol);
                }
                "decorator" => {
                    let name = Self::decorator_name(node_text(&hit.node, content));
                    if name.is_empty() {
                        continue;
                    }
                    parsed.symbols.push(
                        Symbol::new(&name, SymbolKind::Decorator, node_range(&hit.node))
                            .with_signature(format!("@{name}")),
                    );
                }
                "variable" => {
                    let Some(name) = hit.name else { continue };
                    let kind = if name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
                        && name.chars().any(|c| c.is_ascii_uppercase())
                    {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    };
                    parsed.symbols.push(
                        Symbol::new(&name, kind, node_range(&hit.node))
                            .with_signature(signature_line(node_first_line(&hit.node, content)))
                            .with_visibility(Self::visibility_of(&name)),
                    );
                }
                "import" | "import_from" => {
                    let statement = node_first_line(&hit.node, content);
                    let before = parsed.imports.len();
                    Self::collect_imports(statement, &mut parsed.imports);
                    for import in parsed.imports[before..].to_vec() {
                        parsed.symbols.push(
                            Symbol::new(&import, SymbolKind::Import, node_range(&hit.node))
                                .with_signature(signature_line(statement)),
                        );
                    }
                }
                _ => {}
            }
        }

        if root.has_error() {
            parsed.partial = true;
        }
        parsed
    }
}
