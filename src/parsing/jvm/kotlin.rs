//! Kotlin parser built on tree-sitter.
//!
//! Emits classes (data/sealed/value/enum/annotation variants recorded as
//! modifiers), interfaces, objects, functions and methods, extension
//! functions rendered as `Receiver.method`, properties with their declared
//! type, and type aliases.

use crate::parsing::parser::{
    CommentStyle, ParsedFile, SourceParser, doc_comment_above, leading_modifiers,
    visibility_from_modifiers,
};
use crate::parsing::treesitter::{has_ancestor, node_range, node_text, query_hits};
use crate::symbol::Symbol;
use crate::types::SymbolKind;
use regex::Regex;
use std::path::Path;
use tree_sitter::{Node, Parser, Query};

const QUERY_SRC: &str = r#"
(class_declaration (identifier) @name) @class
(object_declaration (identifier) @name) @object
(function_declaration (identifier) @name) @function
(property_declaration (variable_declaration (identifier) @name)) @property
(type_alias (identifier) @name) @type
(package_header (qualified_identifier) @name) @package
(import (qualified_identifier) @name) @import
"#;

const MODIFIER_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "internal", "open", "abstract", "final", "sealed", "data",
    "inner", "inline", "value", "suspend", "operator", "infix", "tailrec", "override", "const",
    "lateinit", "external", "expect", "actual", "companion",
];

pub struct KotlinParser {
    parser: Parser,
    query: Query,
    extension_fn: Regex,
    property_type: Regex,
}

impl KotlinParser {
    pub fn new() -> Result<Self, String> {
        let language: tree_sitter::Language = tree_sitter_kotlin_ng::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| format!("failed to load Kotlin grammar: {e}"))?;
        let query =
            Query::new(&language, QUERY_SRC).map_err(|e| format!("invalid Kotlin query: {e}"))?;
        Ok(Self {
            parser,
            query,
            extension_fn: Regex::new(r"fun\s+(?:<[^>]*>\s+)?([\w.]+(?:<[^>]*>)?)\.(\w+)\s*\(")
                .map_err(|e| e.to_string())?,
            property_type: Regex::new(r"(?:val|var)\s+\w+\s*:\s*([^={\n]+)")
                .map_err(|e| e.to_string())?,
        })
    }

    /// First line of the declaration, skipping annotation lines.
    fn decl_line<'a>(node: &Node, content: &'a str) -> &'a str {
        node_text(node, content)
            .lines()
            .find(|line| !line.trim_start().starts_with('@'))
            .unwrap_or("")
    }

    /// Signature without the body: cut at the block opener, and for
    /// expression bodies at the `=` following the parameter list.
    fn signature_of(decl: &str) -> String {
        let head = decl.split('{').next().unwrap_or(decl);

        // Find where the parameter list closes (depth back to zero), then
        // cut at an expression-body `=` after it. A `=` inside the list is
        // a default argument and stays.
        let mut depth = 0usize;
        let mut params_end = None;
        for (idx, c) in head.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && params_end.is_none() {
                        params_end = Some(idx);
                    }
                }
                _ => {}
            }
        }
        let cut = match params_end {
            Some(paren) => match head[paren..].find('=') {
                Some(eq) => &head[..paren + eq],
                None => head,
            },
            None => head,
        };
        cut.trim().to_string()
    }

    fn class_kind(decl: &str, modifiers: &[String]) -> SymbolKind {
        let head = decl.trim_start();
        if head.contains("interface ") {
            SymbolKind::Interface
        } else if modifiers.iter().any(|m| m == "enum")
            || head.starts_with("enum ")
            || head.contains("enum class ")
        {
            SymbolKind::Enum
        } else if head.contains("annotation class ") {
            SymbolKind::Annotation
        } else if modifiers.iter().any(|m| m == "abstract") {
            SymbolKind::AbstractClass
        } else {
            SymbolKind::Class
        }
    }
}

impl SourceParser for KotlinParser {
    fn language(&self) -> &'static str {
        "kotlin"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let _ = path;
        let mut parsed = ParsedFile::new(self.language());

        let Some(tree) = self.parser.parse(content, None) else {
            parsed.partial = true;
            return parsed;
        };
        let root = tree.root_node();
        let lines: Vec<&str> = content.lines().collect();

        for hit in query_hits(&self.query, root, content) {
            match hit.capture.as_str() {
                "package" => {
                    let Some(name) = hit.name else { continue };
                    parsed.package = Some(name.clone());
                    parsed.symbols.push(
                        Symbol::new(&name, SymbolKind::Package, node_range(&hit.node))
                            .with_signature(format!("package {name}")),
                    );
                }
                "import" => {
                    let Some(name) = hit.name else { continue };
                    parsed.imports.push(name.clone());
                    parsed.symbols.push(
                        Symbol::new(&name, SymbolKind::Import, node_range(&hit.node))
                            .with_signature(format!("import {name}")),
                    );
                }
                capture => {
                    let Some(mut name) = hit.name else { continue };
                    let decl = Self::decl_line(&hit.node, content);
                    let (modifiers, _rest) = leading_modifiers(decl, MODIFIER_KEYWORDS);
                    let in_type_body =
                        has_ancestor(&hit.node, "class_body", 16) || has_ancestor(&hit.node, "enum_class_body", 16);

                    let mut metadata_receiver = None;
                    let kind = match capture {
                        "class" => Self::class_kind(decl, &modifiers),
                        "object" => SymbolKind::Object,
                        "type" => SymbolKind::TypeAlias,
                        "property" => SymbolKind::Property,
                        "function" => {
                            if let Some(captures) = self.extension_fn.captures(decl) {
                                let receiver = captures[1].to_string();
                                name = format!("{receiver}.{}", &captures[2]);
                                metadata_receiver = Some(receiver);
                                SymbolKind::Extension
                            } else if in_type_body {
                                SymbolKind::Method
                            } else {
                                SymbolKind::Function
                            }
                        }
                        _ => continue,
                    };

                    let range = node_range(&hit.node);
                    let mut symbol = Symbol::new(&name, kind, range)
                        .with_signature(Self::signature_of(decl))
                        .with_visibility(visibility_from_modifiers(&modifiers))
                        .with_modifiers(modifiers);
                    if let Some(receiver) = metadata_receiver {
                        symbol = symbol.with_meta("receiver", receiver);
                    }
                    if kind == SymbolKind::Property {
                        if let Some(captures) = self.property_type.captures(decl) {
                            symbol = symbol.with_meta("type", captures[1].trim());
                        }
                    }
                    let decl_idx = range.start_line as usize - 1;
                    if let Some(doc) = doc_comment_above(&lines, decl_idx, CommentStyle::Slash) {
                        symbol = symbol.with_doc(doc);
                    }
                    parsed.symbols.push(symbol);
                }
            }
        }

        if root.has_error() {
            parsed.partial = true;
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;

    fn parse(content: &str) -> ParsedFile {
        let mut parser = KotlinParser::new().unwrap();
        parser.parse(Path::new("App.kt"), content)
    }

    fn find<'a>(parsed: &'a ParsedFile, name: &str, kind: SymbolKind) -> &'a Symbol {
        parsed
            .symbols
            .iter()
            .find(|s| s.name == name && s.kind == kind)
            .unwrap_or_else(|| panic!("missing {kind:?} {name} in {:?}", parsed.symbols))
    }

    #[test]
    fn test_extension_function() {
        let parsed = parse("fun String.isPalindrome(): Boolean = this == this.reversed()\n");
        let ext = find(&parsed, "String.isPalindrome", SymbolKind::Extension);
        assert_eq!(
            ext.metadata.get("receiver").and_then(|v| v.as_str()),
            Some("String")
        );
        assert_eq!(
            ext.signature.as_deref(),
            Some("fun String.isPalindrome(): Boolean")
        );
        assert_eq!(ext.range.start_line, 1);
    }

    #[test]
    fn test_data_class_modifier() {
        let parsed = parse("data class Point(val x: Int, val y: Int)\n");
        let class = find(&parsed, "Point", SymbolKind::Class);
        assert!(class.modifiers.iter().any(|m| m == "data"));
    }

    #[test]
    fn test_sealed_and_value_class() {
        let parsed = parse("sealed class Shape\n\n@JvmInline\nvalue class Meters(val value: Double)\n");
        assert!(
            find(&parsed, "Shape", SymbolKind::Class)
                .modifiers
                .iter()
                .any(|m| m == "sealed")
        );
        assert!(
            find(&parsed, "Meters", SymbolKind::Class)
                .modifiers
                .iter()
                .any(|m| m == "value")
        );
    }

    #[test]
    fn test_object_declaration() {
        let parsed = parse("object Registry {\n    fun lookup(id: Int): String = \"\"\n}\n");
        find(&parsed, "Registry", SymbolKind::Object);
        find(&parsed, "lookup", SymbolKind::Method);
    }

    #[test]
    fn test_interface_detection() {
        let parsed = parse("interface Repository {\n    fun load(id: Int)\n}\n");
        find(&parsed, "Repository", SymbolKind::Interface);
    }

    #[test]
    fn test_property_with_type() {
        let parsed = parse("val timeout: Long = 30\n");
        let property = find(&parsed, "timeout", SymbolKind::Property);
        assert_eq!(
            property.metadata.get("type").and_then(|v| v.as_str()),
            Some("Long")
        );
    }

    #[test]
    fn test_internal_visibility() {
        let parsed = parse("internal fun helper() {}\n");
        assert_eq!(
            find(&parsed, "helper", SymbolKind::Function).visibility,
            Visibility::Internal
        );
    }

    #[test]
    fn test_package_and_imports() {
        let parsed = parse("package com.acme.app\n\nimport kotlin.math.abs\n\nfun main() {}\n");
        assert_eq!(parsed.package.as_deref(), Some("com.acme.app"));
        assert_eq!(parsed.imports, vec!["kotlin.math.abs"]);
        find(&parsed, "main", SymbolKind::Function);
    }

    #[test]
    fn test_top_level_function_is_function() {
        let parsed = parse("fun compute(): Int = 1\n");
        find(&parsed, "compute", SymbolKind::Function);
    }
}
