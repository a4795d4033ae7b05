//! Java parser built on tree-sitter.
//!
//! Emits classes, interfaces, enums, annotations, methods (with visibility
//! and static/abstract modifiers), constructors and fields. Annotation
//! usages are recorded once per name.

use crate::parsing::parser::{
    CommentStyle, ParsedFile, SourceParser, doc_comment_above, leading_modifiers, signature_line,
    visibility_from_modifiers,
};
use crate::parsing::treesitter::{node_range, node_text, query_hits};
use crate::symbol::Symbol;
use crate::types::SymbolKind;
use std::collections::HashSet;
use std::path::Path;
use tree_sitter::{Node, Parser, Query};

const QUERY_SRC: &str = r#"
(class_declaration name: (identifier) @name) @class
(interface_declaration name: (identifier) @name) @interface
(enum_declaration name: (identifier) @name) @enum
(annotation_type_declaration name: (identifier) @name) @annotation
(method_declaration name: (identifier) @name) @method
(constructor_declaration name: (identifier) @name) @constructor
(field_declaration declarator: (variable_declarator name: (identifier) @name)) @field
(package_declaration) @package
(import_declaration) @import
(marker_annotation name: (identifier) @name) @annotation_use
(annotation name: (identifier) @name) @annotation_use
"#;

const MODIFIER_KEYWORDS: &[&str] = &[
    "public",
    "private",
    "protected",
    "static",
    "abstract",
    "final",
    "synchronized",
    "native",
    "transient",
    "volatile",
    "default",
    "strictfp",
];

pub struct JavaParser {
    parser: Parser,
    query: Query,
}

impl JavaParser {
    pub fn new() -> Result<Self, String> {
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| format!("failed to load Java grammar: {e}"))?;
        let query =
            Query::new(&language, QUERY_SRC).map_err(|e| format!("invalid Java query: {e}"))?;
        Ok(Self { parser, query })
    }

    /// Declaration line of a node: the first line that is not an annotation,
    /// since tree-sitter folds leading annotations into the declaration span.
    fn decl_line<'a>(node: &Node, content: &'a str) -> &'a str {
        node_text(node, content)
            .lines()
            .find(|line| !line.trim_start().starts_with('@'))
            .unwrap_or("")
    }

    fn statement_path(node: &Node, content: &str) -> Option<String> {
        // "package com.acme.widget;" / "import java.util.List;"
        let text = node_text(node, content);
        let path = text
            .split_whitespace()
            .nth(1)?
            .trim_end_matches(';')
            .to_string();
        (!path.is_empty()).then_some(path)
    }
}

impl SourceParser for JavaParser {
    fn language(&self) -> &'static str {
        "java"
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
        let mut seen_annotations: HashSet<String> = HashSet::new();

        for hit in query_hits(&self.query, root, content) {
            match hit.capture.as_str() {
                "package" => {
                    if let Some(package) = Self::statement_path(&hit.node, content) {
                        parsed.symbols.push(
                            Symbol::new(&package, SymbolKind::Package, node_range(&hit.node))
                                .with_signature(format!("package {package}")),
                        );
                        parsed.package = Some(package);
                    }
                }
                "import" => {
                    if let Some(import) = Self::statement_path(&hit.node, content) {
                        // `import static a.b.C` puts the path third.
                        let import = if import == "static" {
                            match node_text(&hit.node, content)
                                .split_whitespace()
                                .nth(2)
                                .map(|s| s.trim_end_matches(';').to_string())
                            {
                                Some(p) => p,
                                None => continue,
                            }
                        } else {
                            import
                        };
                        parsed.imports.push(import.clone());
                        parsed.symbols.push(
                            Symbol::new(&import, SymbolKind::Import, node_range(&hit.node))
                                .with_signature(format!("import {import}")),
                        );
                    }
                }
                "annotation_use" => {
                    let Some(name) = hit.name else { continue };
                    if !seen_annotations.insert(name.clone()) {
                        continue;
                    }
                    parsed.symbols.push(
                        Symbol::new(&name, SymbolKind::Annotation, node_range(&hit.node))
                            .with_signature(format!("@{name}")),
                    );
                }
                capture => {
                    let Some(name) = hit.name else { continue };
                    let kind = match capture {
                        "class" => SymbolKind::Class,
                        "interface" => SymbolKind::Interface,
                        "enum" => SymbolKind::Enum,
                        "annotation" => SymbolKind::Annotation,
                        "method" => SymbolKind::Method,
                        "constructor" => SymbolKind::Constructor,
                        "field" => SymbolKind::Field,
                        _ => continue,
                    };

                    let decl = Self::decl_line(&hit.node, content);
                    // Cut the body opener (and a dangling initializer `=`)
                    // off the signature.
                    let decl = decl
                        .split('{')
                        .next()
                        .unwrap_or(decl)
                        .trim_end()
                        .trim_end_matches('=')
                        .trim_end();
                    let (modifiers, _rest) = leading_modifiers(decl, MODIFIER_KEYWORDS);
                    let kind = if kind == SymbolKind::Class
                        && modifiers.iter().any(|m| m == "abstract")
                    {
                        SymbolKind::AbstractClass
                    } else {
                        kind
                    };

                    let range = node_range(&hit.node);
                    let mut symbol = Symbol::new(&name, kind, range)
                        .with_signature(signature_line(decl))
                        .with_visibility(visibility_from_modifiers(&modifiers))
                        .with_modifiers(modifiers);
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
        let mut parser = JavaParser::new().unwrap();
        parser.parse(Path::new("Widget.java"), content)
    }

    fn find<'a>(parsed: &'a ParsedFile, name: &str, kind: SymbolKind) -> &'a Symbol {
        parsed
            .symbols
            .iter()
            .find(|s| s.name == name && s.kind == kind)
            .unwrap_or_else(|| panic!("missing {kind:?} {name} in {:?}", parsed.symbols))
    }

    #[test]
    fn test_class_method_field() {
        let parsed = parse(
            "package com.acme;\n\npublic class Widget {\n    private int size;\n\n    public int getSize() {\n        return size;\n    }\n}\n",
        );
        assert_eq!(parsed.package.as_deref(), Some("com.acme"));
        let class = find(&parsed, "Widget", SymbolKind::Class);
        assert_eq!(class.range.start_line, 3);

        let field = find(&parsed, "size", SymbolKind::Field);
        assert_eq!(field.visibility, Visibility::Private);
        assert_eq!(field.kind_label(), "private_field");

        let method = find(&parsed, "getSize", SymbolKind::Method);
        assert_eq!(method.visibility, Visibility::Public);
    }

    #[test]
    fn test_static_method_folds_label() {
        let parsed = parse("class A {\n    public static void main(String[] args) {}\n}\n");
        let method = find(&parsed, "main", SymbolKind::Method);
        assert!(method.is_static());
        assert_eq!(method.kind_label(), "static_method");
    }

    #[test]
    fn test_constructor_is_not_a_method() {
        let parsed = parse("class Widget {\n    public Widget() {}\n}\n");
        find(&parsed, "Widget", SymbolKind::Class);
        find(&parsed, "Widget", SymbolKind::Constructor);
        assert!(
            !parsed
                .symbols
                .iter()
                .any(|s| s.name == "Widget" && s.kind == SymbolKind::Method)
        );
    }

    #[test]
    fn test_interface_enum_annotation() {
        let parsed = parse(
            "interface Runner {}\nenum Color { RED }\n@interface Marker {}\n",
        );
        find(&parsed, "Runner", SymbolKind::Interface);
        find(&parsed, "Color", SymbolKind::Enum);
        find(&parsed, "Marker", SymbolKind::Annotation);
    }

    #[test]
    fn test_abstract_class() {
        let parsed = parse("public abstract class Base {}\n");
        find(&parsed, "Base", SymbolKind::AbstractClass);
    }

    #[test]
    fn test_annotation_usage_deduplicated() {
        let parsed = parse(
            "class A {\n    @Override\n    public String toString() { return \"\"; }\n    @Override\n    public int hashCode() { return 0; }\n}\n",
        );
        let overrides: Vec<_> = parsed
            .symbols
            .iter()
            .filter(|s| s.name == "Override" && s.kind == SymbolKind::Annotation)
            .collect();
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn test_annotated_method_signature_skips_annotation() {
        let parsed = parse(
            "class A {\n    @Override\n    public String toString() { return \"\"; }\n}\n",
        );
        let method = find(&parsed, "toString", SymbolKind::Method);
        assert_eq!(method.signature.as_deref(), Some("public String toString()"));
    }

    #[test]
    fn test_imports_including_static() {
        let parsed = parse(
            "import java.util.List;\nimport static java.util.Objects.requireNonNull;\nclass A {}\n",
        );
        assert_eq!(
            parsed.imports,
            vec!["java.util.List", "java.util.Objects.requireNonNull"]
        );
    }

    #[test]
    fn test_javadoc() {
        let parsed = parse(
            "class A {\n    /**\n     * Computes the answer.\n     */\n    public int answer() { return 42; }\n}\n",
        );
        let method = find(&parsed, "answer", SymbolKind::Method);
        assert!(
            method
                .documentation
                .as_deref()
                .unwrap()
                .contains("Computes the answer.")
        );
    }
}
