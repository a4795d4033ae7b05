//! PHP parser built on tree-sitter.
//!
//! Emits namespaces, classes (abstract classes separately), interfaces,
//! traits, enums, functions, methods and properties with visibility,
//! constants and use-imports. Laravel framework classes are recognized from
//! their base class: models, controllers, middleware, migrations, seeders.

use crate::parsing::parser::{
    CommentStyle, ParsedFile, SourceParser, doc_comment_above, leading_modifiers, signature_line,
    visibility_from_modifiers,
};
use crate::parsing::treesitter::{node_first_line, node_range, node_text, query_hits};
use crate::symbol::Symbol;
use crate::types::SymbolKind;
use regex::Regex;
use std::path::Path;
use tree_sitter::{Parser, Query};

const QUERY_SRC: &str = r#"
(namespace_definition name: (namespace_name) @name) @namespace
(class_declaration name: (name) @name) @class
(interface_declaration name: (name) @name) @interface
(trait_declaration name: (name) @name) @trait
(enum_declaration name: (name) @name) @enum
(function_definition name: (name) @name) @function
(method_declaration name: (name) @name) @method
(property_declaration (property_element (variable_name) @name)) @property
(const_declaration (const_element (name) @name)) @constant
(namespace_use_clause) @import
"#;

const MODIFIER_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "static", "abstract", "final", "readonly",
];

pub struct PhpParser {
    parser: Parser,
    query: Query,
    laravel_model: Regex,
    laravel_controller: Regex,
    laravel_middleware: Regex,
    laravel_migration: Regex,
    laravel_seeder: Regex,
}

impl PhpParser {
    pub fn new() -> Result<Self, String> {
        let language: tree_sitter::Language = tree_sitter_php::LANGUAGE_PHP.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| format!("failed to load PHP grammar: {e}"))?;
        let query =
            Query::new(&language, QUERY_SRC).map_err(|e| format!("invalid PHP query: {e}"))?;
        Ok(Self {
            parser,
            query,
            laravel_model: Regex::new(r"class\s+\w+\s+extends\s+(?:Model|Authenticatable)\b")
                .map_err(|e| e.to_string())?,
            laravel_controller: Regex::new(
                r"class\s+\w*Controller\s+extends\s+(?:Controller|BaseController)\b",
            )
            .map_err(|e| e.to_string())?,
            laravel_middleware: Regex::new(r"class\s+\w+\s+implements\s+.*Middleware")
                .map_err(|e| e.to_string())?,
            laravel_migration: Regex::new(r"class\s+\w+\s+extends\s+Migration\b")
                .map_err(|e| e.to_string())?,
            laravel_seeder: Regex::new(r"class\s+\w+\s+extends\s+Seeder\b")
                .map_err(|e| e.to_string())?,
        })
    }

    fn class_kind(&self, decl: &str, modifiers: &[String]) -> SymbolKind {
        if self.laravel_model.is_match(decl) {
            SymbolKind::Model
        } else if self.laravel_controller.is_match(decl) {
            SymbolKind::Controller
        } else if self.laravel_middleware.is_match(decl) {
            SymbolKind::Middleware
        } else if self.laravel_migration.is_match(decl) {
            SymbolKind::Migration
        } else if self.laravel_seeder.is_match(decl) {
            SymbolKind::Seeder
        } else if modifiers.iter().any(|m| m == "abstract") {
            SymbolKind::AbstractClass
        } else {
            SymbolKind::Class
        }
    }
}

impl SourceParser for PhpParser {
    fn language(&self) -> &'static str {
        "php"
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
        let mut namespace: Option<String> = None;

        for hit in query_hits(&self.query, root, content) {
            match hit.capture.as_str() {
                "namespace" => {
                    let Some(name) = hit.name else { continue };
                    namespace = Some(name.clone());
                    if parsed.package.is_none() {
                        parsed.package = Some(name.clone());
                    }
                    parsed.symbols.push(
                        Symbol::new(&name, SymbolKind::Namespace, node_range(&hit.node))
                            .with_signature(format!("namespace {name}")),
                    );
                }
                "import" => {
                    let clause = node_text(&hit.node, content);
                    let import = clause.split(" as ").next().unwrap_or(clause).trim();
                    if !import.is_empty() {
                        parsed.imports.push(import.to_string());
                        parsed.symbols.push(
                            Symbol::new(import, SymbolKind::Import, node_range(&hit.node))
                                .with_signature(format!("use {import}")),
                        );
                    }
                }
                capture => {
                    let Some(name) = hit.name else { continue };
                    let name = name.trim_start_matches('$').to_string();
                    let decl = node_first_line(&hit.node, content);
                    let (modifiers, _rest) = leading_modifiers(decl, MODIFIER_KEYWORDS);

                    let kind = match capture {
                        "class" => self.class_kind(decl, &modifiers),
                        "interface" => SymbolKind::Interface,
                        "trait" => SymbolKind::Trait,
                        "enum" => SymbolKind::Enum,
                        "function" => SymbolKind::Function,
                        "method" => SymbolKind::Method,
                        "property" => SymbolKind::Property,
                        "constant" => SymbolKind::Constant,
                        _ => continue,
                    };

                    let range = node_range(&hit.node);
                    let head = decl.split('{').next().unwrap_or(decl);
                    let mut symbol = Symbol::new(&name, kind, range)
                        .with_signature(signature_line(head))
                        .with_visibility(visibility_from_modifiers(&modifiers))
                        .with_modifiers(modifiers);
                    if let Some(ns) = &namespace {
                        symbol = symbol.with_meta("namespace", ns.clone());
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
        let mut parser = PhpParser::new().unwrap();
        parser.parse(Path::new("index.php"), content)
    }

    fn find<'a>(parsed: &'a ParsedFile, name: &str, kind: SymbolKind) -> &'a Symbol {
        parsed
            .symbols
            .iter()
            .find(|s| s.name == name && s.kind == kind)
            .unwrap_or_else(|| panic!("missing {kind:?} {name} in {:?}", parsed.symbols))
    }

    #[test]
    fn test_namespace_class_method() {
        let parsed = parse(
            "<?php\nnamespace App\\Services;\n\nclass Mailer {\n    private function send(): void {}\n}\n",
        );
        assert_eq!(parsed.package.as_deref(), Some("App\\Services"));
        let class = find(&parsed, "Mailer", SymbolKind::Class);
        assert_eq!(
            class.metadata.get("namespace").and_then(|v| v.as_str()),
            Some("App\\Services")
        );
        let method = find(&parsed, "send", SymbolKind::Method);
        assert_eq!(method.visibility, Visibility::Private);
        assert_eq!(method.kind_label(), "private_method");
    }

    #[test]
    fn test_laravel_model_and_controller() {
        let parsed = parse(
            "<?php\nclass User extends Authenticatable {}\nclass UserController extends Controller {}\n",
        );
        find(&parsed, "User", SymbolKind::Model);
        find(&parsed, "UserController", SymbolKind::Controller);
    }

    #[test]
    fn test_laravel_migration_and_seeder() {
        let parsed = parse(
            "<?php\nclass CreateUsersTable extends Migration {}\nclass UserSeeder extends Seeder {}\n",
        );
        find(&parsed, "CreateUsersTable", SymbolKind::Migration);
        find(&parsed, "UserSeeder", SymbolKind::Seeder);
    }

    #[test]
    fn test_abstract_class_interface_trait() {
        let parsed = parse(
            "<?php\nabstract class Base {}\ninterface Sendable {}\ntrait Loggable {}\n",
        );
        find(&parsed, "Base", SymbolKind::AbstractClass);
        find(&parsed, "Sendable", SymbolKind::Interface);
        find(&parsed, "Loggable", SymbolKind::Trait);
    }

    #[test]
    fn test_property_and_constant() {
        let parsed = parse(
            "<?php\nclass Config {\n    public static $instance;\n    const VERSION = '1.0';\n}\n",
        );
        let property = find(&parsed, "instance", SymbolKind::Property);
        assert!(property.is_static());
        assert_eq!(property.kind_label(), "static_property");
        find(&parsed, "VERSION", SymbolKind::Constant);
    }

    #[test]
    fn test_function_and_use_import() {
        let parsed = parse(
            "<?php\nuse App\\Models\\User;\n\nfunction boot(): void {}\n",
        );
        find(&parsed, "boot", SymbolKind::Function);
        assert_eq!(parsed.imports, vec!["App\\Models\\User"]);
    }
}
