//! Go parser built on tree-sitter.
//!
//! Emits package, function, method (with receiver type), struct, interface,
//! type, constant and variable symbols. Unexported identifiers (lowercase
//! initial) are recorded as private.

use crate::parsing::parser::{
    CommentStyle, ParsedFile, SourceParser, doc_comment_above, signature_line,
};
use crate::parsing::treesitter::{node_first_line, node_range, node_text, query_hits};
use crate::symbol::Symbol;
use crate::types::{SymbolKind, Visibility};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Parser, Query};

const QUERY_SRC: &str = r#"
(package_clause (package_identifier) @name) @package
(function_declaration name: (identifier) @name) @function
(method_declaration name: (field_identifier) @name) @method
(type_declaration (type_spec name: (type_identifier) @name type: (struct_type))) @struct
(type_declaration (type_spec name: (type_identifier) @name type: (interface_type))) @interface
(type_declaration (type_spec name: (type_identifier) @name)) @type
(const_declaration (const_spec name: (identifier) @name)) @const
(var_declaration (var_spec name: (identifier) @name)) @var
(import_spec) @import
"#;

pub struct GoParser {
    parser: Parser,
    query: Query,
}

impl GoParser {
    pub fn new() -> Result<Self, String> {
        let language: tree_sitter::Language = tree_sitter_go::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| format!("failed to load Go grammar: {e}"))?;
        let query =
            Query::new(&language, QUERY_SRC).map_err(|e| format!("invalid Go query: {e}"))?;
        Ok(Self { parser, query })
    }

    fn visibility_of(name: &str) -> Visibility {
        if name.chars().next().is_some_and(|c| c.is_lowercase()) {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    /// Receiver type name from `(s *Server)`.
    fn receiver_type(receiver: &str) -> Option<String> {
        let inner = receiver.trim().trim_start_matches('(').trim_end_matches(')');
        let type_token = inner.split_whitespace().last()?;
        let name = type_token.trim_start_matches('*').trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl SourceParser for GoParser {
    fn language(&self) -> &'static str {
        "go"
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
        let mut seen: HashMap<(String, u32), usize> = HashMap::new();

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
                    // `"fmt"` or `alias "path"`: the path sits between the
                    // first pair of quotes either way.
                    let text = node_text(&hit.node, content);
                    let import = text.split('"').nth(1).unwrap_or("").to_string();
                    if !import.is_empty() {
                        parsed.imports.push(import.clone());
                        parsed.symbols.push(
                            Symbol::new(&import, SymbolKind::Import, node_range(&hit.node))
                                .with_signature(format!("import \"{import}\"")),
                        );
                    }
                }
                capture => {
                    let Some(name) = hit.name else { continue };
                    let kind = match capture {
                        "function" => SymbolKind::Function,
                        "method" => SymbolKind::Method,
                        "struct" => SymbolKind::Struct,
                        "interface" => SymbolKind::Interface,
                        "type" => SymbolKind::TypeAlias,
                        "const" => SymbolKind::Constant,
                        "var" => SymbolKind::Variable,
                        _ => continue,
                    };

                    let range = node_range(&hit.node);
                    let mut symbol = Symbol::new(&name, kind, range)
                        .with_signature(signature_line(node_first_line(&hit.node, content)))
                        .with_visibility(Self::visibility_of(&name));

                    if kind == SymbolKind::Method {
                        if let Some(receiver) = hit
                            .node
                            .child_by_field_name("receiver")
                            .map(|r| node_text(&r, content).to_string())
                            .and_then(|r| Self::receiver_type(&r))
                        {
                            symbol = symbol.with_meta("receiver", receiver);
                        }
                    }

                    let decl_idx = range.start_line as usize - 1;
                    if let Some(doc) = doc_comment_above(&lines, decl_idx, CommentStyle::Slash) {
                        symbol = symbol.with_doc(doc);
                    }

                    // A struct/interface type_spec also matches the generic
                    // type pattern; keep the more specific classification.
                    let key = (name.clone(), range.start_line);
                    match seen.get(&key) {
                        Some(&idx) => {
                            if parsed.symbols[idx].kind.priority() > kind.priority()
                                || parsed.symbols[idx].kind == SymbolKind::TypeAlias
                            {
                                parsed.symbols[idx] = symbol;
                            }
                        }
                        None => {
                            seen.insert(key, parsed.symbols.len());
                            parsed.symbols.push(symbol);
                        }
                    }
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

    fn parse(content: &str) -> ParsedFile {
        let mut parser = GoParser::new().unwrap();
        parser.parse(Path::new("main.go"), content)
    }

    fn find<'a>(parsed: &'a ParsedFile, name: &str, kind: SymbolKind) -> &'a Symbol {
        parsed
            .symbols
            .iter()
            .find(|s| s.name == name && s.kind == kind)
            .unwrap_or_else(|| panic!("missing {kind:?} {name} in {:?}", parsed.symbols))
    }

    #[test]
    fn test_package_and_function() {
        let parsed = parse("package main\n\nfunc Run() error {\n\treturn nil\n}\n");
        assert_eq!(parsed.package.as_deref(), Some("main"));
        find(&parsed, "main", SymbolKind::Package);
        let function = find(&parsed, "Run", SymbolKind::Function);
        assert_eq!(function.range.start_line, 3);
        assert_eq!(function.visibility, Visibility::Public);
    }

    #[test]
    fn test_struct_beats_generic_type_pattern() {
        let parsed = parse("package main\n\ntype Server struct {\n\taddr string\n}\n");
        find(&parsed, "Server", SymbolKind::Struct);
        assert!(
            !parsed
                .symbols
                .iter()
                .any(|s| s.name == "Server" && s.kind == SymbolKind::TypeAlias)
        );
    }

    #[test]
    fn test_interface_and_alias() {
        let parsed = parse("package main\n\ntype Reader interface {\n\tRead() error\n}\n\ntype Meters int\n");
        find(&parsed, "Reader", SymbolKind::Interface);
        find(&parsed, "Meters", SymbolKind::TypeAlias);
    }

    #[test]
    fn test_method_receiver() {
        let parsed = parse("package main\n\nfunc (s *Server) Start() error {\n\treturn nil\n}\n");
        let method = find(&parsed, "Start", SymbolKind::Method);
        assert_eq!(
            method.metadata.get("receiver").and_then(|v| v.as_str()),
            Some("Server")
        );
    }

    #[test]
    fn test_unexported_is_private() {
        let parsed = parse("package main\n\nfunc helper() {}\n");
        assert_eq!(
            find(&parsed, "helper", SymbolKind::Function).visibility,
            Visibility::Private
        );
    }

    #[test]
    fn test_const_var_and_imports() {
        let parsed = parse(
            "package main\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/rs/zerolog\"\n)\n\nconst Limit = 10\n\nvar counter int\n",
        );
        find(&parsed, "Limit", SymbolKind::Constant);
        find(&parsed, "counter", SymbolKind::Variable);
        assert_eq!(parsed.imports, vec!["fmt", "github.com/rs/zerolog"]);
    }

    #[test]
    fn test_doc_comment() {
        let parsed = parse("package main\n\n// Run starts the loop.\nfunc Run() {}\n");
        assert_eq!(
            find(&parsed, "Run", SymbolKind::Function).documentation.as_deref(),
            Some("Run starts the loop.")
        );
    }
}
