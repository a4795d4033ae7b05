//! JavaScript and TypeScript parser built on tree-sitter.
//!
//! One parser instance carries three grammars (JS, TS, TSX) and picks by
//! extension. Emits classes, functions (including named arrow functions),
//! methods, const/let/var bindings, TypeScript interfaces, type aliases and
//! enums, plus imports. Exported declarations carry an `export` modifier.

use crate::parsing::parser::{
    CommentStyle, ParsedFile, SourceParser, doc_comment_above, leading_modifiers, signature_line,
    visibility_from_modifiers,
};
use crate::parsing::treesitter::{has_ancestor, node_first_line, node_range, query_hits};
use crate::symbol::Symbol;
use crate::types::SymbolKind;
use std::path::Path;
use tree_sitter::{Parser, Query};

const JS_QUERY: &str = r#"
(class_declaration name: (identifier) @name) @class
(function_declaration name: (identifier) @name) @function
(method_definition name: (property_identifier) @name) @method
(lexical_declaration (variable_declarator name: (identifier) @name value: (arrow_function))) @arrow
(lexical_declaration (variable_declarator name: (identifier) @name)) @lexical
(variable_declaration (variable_declarator name: (identifier) @name)) @var
(import_statement) @import
"#;

const TS_QUERY: &str = r#"
(class_declaration name: (type_identifier) @name) @class
(abstract_class_declaration name: (type_identifier) @name) @abstract_class
(function_declaration name: (identifier) @name) @function
(method_definition name: (property_identifier) @name) @method
(lexical_declaration (variable_declarator name: (identifier) @name value: (arrow_function))) @arrow
(lexical_declaration (variable_declarator name: (identifier) @name)) @lexical
(variable_declaration (variable_declarator name: (identifier) @name)) @var
(interface_declaration name: (type_identifier) @name) @interface
(type_alias_declaration name: (type_identifier) @name) @type
(enum_declaration name: (identifier) @name) @enum
(import_statement) @import
"#;

const MODIFIER_KEYWORDS: &[&str] = &[
    "export", "default", "declare", "public", "private", "protected", "static", "readonly",
    "abstract", "async", "const", "let", "var",
];

struct Grammar {
    parser: Parser,
    query: Query,
}

fn grammar(language: tree_sitter::Language, query_src: &str, tag: &str) -> Result<Grammar, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| format!("failed to load {tag} grammar: {e}"))?;
    let query =
        Query::new(&language, query_src).map_err(|e| format!("invalid {tag} query: {e}"))?;
    Ok(Grammar { parser, query })
}

pub struct JavaScriptParser {
    js: Grammar,
    ts: Grammar,
    tsx: Grammar,
}

impl JavaScriptParser {
    pub fn new() -> Result<Self, String> {
        Ok(Self {
            js: grammar(
                tree_sitter_javascript::LANGUAGE.into(),
                JS_QUERY,
                "JavaScript",
            )?,
            ts: grammar(
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                TS_QUERY,
                "TypeScript",
            )?,
            tsx: grammar(tree_sitter_typescript::LANGUAGE_TSX.into(), TS_QUERY, "TSX")?,
        })
    }

    fn grammar_for(&mut self, path: &Path) -> &mut Grammar {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") | Some("mts") | Some("cts") => &mut self.ts,
            Some("tsx") => &mut self.tsx,
            _ => &mut self.js,
        }
    }

    /// Module specifier of an import statement, e.g. `./util` from
    /// `import { x } from "./util";`.
    fn import_source(statement: &str) -> Option<String> {
        let quote = statement.find(['"', '\''])?;
        let rest = &statement[quote + 1..];
        let end = rest.find(['"', '\''])?;
        let source = &rest[..end];
        (!source.is_empty()).then(|| source.to_string())
    }
}

impl SourceParser for JavaScriptParser {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let is_typescript = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ts") | Some("tsx") | Some("mts") | Some("cts")
        );
        let mut parsed = ParsedFile::new(self.language());
        parsed
            .file_metadata
            .insert("dialect".into(), if is_typescript { "typescript" } else { "javascript" }.into());

        let grammar = self.grammar_for(path);
        let Some(tree) = grammar.parser.parse(content, None) else {
            parsed.partial = true;
            return parsed;
        };
        let root = tree.root_node();
        let lines: Vec<&str> = content.lines().collect();

        // (name, start_line) -> index into parsed.symbols, for preferring the
        // more specific classification when patterns overlap (a named arrow
        // function also matches the plain lexical pattern).
        let mut seen: std::collections::HashMap<(String, u32), usize> = std::collections::HashMap::new();

        for hit in query_hits(&grammar.query, root, content) {
            if hit.capture == "import" {
                let statement = node_first_line(&hit.node, content);
                if let Some(source) = Self::import_source(statement) {
                    parsed.imports.push(source.clone());
                    parsed.symbols.push(
                        Symbol::new(&source, SymbolKind::Import, node_range(&hit.node))
                            .with_signature(signature_line(statement)),
                    );
                }
                continue;
            }

            let Some(name) = hit.name else { continue };
            let first_line = node_first_line(&hit.node, content);
            let (mut modifiers, _rest) = leading_modifiers(first_line, MODIFIER_KEYWORDS);
            if has_ancestor(&hit.node, "export_statement", 3)
                && !modifiers.iter().any(|m| m == "export")
            {
                modifiers.push("export".to_string());
            }

            let declaration_kind = match hit.capture.as_str() {
                "class" => SymbolKind::Class,
                "abstract_class" => SymbolKind::AbstractClass,
                "function" | "arrow" => SymbolKind::Function,
                "method" => SymbolKind::Method,
                "interface" => SymbolKind::Interface,
                "type" => SymbolKind::TypeAlias,
                "enum" => SymbolKind::Enum,
                "lexical" => {
                    if first_line.trim_start().starts_with("const")
                        || modifiers.iter().any(|m| m == "const")
                    {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    }
                }
                "var" => SymbolKind::Variable,
                _ => continue,
            };

            let range = node_range(&hit.node);
            let mut symbol = Symbol::new(&name, declaration_kind, range)
                .with_signature(signature_line(first_line))
                .with_visibility(visibility_from_modifiers(&modifiers));
            let retained: Vec<String> = modifiers
                .into_iter()
                .filter(|m| matches!(m.as_str(), "export" | "static" | "abstract" | "async" | "readonly" | "default"))
                .collect();
            if !retained.is_empty() {
                symbol = symbol.with_modifiers(retained);
            }
            let decl_idx = range.start_line as usize - 1;
            if let Some(doc) = doc_comment_above(&lines, decl_idx, CommentStyle::Slash) {
                symbol = symbol.with_doc(doc);
            }

            let key = (name.clone(), range.start_line);
            match seen.get(&key) {
                Some(&idx) => {
                    // Prefer the callable classification over the binding.
                    if parsed.symbols[idx].kind.priority() > declaration_kind.priority() {
                        parsed.symbols[idx] = symbol;
                    }
                }
                None => {
                    seen.insert(key, parsed.symbols.len());
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
