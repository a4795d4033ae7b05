//! Ruby parser.
//!
//! Regex-driven extraction with indentation tracking for spans. Emits
//! classes and modules (Rails models and controllers recognized from the
//! superclass), instance and class methods with section visibility
//! (`private` / `protected` markers), constants, requires, and the methods
//! generated by common metaprogramming macros (`attr_*`, `scope`,
//! `validates`, associations).

use crate::parsing::parser::{
    CommentStyle, ParsedFile, SourceParser, doc_comment_above, indent_span, signature_line,
};
use crate::symbol::Symbol;
use crate::types::{Range, SymbolKind, Visibility};
use regex::Regex;
use std::path::Path;

pub struct RubyParser {
    class_def: Regex,
    module_def: Regex,
    method_def: Regex,
    constant_def: Regex,
    require_line: Regex,
    attr_macro: Regex,
    single_symbol_macro: Regex,
    association_macro: Regex,
    gem_dependency: Regex,
    symbol_list: Regex,
}

impl RubyParser {
    pub fn new() -> Self {
        Self {
            class_def: Regex::new(r"^\s*class\s+([A-Z]\w*)(?:\s*<\s*([\w:]+))?").expect("static regex"),
            module_def: Regex::new(r"^\s*module\s+([A-Z]\w*)").expect("static regex"),
            method_def: Regex::new(r"^\s*def\s+(self\.)?(\w+[?!=]?)").expect("static regex"),
            constant_def: Regex::new(r"^\s*([A-Z][A-Z0-9_]*)\s*=").expect("static regex"),
            require_line: Regex::new(r#"^\s*require(?:_relative)?\s+['"]([^'"]+)['"]"#)
                .expect("static regex"),
            attr_macro: Regex::new(r"^\s*attr_(accessor|reader|writer)\s+(.+)$").expect("static regex"),
            single_symbol_macro: Regex::new(r"^\s*(scope|validates)\s+:(\w+)").expect("static regex"),
            association_macro: Regex::new(r"^\s*(belongs_to|has_many|has_one)\s+:(\w+)")
                .expect("static regex"),
            gem_dependency: Regex::new(
                r#"\.add(?:_development|_runtime)?_dependency\s*\(?\s*['"]([\w-]+)['"]"#,
            )
            .expect("static regex"),
            symbol_list: Regex::new(r":(\w+)").expect("static regex"),
        }
    }

    fn rails_class_kind(superclass: Option<&str>, name: &str) -> SymbolKind {
        match superclass {
            Some(parent)
                if parent.contains("ActiveRecord") || parent.contains("ApplicationRecord") =>
            {
                SymbolKind::Model
            }
            Some(parent)
                if name.ends_with("Controller")
                    && (parent.contains("ActionController")
                        || parent.contains("ApplicationController")) =>
            {
                SymbolKind::Controller
            }
            _ => SymbolKind::Class,
        }
    }
}

impl Default for RubyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for RubyParser {
    fn language(&self) -> &'static str {
        "ruby"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let _ = path;
        let mut parsed = ParsedFile::new(self.language());
        let lines: Vec<&str> = content.lines().collect();
        let mut visibility = Visibility::Public;

        for (idx, raw) in lines.iter().enumerate() {
            let line_no = idx as u32 + 1;
            let width = raw.len().min(u16::MAX as usize) as u16;
            let trimmed = raw.trim();

            // Bare section markers switch visibility for subsequent defs.
            match trimmed {
                "private" => {
                    visibility = Visibility::Private;
                    continue;
                }
                "protected" => {
                    visibility = Visibility::Protected;
                    continue;
                }
                "public" => {
                    visibility = Visibility::Public;
                    continue;
                }
                _ => {}
            }

            if let Some(captures) = self.require_line.captures(raw) {
                parsed.imports.push(captures[1].to_string());
                continue;
            }

            if let Some(captures) = self.class_def.captures(raw) {
                visibility = Visibility::Public;
                let name = captures[1].to_string();
                let superclass = captures.get(2).map(|m| m.as_str());
                let kind = Self::rails_class_kind(superclass, &name);
                let end = indent_span(&lines, idx, true) as u32 + 1;
                let mut symbol = Symbol::new(&name, kind, Range::new(line_no, 0, end, width))
                    .with_signature(signature_line(raw));
                if let Some(parent) = superclass {
                    symbol = symbol.with_meta("superclass", parent);
                }
                if let Some(doc) = doc_comment_above(&lines, idx, CommentStyle::Hash) {
                    symbol = symbol.with_doc(doc);
                }
                parsed.symbols.push(symbol);
                continue;
            }

            if let Some(captures) = self.module_def.captures(raw) {
                visibility = Visibility::Public;
                let name = captures[1].to_string();
                let end = indent_span(&lines, idx, true) as u32 + 1;
                let mut symbol =
                    Symbol::new(&name, SymbolKind::Module, Range::new(line_no, 0, end, width))
                        .with_signature(signature_line(raw));
                if let Some(doc) = doc_comment_above(&lines, idx, CommentStyle::Hash) {
                    symbol = symbol.with_doc(doc);
                }
                parsed.symbols.push(symbol);
                continue;
            }

            if let Some(captures) = self.method_def.captures(raw) {
                let is_class_method = captures.get(1).is_some();
                let name = captures[2].to_string();
                let kind = if is_class_method {
                    SymbolKind::ClassMethod
                } else {
                    SymbolKind::Method
                };
                let end = indent_span(&lines, idx, true) as u32 + 1;
                let mut symbol = Symbol::new(&name, kind, Range::new(line_no, 0, end, width))
                    .with_signature(signature_line(raw))
                    .with_visibility(visibility);
                if let Some(doc) = doc_comment_above(&lines, idx, CommentStyle::Hash) {
                    symbol = symbol.with_doc(doc);
                }
                parsed.symbols.push(symbol);
                continue;
            }

            if let Some(captures) = self.attr_macro.captures(raw) {
                let macro_name = format!("attr_{}", &captures[1]);
                for symbol_name in self.symbol_list.captures_iter(&captures[2]) {
                    parsed.symbols.push(
                        Symbol::new(
                            &symbol_name[1],
                            SymbolKind::Method,
                            Range::single_line(line_no, 0, width),
                        )
                        .with_signature(signature_line(raw))
                        .with_meta("generated_by", macro_name.clone()),
                    );
                }
                continue;
            }

            if let Some(captures) = self
                .single_symbol_macro
                .captures(raw)
                .or_else(|| self.association_macro.captures(raw))
            {
                let macro_name = captures[1].to_string();
                parsed.symbols.push(
                    Symbol::new(
                        &captures[2],
                        SymbolKind::Method,
                        Range::single_line(line_no, 0, width),
                    )
                    .with_signature(signature_line(raw))
                    .with_meta("generated_by", macro_name),
                );
                continue;
            }

            if let Some(captures) = self.gem_dependency.captures(raw) {
                parsed.symbols.push(
                    Symbol::new(
                        &captures[1],
                        SymbolKind::Dependency,
                        Range::single_line(line_no, 0, width),
                    )
                    .with_signature(signature_line(raw)),
                );
                continue;
            }

            if let Some(captures) = self.constant_def.captures(raw) {
                parsed.symbols.push(
                    Symbol::new(
                        &captures[1],
                        SymbolKind::Constant,
                        Range::single_line(line_no, 0, width),
                    )
                    .with_signature(signature_line(raw)),
                );
            }
        }

        parsed
    }
}
