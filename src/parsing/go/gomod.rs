//! go.mod parser.
//!
//! Extracts the module declaration and require entries (single-line and
//! block form) as module/dependency symbols.

use crate::parsing::parser::{ParsedFile, SourceParser};
use crate::symbol::Symbol;
use crate::types::{Range, SymbolKind};
use regex::Regex;
use std::path::Path;

pub struct GoModParser {
    module: Regex,
    require_entry: Regex,
}

impl GoModParser {
    pub fn new() -> Self {
        Self {
            module: Regex::new(r"^module\s+(\S+)").expect("static regex"),
            require_entry: Regex::new(r"^\s*([^\s(]+)\s+(v\S+)").expect("static regex"),
        }
    }
}

impl Default for GoModParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for GoModParser {
    fn language(&self) -> &'static str {
        "go-mod"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let _ = path;
        let mut parsed = ParsedFile::new(self.language());
        let mut in_require_block = false;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            let line_no = idx as u32 + 1;
            let width = raw.len().min(u16::MAX as usize) as u16;

            if let Some(captures) = self.module.captures(line) {
                let name = &captures[1];
                parsed.package = Some(name.to_string());
                parsed.symbols.push(
                    Symbol::new(name, SymbolKind::Module, Range::single_line(line_no, 0, width))
                        .with_signature(format!("module {name}")),
                );
                continue;
            }

            if line.starts_with("require (") || line == "require(" {
                in_require_block = true;
                continue;
            }
            if in_require_block && line.starts_with(')') {
                in_require_block = false;
                continue;
            }

            let candidate = if in_require_block {
                Some(line)
            } else {
                line.strip_prefix("require ")
            };
            let Some(candidate) = candidate else { continue };
            if candidate.starts_with("//") {
                continue;
            }
            if let Some(captures) = self.require_entry.captures(candidate) {
                let name = captures[1].to_string();
                let version = captures[2].to_string();
                parsed.imports.push(name.clone());
                parsed.symbols.push(
                    Symbol::new(&name, SymbolKind::Dependency, Range::single_line(line_no, 0, width))
                        .with_signature(format!("require {name} {version}"))
                        .with_meta("version", version),
                );
            }
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ParsedFile {
        GoModParser::new().parse(Path::new("go.mod"), content)
    }

    #[test]
    fn test_module_and_block_requires() {
        let parsed = parse(
            "module github.com/acme/widget\n\ngo 1.22\n\nrequire (\n\tgithub.com/pkg/errors v0.9.1\n\tgolang.org/x/sync v0.7.0 // indirect\n)\n",
        );
        assert_eq!(parsed.package.as_deref(), Some("github.com/acme/widget"));
        let module = &parsed.symbols[0];
        assert_eq!(module.kind, SymbolKind::Module);
        assert_eq!(module.range.start_line, 1);

        let deps: Vec<_> = parsed
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Dependency)
            .collect();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "github.com/pkg/errors");
        assert_eq!(
            deps[0].signature.as_deref(),
            Some("require github.com/pkg/errors v0.9.1")
        );
    }

    #[test]
    fn test_single_line_require() {
        let parsed = parse("module m\n\nrequire github.com/x/y v1.2.3\n");
        let dep = parsed
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Dependency)
            .unwrap();
        assert_eq!(dep.name, "github.com/x/y");
        assert_eq!(
            dep.metadata.get("version").and_then(|v| v.as_str()),
            Some("v1.2.3")
        );
    }

    #[test]
    fn test_go_directive_is_not_a_dependency() {
        let parsed = parse("module m\n\ngo 1.21\n");
        assert!(
            parsed
                .symbols
                .iter()
                .all(|s| s.kind != SymbolKind::Dependency)
        );
    }
}
