//! Gradle build file parser (`build.gradle`, `build.gradle.kts`).
//!
//! Line-oriented regex extraction of dependency coordinates and applied
//! plugins, covering both Groovy and Kotlin DSL quoting.

use crate::parsing::parser::{ParsedFile, SourceParser};
use crate::symbol::Symbol;
use crate::types::{Range, SymbolKind};
use regex::Regex;
use std::path::Path;

pub struct GradleParser {
    dependency: Regex,
    plugin: Regex,
}

impl GradleParser {
    pub fn new() -> Self {
        Self {
            dependency: Regex::new(
                r#"(?:implementation|compile|api|testImplementation|testCompile|runtimeOnly|compileOnly|annotationProcessor|kapt)\s*\(?\s*['"]([\w.\-:]+)['"]"#,
            )
            .expect("static regex"),
            plugin: Regex::new(r#"(?:id\s*\(?\s*['"]([\w.\-]+)['"]|apply\s+plugin:\s*['"]([\w.\-]+)['"])"#)
                .expect("static regex"),
        }
    }
}

impl Default for GradleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for GradleParser {
    fn language(&self) -> &'static str {
        "gradle"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let _ = path;
        let mut parsed = ParsedFile::new(self.language());

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let width = line.len().min(u16::MAX as usize) as u16;

            if let Some(captures) = self.dependency.captures(line) {
                let coordinate = captures[1].to_string();
                parsed.imports.push(coordinate.clone());
                parsed.symbols.push(
                    Symbol::new(
                        &coordinate,
                        SymbolKind::Dependency,
                        Range::single_line(line_no, 0, width),
                    )
                    .with_signature(line.trim().to_string()),
                );
                continue;
            }

            if let Some(captures) = self.plugin.captures(line) {
                let name = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map(|m| m.as_str().to_string());
                if let Some(name) = name {
                    parsed.symbols.push(
                        Symbol::new(&name, SymbolKind::Plugin, Range::single_line(line_no, 0, width))
                            .with_signature(line.trim().to_string()),
                    );
                }
            }
        }
        parsed
    }
}
