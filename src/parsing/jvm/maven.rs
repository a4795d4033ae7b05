//! Maven pom.xml parser.
//!
//! Regex-based extraction of the project artifact coordinates, declared
//! dependencies and build plugins. No XML tree is built; pom files are
//! regular enough for anchored patterns.

use crate::parsing::parser::{ParsedFile, SourceParser};
use crate::symbol::Symbol;
use crate::types::{Range, SymbolKind};
use regex::Regex;
use std::path::Path;

pub struct MavenParser {
    group_id: Regex,
    artifact_id: Regex,
    version: Regex,
    dependency_block: Regex,
    plugin_block: Regex,
    strip_blocks: Regex,
}

impl MavenParser {
    pub fn new() -> Self {
        Self {
            group_id: Regex::new(r"<groupId>\s*([^<]+?)\s*</groupId>").expect("static regex"),
            artifact_id: Regex::new(r"<artifactId>\s*([^<]+?)\s*</artifactId>")
                .expect("static regex"),
            version: Regex::new(r"<version>\s*([^<]+?)\s*</version>").expect("static regex"),
            dependency_block: Regex::new(r"(?s)<dependency>(.*?)</dependency>")
                .expect("static regex"),
            plugin_block: Regex::new(r"(?s)<plugin>(.*?)</plugin>").expect("static regex"),
            strip_blocks: Regex::new(
                r"(?s)<parent>.*?</parent>|<dependencies>.*?</dependencies>|<build>.*?</build>|<profiles>.*?</profiles>",
            )
            .expect("static regex"),
        }
    }

    fn line_of(content: &str, byte_offset: usize) -> u32 {
        content[..byte_offset.min(content.len())].matches('\n').count() as u32 + 1
    }

    fn coordinates(&self, fragment: &str) -> Option<(String, String, Option<String>)> {
        let group = self.group_id.captures(fragment)?[1].to_string();
        let artifact = self.artifact_id.captures(fragment)?[1].to_string();
        let version = self.version.captures(fragment).map(|c| c[1].to_string());
        Some((group, artifact, version))
    }
}

impl Default for MavenParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for MavenParser {
    fn language(&self) -> &'static str {
        "maven"
    }

    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile {
        let _ = path;
        let mut parsed = ParsedFile::new(self.language());

        // Project coordinates: whatever remains once parent/dependency/build
        // blocks are stripped belongs to the project element itself.
        let project_view = self.strip_blocks.replace_all(content, "");
        if let Some((group, artifact, version)) = self.coordinates(&project_view) {
            let name = format!("{group}:{artifact}");
            let version_str = version.as_deref().unwrap_or("unspecified");
            let line = self
                .artifact_id
                .find(content)
                .map(|m| Self::line_of(content, m.start()))
                .unwrap_or(1);
            parsed.package = Some(name.clone());
            parsed.symbols.push(
                Symbol::new(&name, SymbolKind::Artifact, Range::single_line(line, 0, 0))
                    .with_signature(format!("artifact {name}:{version_str}")),
            );
        }

        for captures in self.dependency_block.captures_iter(content) {
            let Some(block) = captures.get(1) else { continue };
            if let Some((group, artifact, version)) = self.coordinates(block.as_str()) {
                let name = format!("{group}:{artifact}");
                let version_str = version.clone().unwrap_or_else(|| "managed".to_string());
                let line = Self::line_of(content, block.start());
                parsed.imports.push(name.clone());
                let mut symbol =
                    Symbol::new(&name, SymbolKind::Dependency, Range::single_line(line, 0, 0))
                        .with_signature(format!("dependency {name}:{version_str}"));
                if let Some(version) = version {
                    symbol = symbol.with_meta("version", version);
                }
                parsed.symbols.push(symbol);
            }
        }

        for captures in self.plugin_block.captures_iter(content) {
            let Some(block) = captures.get(1) else { continue };
            if let Some(artifact) = self
                .artifact_id
                .captures(block.as_str())
                .map(|c| c[1].to_string())
            {
                let line = Self::line_of(content, block.start());
                parsed.symbols.push(
                    Symbol::new(&artifact, SymbolKind::Plugin, Range::single_line(line, 0, 0))
                        .with_signature(format!("plugin {artifact}")),
                );
            }
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0"?>
<project>
  <parent>
    <groupId>org.parent</groupId>
    <artifactId>parent-pom</artifactId>
    <version>7</version>
  </parent>
  <groupId>com.acme</groupId>
  <artifactId>widget</artifactId>
  <version>1.4.0</version>
  <dependencies>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13.2</version>
    </dependency>
    <dependency>
      <groupId>com.google.guava</groupId>
      <artifactId>guava</artifactId>
    </dependency>
  </dependencies>
  <build>
    <plugins>
      <plugin>
        <groupId>org.apache.maven.plugins</groupId>
        <artifactId>maven-compiler-plugin</artifactId>
      </plugin>
    </plugins>
  </build>
</project>
"#;

    #[test]
    fn test_artifact_ignores_parent_coordinates() {
        let parsed = MavenParser::new().parse(Path::new("pom.xml"), POM);
        let artifact = parsed
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Artifact)
            .unwrap();
        assert_eq!(artifact.name, "com.acme:widget");
        assert_eq!(
            artifact.signature.as_deref(),
            Some("artifact com.acme:widget:1.4.0")
        );
    }

    #[test]
    fn test_dependencies() {
        let parsed = MavenParser::new().parse(Path::new("pom.xml"), POM);
        let deps: Vec<_> = parsed
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Dependency)
            .collect();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "junit:junit");
        assert_eq!(
            deps[0].signature.as_deref(),
            Some("dependency junit:junit:4.13.2")
        );
        assert_eq!(
            deps[1].signature.as_deref(),
            Some("dependency com.google.guava:guava:managed")
        );
        assert!(deps[0].range.start_line > 10);
    }

    #[test]
    fn test_plugins() {
        let parsed = MavenParser::new().parse(Path::new("pom.xml"), POM);
        let plugin = parsed
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Plugin)
            .unwrap();
        assert_eq!(plugin.name, "maven-compiler-plugin");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let parsed = MavenParser::new().parse(Path::new("pom.xml"), "");
        assert!(parsed.symbols.is_empty());
    }
}
