//! Plugin registry: file extension / filename -> parser.
//!
//! Each parser declares its language tag, extensions and special filenames
//! up front; the registry builds the lookup maps once at construction.
//! Exact filenames (`go.mod`, `pom.xml`, `build.gradle`) take precedence
//! over extensions. Parser instances are constructed lazily and cached per
//! `ParserSet`, so each worker thread carries its own instances.

use crate::parsing::parser::{ParsedFile, SourceParser};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub type ParserFactory = fn() -> Result<Box<dyn SourceParser>, String>;

/// Static registration record for one parser.
pub struct PluginSpec {
    pub language: &'static str,
    pub extensions: &'static [&'static str],
    pub filenames: &'static [&'static str],
    pub factory: ParserFactory,
}

impl std::fmt::Debug for PluginSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSpec")
            .field("language", &self.language)
            .field("extensions", &self.extensions)
            .field("filenames", &self.filenames)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct PluginRegistry {
    specs: Vec<PluginSpec>,
    by_extension: HashMap<&'static str, usize>,
    by_filename: HashMap<&'static str, usize>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in parser registered.
    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::parsing::python::spec());
        registry.register(crate::parsing::javascript::spec());
        registry.register(crate::parsing::go::spec());
        registry.register(crate::parsing::go::gomod_spec());
        registry.register(crate::parsing::jvm::java_spec());
        registry.register(crate::parsing::jvm::kotlin_spec());
        registry.register(crate::parsing::jvm::maven_spec());
        registry.register(crate::parsing::jvm::gradle_spec());
        registry.register(crate::parsing::ruby::spec());
        registry.register(crate::parsing::php::spec());
        registry.register(crate::parsing::csv::spec());
        registry
    }

    pub fn register(&mut self, spec: PluginSpec) {
        let idx = self.specs.len();
        for extension in spec.extensions {
            self.by_extension.insert(extension, idx);
        }
        for filename in spec.filenames {
            self.by_filename.insert(filename, idx);
        }
        self.specs.push(spec);
    }

    /// Resolve the parser responsible for a path, or None when no parser
    /// claims it. Filename matches win over extension matches.
    pub fn resolve(&self, path: &Path) -> Option<&PluginSpec> {
        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(&idx) = self.by_filename.get(filename) {
                return self.specs.get(idx);
            }
        }
        let extension = path.extension().and_then(|e| e.to_str())?;
        let extension = extension.to_lowercase();
        self.by_extension
            .get(extension.as_str())
            .and_then(|&idx| self.specs.get(idx))
    }

    /// All registered plugins, in registration order.
    pub fn specs(&self) -> &[PluginSpec] {
        &self.specs
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.resolve(path).is_some()
    }
}

/// Per-worker set of constructed parser instances.
///
/// Construction is lazy: a parser is built on the first file that needs it
/// and reused for the rest of the worker's lifetime.
pub struct ParserSet {
    registry: Arc<PluginRegistry>,
    cache: HashMap<&'static str, Box<dyn SourceParser>>,
}

impl ParserSet {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
        }
    }

    /// Parse `content` with the parser registered for `path`.
    ///
    /// Returns None when no parser claims the path, Err when the parser
    /// could not be constructed.
    pub fn parse(&mut self, path: &Path, content: &str) -> Option<Result<ParsedFile, String>> {
        let spec = self.registry.resolve(path)?;
        let language = spec.language;
        let factory = spec.factory;

        if !self.cache.contains_key(language) {
            match factory() {
                Ok(parser) => {
                    self.cache.insert(language, parser);
                }
                Err(reason) => return Some(Err(reason)),
            }
        }
        let parser = self.cache.get_mut(language).expect("parser just inserted");
        Some(Ok(parser.parse(path, content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_beats_extension() {
        let registry = PluginRegistry::with_default_plugins();
        // go.mod has no extension mapping conflict, but build.gradle.kts
        // ends in .kts which the Kotlin parser also claims.
        let spec = registry.resolve(Path::new("app/build.gradle.kts")).unwrap();
        assert_eq!(spec.language, "gradle");
        let spec = registry.resolve(Path::new("src/main.kts")).unwrap();
        assert_eq!(spec.language, "kotlin");
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        let registry = PluginRegistry::with_default_plugins();
        assert_eq!(registry.resolve(Path::new("A.PY")).unwrap().language, "python");
    }

    #[test]
    fn test_unknown_extension_is_none() {
        let registry = PluginRegistry::with_default_plugins();
        assert!(registry.resolve(Path::new("README.md")).is_none());
        assert!(registry.resolve(Path::new("noextension")).is_none());
    }

    #[test]
    fn test_default_plugin_coverage() {
        let registry = PluginRegistry::with_default_plugins();
        for (file, language) in [
            ("m.py", "python"),
            ("a.js", "javascript"),
            ("a.tsx", "javascript"),
            ("s.go", "go"),
            ("go.mod", "go-mod"),
            ("A.java", "java"),
            ("A.kt", "kotlin"),
            ("pom.xml", "maven"),
            ("build.gradle", "gradle"),
            ("a.rb", "ruby"),
            ("w.gemspec", "ruby"),
            ("i.php", "php"),
            ("d.csv", "csv"),
            ("d.tsv", "csv"),
        ] {
            assert_eq!(
                registry.resolve(Path::new(file)).map(|s| s.language),
                Some(language),
                "wrong parser for {file}"
            );
        }
    }

    #[test]
    fn test_parser_set_caches_instances() {
        let registry = Arc::new(PluginRegistry::with_default_plugins());
        let mut set = ParserSet::new(registry);
        let first = set.parse(Path::new("a.py"), "x = 1\n").unwrap().unwrap();
        assert_eq!(first.language, "python");
        let second = set.parse(Path::new("b.py"), "y = 2\n").unwrap().unwrap();
        assert_eq!(second.language, "python");
        assert_eq!(set.cache.len(), 1);
    }
}
