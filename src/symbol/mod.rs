use crate::types::{FileId, Range, SymbolId, SymbolKind, Visibility};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single extracted symbol.
///
/// Parsers produce these without ids; the storage layer assigns `id` and
/// `file_id` when the owning file is written. Cross-references use integer
/// ids only, never object pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: Option<SymbolId>,
    pub file_id: Option<FileId>,
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub range: Range,
    pub signature: Option<String>,
    pub documentation: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, range: Range) -> Self {
        Self {
            id: None,
            file_id: None,
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            modifiers: Vec::new(),
            range,
            signature: None,
            documentation: None,
            metadata: Map::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m == "static")
    }

    /// Rendered kind label with visibility and storage class folded in where
    /// the distinction is material: `private_method`, `static_property`, and
    /// metaprogramming products as `generated_<macro>`.
    pub fn kind_label(&self) -> String {
        if let Some(Value::String(generator)) = self.metadata.get("generated_by") {
            return format!("generated_{generator}");
        }

        let foldable = matches!(
            self.kind,
            SymbolKind::Method
                | SymbolKind::ClassMethod
                | SymbolKind::Property
                | SymbolKind::Field
                | SymbolKind::Function
        );
        if !foldable {
            return self.kind.as_str().to_string();
        }

        match (self.visibility, self.is_static()) {
            (Visibility::Public, false) => self.kind.as_str().to_string(),
            (Visibility::Public, true) => format!("static_{}", self.kind.as_str()),
            (vis, false) => format!("{}_{}", vis.as_str(), self.kind.as_str()),
            // Visibility wins over staticness when both apply; the modifier
            // list still records "static".
            (vis, true) => format!("{}_{}", vis.as_str(), self.kind.as_str()),
        }
    }

    /// One-line rendering for display. Falls back to the name when the parser
    /// supplied no signature.
    pub fn display_signature(&self) -> &str {
        self.signature.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(kind: SymbolKind) -> Symbol {
        Symbol::new("probe", kind, Range::single_line(1, 0, 5))
    }

    #[test]
    fn test_builder_chain() {
        let symbol = probe(SymbolKind::Function)
            .with_signature("def probe()")
            .with_doc("Probe things.")
            .with_meta("language", "python");

        assert_eq!(symbol.display_signature(), "def probe()");
        assert_eq!(symbol.documentation.as_deref(), Some("Probe things."));
        assert_eq!(
            symbol.metadata.get("language").and_then(|v| v.as_str()),
            Some("python")
        );
        assert!(symbol.id.is_none());
    }

    #[test]
    fn test_kind_label_plain() {
        assert_eq!(probe(SymbolKind::Class).kind_label(), "class");
        assert_eq!(probe(SymbolKind::Method).kind_label(), "method");
    }

    #[test]
    fn test_kind_label_folds_visibility() {
        let symbol = probe(SymbolKind::Method).with_visibility(Visibility::Private);
        assert_eq!(symbol.kind_label(), "private_method");

        let symbol = probe(SymbolKind::Property).with_modifiers(vec!["static".into()]);
        assert_eq!(symbol.kind_label(), "static_property");
    }

    #[test]
    fn test_kind_label_visibility_wins_over_static() {
        let symbol = probe(SymbolKind::Method)
            .with_visibility(Visibility::Protected)
            .with_modifiers(vec!["static".into()]);
        assert_eq!(symbol.kind_label(), "protected_method");
        assert!(symbol.is_static());
    }

    #[test]
    fn test_kind_label_generated() {
        let symbol = probe(SymbolKind::Method).with_meta("generated_by", "attr_accessor");
        assert_eq!(symbol.kind_label(), "generated_attr_accessor");
    }

    #[test]
    fn test_kind_label_never_folds_types() {
        let symbol = probe(SymbolKind::Class).with_visibility(Visibility::Private);
        assert_eq!(symbol.kind_label(), "class");
    }
}
