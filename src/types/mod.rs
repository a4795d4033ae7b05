use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(NonZeroU32);

impl SymbolId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

impl FileId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

/// Source span of a symbol. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: u16,
    pub end_line: u32,
    pub end_column: u16,
}

impl Range {
    pub fn new(start_line: u32, start_column: u16, end_line: u32, end_column: u16) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Span covering a single line.
    pub fn single_line(line: u32, start_column: u16, end_column: u16) -> Self {
        Self::new(line, start_column, line, end_column)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// What kind of program entity a symbol represents.
///
/// This is a closed set shared by all language parsers. Language-specific
/// nuance (visibility, staticness, metaprogramming origin) is carried by
/// `Visibility`, the modifier list, and the metadata map on the symbol
/// itself, and folded into the rendered kind label where it is material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Package,
    Namespace,
    Class,
    AbstractClass,
    Interface,
    Trait,
    Struct,
    Enum,
    Object,
    Function,
    Method,
    ClassMethod,
    Constructor,
    Field,
    Property,
    Constant,
    Variable,
    TypeAlias,
    Decorator,
    Annotation,
    Extension,
    Import,
    Dependency,
    Plugin,
    Artifact,
    Model,
    Controller,
    Middleware,
    Migration,
    Seeder,
    Schema,
    Header,
    Statistic,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Package => "package",
            Self::Namespace => "namespace",
            Self::Class => "class",
            Self::AbstractClass => "abstract_class",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Object => "object",
            Self::Function => "function",
            Self::Method => "method",
            Self::ClassMethod => "class_method",
            Self::Constructor => "constructor",
            Self::Field => "field",
            Self::Property => "property",
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::TypeAlias => "type",
            Self::Decorator => "decorator",
            Self::Annotation => "annotation",
            Self::Extension => "extension",
            Self::Import => "import",
            Self::Dependency => "dependency",
            Self::Plugin => "plugin",
            Self::Artifact => "artifact",
            Self::Model => "model",
            Self::Controller => "controller",
            Self::Middleware => "middleware",
            Self::Migration => "migration",
            Self::Seeder => "seeder",
            Self::Schema => "schema",
            Self::Header => "header",
            Self::Statistic => "statistic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        // Accept folded labels ("private_method", "static_property") by
        // stripping the visibility/storage prefix first.
        let base = s
            .strip_prefix("private_")
            .or_else(|| s.strip_prefix("protected_"))
            .or_else(|| s.strip_prefix("internal_"))
            .or_else(|| s.strip_prefix("static_"))
            .unwrap_or(s);

        Some(match base {
            "module" => Self::Module,
            "package" => Self::Package,
            "namespace" => Self::Namespace,
            "class" => Self::Class,
            "abstract_class" => Self::AbstractClass,
            "interface" => Self::Interface,
            "trait" => Self::Trait,
            "struct" => Self::Struct,
            "enum" => Self::Enum,
            "object" => Self::Object,
            "function" => Self::Function,
            "method" => Self::Method,
            "class_method" => Self::ClassMethod,
            "constructor" => Self::Constructor,
            "field" => Self::Field,
            "property" => Self::Property,
            "constant" => Self::Constant,
            "variable" => Self::Variable,
            "type" => Self::TypeAlias,
            "decorator" => Self::Decorator,
            "annotation" => Self::Annotation,
            "extension" => Self::Extension,
            "import" => Self::Import,
            "dependency" => Self::Dependency,
            "plugin" => Self::Plugin,
            "artifact" => Self::Artifact,
            "model" => Self::Model,
            "controller" => Self::Controller,
            "middleware" => Self::Middleware,
            "migration" => Self::Migration,
            "seeder" => Self::Seeder,
            "schema" => Self::Schema,
            "header" => Self::Header,
            "statistic" => Self::Statistic,
            _ => return None,
        })
    }

    /// Ranking bucket for symbol lookup: type-like definitions come first,
    /// then callables, then data members, then everything else.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Class
            | Self::AbstractClass
            | Self::Struct
            | Self::Interface
            | Self::Trait
            | Self::Enum
            | Self::Object
            | Self::Model
            | Self::Controller => 0,
            Self::Function
            | Self::Method
            | Self::ClassMethod
            | Self::Constructor
            | Self::Extension => 1,
            Self::Field | Self::Property | Self::Constant | Self::Variable => 2,
            _ => 3,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared visibility of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Internal => "internal",
        }
    }
}

/// Monotonic id source for symbols within one index.
#[derive(Debug, Clone)]
pub struct SymbolCounter {
    next: u32,
}

impl SymbolCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Resume from a persisted counter value (the next id to hand out).
    pub fn from_next(next: u32) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_id(&mut self) -> SymbolId {
        let id = SymbolId::new(self.next).expect("symbol counter overflow");
        self.next += 1;
        id
    }

    pub fn peek_next(&self) -> u32 {
        self.next
    }
}

impl Default for SymbolCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic id source for files within one index.
#[derive(Debug, Clone)]
pub struct FileCounter {
    next: u32,
}

impl FileCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn from_next(next: u32) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_id(&mut self) -> FileId {
        let id = FileId::new(self.next).expect("file counter overflow");
        self.next += 1;
        id
    }

    pub fn peek_next(&self) -> u32 {
        self.next
    }
}

impl Default for FileCounter {
    fn default() -> Self {
        Self::new()
    }
}
