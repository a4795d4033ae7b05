//! Language parser contract and shared extraction helpers.
//!
//! Every parser implements the same interface: given a path and UTF-8
//! content, emit the file's language tag, package, imports and symbol
//! stream. Parsers never fail; on malformed input they emit whatever they
//! could extract and set the partial flag.

use crate::symbol::Symbol;
use crate::types::Visibility;
use serde_json::{Map, Value};
use std::path::Path;

/// Result of parsing one file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub language: String,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub symbols: Vec<Symbol>,
    pub file_metadata: Map<String, Value>,
    /// Set when the parser could only partially process the input. The
    /// dispatcher treats partial results as success.
    pub partial: bool,
}

impl ParsedFile {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }
}

/// Common interface for all language parsers.
///
/// Parsers are stateful only for reusable machinery (compiled grammars,
/// regexes); `parse` output depends solely on the input, byte for byte.
pub trait SourceParser: Send {
    /// Language tag this parser emits (`python`, `javascript`, ...).
    fn language(&self) -> &'static str;

    /// Parse source text and extract the symbol stream.
    fn parse(&mut self, path: &Path, content: &str) -> ParsedFile;
}

/// Safely truncate a UTF-8 string at a character boundary.
#[inline]
pub fn safe_truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &s[..boundary]
}

/// Truncated preview with ellipsis for display purposes.
#[inline]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate_str(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// One-line signature rendering: the first line of the declaration with the
/// body opener stripped.
pub fn signature_line(decl: &str) -> String {
    let line = decl.lines().next().unwrap_or("").trim();
    let line = line
        .trim_end_matches('{')
        .trim_end()
        .trim_end_matches(';')
        .trim_end_matches(':')
        .trim_end();
    truncate_for_display(line, 200)
}

/// Indentation width of a line in columns, tabs counted as 4.
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

/// Find the end of an indentation-delimited block starting at `start`
/// (0-based index into `lines`). Returns the 0-based index of the block's
/// last line. When `include_trailing_end` is set, a trailing `end` keyword
/// at the declaration's own indent is folded into the span (Ruby blocks).
pub fn indent_span(lines: &[&str], start: usize, include_trailing_end: bool) -> usize {
    let base = indent_width(lines[start]);
    let mut last = start;
    let mut idx = start + 1;
    while idx < lines.len() {
        let line = lines[idx];
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }
        if indent_width(line) <= base {
            if include_trailing_end && line.trim() == "end" && indent_width(line) == base {
                return idx;
            }
            break;
        }
        last = idx;
        idx += 1;
    }
    last
}

/// Split leading modifier keywords off a declaration line.
/// Returns (modifiers, rest of the line).
pub fn leading_modifiers<'a>(decl: &'a str, keywords: &[&str]) -> (Vec<String>, &'a str) {
    let mut rest = decl.trim_start();
    let mut modifiers = Vec::new();
    'outer: loop {
        for keyword in keywords {
            if let Some(after) = rest.strip_prefix(keyword) {
                if after.starts_with(char::is_whitespace) {
                    modifiers.push(keyword.to_string());
                    rest = after.trim_start();
                    continue 'outer;
                }
            }
        }
        break;
    }
    (modifiers, rest)
}

/// Map modifier keywords onto a visibility.
pub fn visibility_from_modifiers(modifiers: &[String]) -> Visibility {
    for modifier in modifiers {
        match modifier.as_str() {
            "private" => return Visibility::Private,
            "protected" => return Visibility::Protected,
            "internal" => return Visibility::Internal,
            "public" => return Visibility::Public,
            _ => {}
        }
    }
    Visibility::Public
}

/// Comment syntax used when scanning for documentation above a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `#` line comments (Python, Ruby).
    Hash,
    /// `//` line comments plus `/** ... */` blocks (C-family).
    Slash,
}

/// Collect the contiguous comment block immediately above `decl` (0-based
/// line index), stripped of comment markers. Returns None when the
/// declaration has no comment attached.
pub fn doc_comment_above(lines: &[&str], decl: usize, style: CommentStyle) -> Option<String> {
    if decl == 0 {
        return None;
    }
    let mut collected: Vec<String> = Vec::new();
    let mut idx = decl;
    while idx > 0 {
        idx -= 1;
        let line = lines[idx].trim();
        let stripped = match style {
            CommentStyle::Hash => line.strip_prefix('#').map(str::trim),
            CommentStyle::Slash => line
                .strip_prefix("///")
                .or_else(|| line.strip_prefix("//"))
                .or_else(|| line.strip_prefix("/**"))
                .or_else(|| line.strip_prefix("/*"))
                .or_else(|| line.strip_prefix("*/"))
                .or_else(|| line.strip_prefix('*'))
                .map(|s| s.trim().trim_end_matches("*/").trim()),
        };
        match stripped {
            Some(text) => {
                // Annotation lines sit between doc and declaration in JVM
                // code; skip over them without breaking the block.
                collected.push(text.to_string());
                if matches!(style, CommentStyle::Slash) && line.starts_with("/*") {
                    break;
                }
            }
            None if line.starts_with('@') && matches!(style, CommentStyle::Slash) => continue,
            None => break,
        }
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    let doc = collected.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}
