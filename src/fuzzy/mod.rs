//! In-memory fuzzy symbol and file-content index.
//!
//! Quick suggestion-style lookup over symbol names and file lines. This is
//! not the authoritative search surface; the storage engine is. Matches are
//! case-insensitive substrings, scored whole-word > prefix > substring and
//! tiebroken by shorter matched text, then lower line number.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SCORE_WHOLE_WORD: u32 = 3;
const SCORE_PREFIX: u32 = 2;
const SCORE_SUBSTRING: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyMatch {
    pub file: PathBuf,
    pub line: u32,
    pub score: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FuzzyStats {
    pub files: usize,
    pub lines: usize,
    pub symbols: usize,
}

#[derive(Debug)]
struct SymbolEntry {
    name: String,
    name_lower: String,
    file: PathBuf,
    line: u32,
}

#[derive(Debug)]
struct FileEntry {
    lines: Vec<String>,
    lines_lower: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<PathBuf, FileEntry>,
    symbols: Vec<SymbolEntry>,
}

/// Suggestion index shared across request handlers: many readers, one writer.
#[derive(Debug, Default)]
pub struct FuzzyIndex {
    inner: RwLock<Inner>,
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for substring matching over its contents. Replaces
    /// any previous registration of the same path.
    pub fn add_file(&self, path: &Path, content: &str) {
        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        let lines_lower = lines.iter().map(|l| l.to_lowercase()).collect();
        let mut inner = self.inner.write();
        inner.files.insert(
            path.to_path_buf(),
            FileEntry { lines, lines_lower },
        );
    }

    /// Register a symbol occurrence. The metadata map is accepted for parity
    /// with the storage write path but only name and position participate in
    /// matching.
    pub fn add_symbol(&self, name: &str, path: &Path, line: u32, _metadata: &Map<String, Value>) {
        let mut inner = self.inner.write();
        inner.symbols.push(SymbolEntry {
            name: name.to_string(),
            name_lower: name.to_lowercase(),
            file: path.to_path_buf(),
            line,
        });
    }

    /// Drop all entries for a file (used when a file is re-indexed).
    pub fn remove_file(&self, path: &Path) {
        let mut inner = self.inner.write();
        inner.files.remove(path);
        inner.symbols.retain(|s| s.file != path);
    }

    /// Ordered suggestion search.
    pub fn search(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        let query_lower = query.to_lowercase();
        if query_lower.is_empty() || limit == 0 {
            return Vec::new();
        }

        let inner = self.inner.read();
        let mut matches = Vec::new();

        for entry in &inner.symbols {
            if let Some(score) = score_match(&entry.name_lower, &query_lower) {
                matches.push(FuzzyMatch {
                    file: entry.file.clone(),
                    line: entry.line,
                    score,
                    text: entry.name.clone(),
                });
            }
        }

        for (path, entry) in &inner.files {
            for (idx, line_lower) in entry.lines_lower.iter().enumerate() {
                if let Some(score) = score_match(line_lower, &query_lower) {
                    matches.push(FuzzyMatch {
                        file: path.clone(),
                        line: idx as u32 + 1,
                        score,
                        text: entry.lines[idx].trim().to_string(),
                    });
                }
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.text.len().cmp(&b.text.len()))
                .then(a.line.cmp(&b.line))
                .then(a.file.cmp(&b.file))
        });
        matches.truncate(limit);
        matches
    }

    pub fn stats(&self) -> FuzzyStats {
        let inner = self.inner.read();
        FuzzyStats {
            files: inner.files.len(),
            lines: inner.files.values().map(|f| f.lines.len()).sum(),
            symbols: inner.symbols.len(),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.files.clear();
        inner.symbols.clear();
    }
}

/// Score `query` against `text` (both lowercase). None when no match.
fn score_match(text: &str, query: &str) -> Option<u32> {
    let start = text.find(query)?;
    let end = start + query.len();

    let before_ok = start == 0 || !is_word_byte(text.as_bytes()[start - 1]);
    let after_ok = end == text.len() || !is_word_byte(text.as_bytes()[end]);

    if before_ok && after_ok {
        Some(SCORE_WHOLE_WORD)
    } else if start == 0 {
        Some(SCORE_PREFIX)
    } else {
        Some(SCORE_SUBSTRING)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn test_whole_word_beats_prefix_beats_substring() {
        let index = FuzzyIndex::new();
        index.add_symbol("parse", Path::new("a.rs"), 10, &meta());
        index.add_symbol("parser_state", Path::new("b.rs"), 20, &meta());
        index.add_symbol("reparse", Path::new("c.rs"), 30, &meta());

        let results = index.search("parse", 10);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "parse");
        assert_eq!(results[0].score, SCORE_WHOLE_WORD);
        assert_eq!(results[1].text, "parser_state");
        assert_eq!(results[1].score, SCORE_PREFIX);
        assert_eq!(results[2].text, "reparse");
        assert_eq!(results[2].score, SCORE_SUBSTRING);
    }

    #[test]
    fn test_tiebreak_shorter_then_lower_line() {
        let index = FuzzyIndex::new();
        index.add_symbol("walk_dir", Path::new("a.rs"), 50, &meta());
        index.add_symbol("walk", Path::new("a.rs"), 90, &meta());
        index.add_symbol("walk", Path::new("a.rs"), 12, &meta());

        let results = index.search("walk", 10);
        assert_eq!(results[0].line, 12);
        assert_eq!(results[1].line, 90);
        assert_eq!(results[2].text, "walk_dir");
    }

    #[test]
    fn test_matches_file_lines() {
        let index = FuzzyIndex::new();
        index.add_file(Path::new("demo.py"), "import os\n\ndef run_job():\n    pass\n");

        let results = index.search("run_job", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file, PathBuf::from("demo.py"));
        assert_eq!(results[0].line, 3);
        assert_eq!(results[0].score, SCORE_WHOLE_WORD);
    }

    #[test]
    fn test_case_insensitive() {
        let index = FuzzyIndex::new();
        index.add_symbol("Calculator", Path::new("demo.py"), 1, &meta());
        assert_eq!(index.search("calculator", 5).len(), 1);
        assert_eq!(index.search("CALCULATOR", 5).len(), 1);
    }

    #[test]
    fn test_remove_file_drops_symbols() {
        let index = FuzzyIndex::new();
        index.add_file(Path::new("demo.py"), "x = 1\n");
        index.add_symbol("x", Path::new("demo.py"), 1, &meta());
        assert_eq!(index.stats().symbols, 1);

        index.remove_file(Path::new("demo.py"));
        assert_eq!(index.stats(), FuzzyStats::default());
        assert!(index.search("x", 5).is_empty());
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = FuzzyIndex::new();
        index.add_symbol("anything", Path::new("a.rs"), 1, &meta());
        assert!(index.search("", 5).is_empty());
    }
}
