//! Directory walker with explicit entry classification.
//!
//! Walks a tree with gitignore support, skipping the configured ignore
//! directories, and classifies every regular file it sees instead of
//! silently dropping it. The dispatcher consumes this stream and turns the
//! classes into its indexed/ignored/failed counters.

use crate::config::Settings;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Bytes inspected for the null-byte binary heuristic.
pub const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkClass {
    /// Regular file that passed every filter.
    Indexable,
    /// File larger than the configured threshold.
    SkipSize(u64),
    /// I/O failure while inspecting the entry.
    Error(String),
}

#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub class: WalkClass,
    pub size: u64,
}

/// Null byte in the head of the file marks it binary.
pub fn is_binary(head: &[u8]) -> bool {
    head.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0)
}

pub struct FileWalker<'s> {
    settings: &'s Settings,
}

impl<'s> FileWalker<'s> {
    pub fn new(settings: &'s Settings) -> Self {
        Self { settings }
    }

    /// Walk `root` and return classified entries in sorted path order, so
    /// downstream file-id assignment is reproducible.
    pub fn walk(&self, root: &Path, recursive: bool) -> Vec<WalkEntry> {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .max_depth((!recursive).then_some(1));

        let ignore_dirs = self.settings.indexing.ignore_dirs.clone();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .map(|name| !ignore_dirs.iter().any(|ignored| ignored == name))
                .unwrap_or(true)
        });

        let max_size = self.settings.indexing.max_file_size;
        let mut entries = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    entries.push(WalkEntry {
                        path: PathBuf::new(),
                        class: WalkClass::Error(e.to_string()),
                        size: 0,
                    });
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path().to_path_buf();
            match entry.metadata() {
                Ok(metadata) => {
                    let size = metadata.len();
                    let class = if size >= max_size {
                        WalkClass::SkipSize(size)
                    } else {
                        WalkClass::Indexable
                    };
                    entries.push(WalkEntry { path, class, size });
                }
                Err(e) => entries.push(WalkEntry {
                    path,
                    class: WalkClass::Error(e.to_string()),
                    size: 0,
                }),
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}
