//! Persistent repository registry.
//!
//! A JSON document mapping repository ids to repository records, including
//! where each repository's index lives on disk. The file layout is a stable
//! contract for external tools. Writes are read-modify-write with an atomic
//! replace and a single fsync; concurrent writers are not supported, so the
//! in-process lock serializes mutation and callers across processes must
//! coordinate externally. Reads tolerate an absent file (empty registry).

use crate::error::{IndexError, IndexResult};
use crate::storage::RepositoryStats;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// One registered repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub repository_id: String,
    pub name: String,
    pub path: PathBuf,
    pub index_path: PathBuf,
    #[serde(default)]
    pub language_stats: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub total_symbols: u64,
    #[serde(default)]
    pub indexed_at: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub priority: i32,
}

impl RepositoryInfo {
    /// Fresh record for a repository rooted at `path`.
    pub fn new(path: &Path, index_path: PathBuf) -> Self {
        let normalized = crate::paths::normalize(path);
        Self {
            repository_id: crate::paths::repo_id(path),
            name: normalized
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("repository")
                .to_string(),
            path: normalized,
            index_path,
            language_stats: BTreeMap::new(),
            total_files: 0,
            total_symbols: 0,
            indexed_at: chrono::Utc::now().to_rfc3339(),
            active: true,
            priority: 0,
        }
    }
}

type RegistryDocument = IndexMap<String, RepositoryInfo>;

/// Handle on the registry document.
#[derive(Debug)]
pub struct RepoRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RepoRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Registry at the default location.
    pub fn at_default_path() -> Self {
        Self::new(crate::paths::registry_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn registry_error(&self, reason: impl std::fmt::Display) -> IndexError {
        IndexError::Registry {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn read_document(&self) -> IndexResult<RegistryDocument> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RegistryDocument::new());
            }
            Err(e) => return Err(self.registry_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(RegistryDocument::new());
        }
        serde_json::from_str(&raw).map_err(|e| self.registry_error(e))
    }

    /// Atomic replace with one fsync before the rename.
    fn write_document(&self, document: &RegistryDocument) -> IndexResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(|e| self.registry_error(e))?;

        let rendered =
            serde_json::to_string_pretty(document).map_err(|e| self.registry_error(e))?;
        let mut temp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| self.registry_error(e))?;
        temp.write_all(rendered.as_bytes())
            .map_err(|e| self.registry_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.registry_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.registry_error(e.error))?;
        Ok(())
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RegistryDocument) -> IndexResult<T>,
    ) -> IndexResult<T> {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        let result = f(&mut document)?;
        self.write_document(&document)?;
        Ok(result)
    }

    /// Insert or replace a repository record.
    pub fn register(&self, info: RepositoryInfo) -> IndexResult<()> {
        self.mutate(|document| {
            document.insert(info.repository_id.clone(), info);
            Ok(())
        })
    }

    /// Refresh a repository's counters after indexing.
    pub fn update_stats(&self, repo_id: &str, stats: &RepositoryStats) -> IndexResult<()> {
        self.mutate(|document| {
            let entry = document
                .get_mut(repo_id)
                .ok_or_else(|| IndexError::RepositoryNotFound {
                    repo_id: repo_id.to_string(),
                })?;
            entry.total_files = stats.total_files;
            entry.total_symbols = stats.total_symbols;
            entry.language_stats = stats.languages.clone();
            entry.indexed_at = chrono::Utc::now().to_rfc3339();
            Ok(())
        })
    }

    /// Mark a repository inactive; searches skip it unless addressed
    /// explicitly.
    pub fn deactivate(&self, repo_id: &str) -> IndexResult<()> {
        self.mutate(|document| {
            let entry = document
                .get_mut(repo_id)
                .ok_or_else(|| IndexError::RepositoryNotFound {
                    repo_id: repo_id.to_string(),
                })?;
            entry.active = false;
            Ok(())
        })
    }

    pub fn set_priority(&self, repo_id: &str, priority: i32) -> IndexResult<()> {
        self.mutate(|document| {
            let entry = document
                .get_mut(repo_id)
                .ok_or_else(|| IndexError::RepositoryNotFound {
                    repo_id: repo_id.to_string(),
                })?;
            entry.priority = priority;
            Ok(())
        })
    }

    /// Repositories ordered by priority (higher first), then name, for a
    /// deterministic search order.
    pub fn list(&self, active_only: bool) -> IndexResult<Vec<RepositoryInfo>> {
        let document = self.read_document()?;
        let mut entries: Vec<RepositoryInfo> = document
            .into_values()
            .filter(|entry| entry.active || !active_only)
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
        Ok(entries)
    }

    pub fn resolve(&self, repo_id: &str) -> IndexResult<Option<RepositoryInfo>> {
        Ok(self.read_document()?.shift_remove(repo_id))
    }

    /// Find the registry entry owning `path`, by stable id of the
    /// normalized path.
    pub fn resolve_by_path(&self, path: &Path) -> IndexResult<Option<RepositoryInfo>> {
        self.resolve(&crate::paths::repo_id(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> RepoRegistry {
        RepoRegistry::new(temp.path().join("repository_registry.json"))
    }

    fn info(path: &str, temp: &TempDir) -> RepositoryInfo {
        RepositoryInfo::new(Path::new(path), temp.path().join("idx"))
    }

    #[test]
    fn test_absent_file_is_empty_registry() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        assert!(registry.list(true).unwrap().is_empty());
        assert!(registry.resolve("ffffffffffff").unwrap().is_none());
    }

    #[test]
    fn test_register_and_resolve_by_path() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        registry.register(info("/repos/alpha", &temp)).unwrap();

        let found = registry
            .resolve_by_path(Path::new("/repos/alpha"))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "alpha");
        assert!(found.active);
        assert_eq!(found.repository_id.len(), 12);
    }

    #[test]
    fn test_update_stats() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let entry = info("/repos/alpha", &temp);
        let id = entry.repository_id.clone();
        registry.register(entry).unwrap();

        let mut stats = RepositoryStats::default();
        stats.total_files = 12;
        stats.total_symbols = 340;
        stats.languages.insert("python".into(), 12);
        registry.update_stats(&id, &stats).unwrap();

        let found = registry.resolve(&id).unwrap().unwrap();
        assert_eq!(found.total_files, 12);
        assert_eq!(found.language_stats.get("python"), Some(&12));
    }

    #[test]
    fn test_deactivate_hides_from_active_list() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let entry = info("/repos/alpha", &temp);
        let id = entry.repository_id.clone();
        registry.register(entry).unwrap();

        registry.deactivate(&id).unwrap();
        assert!(registry.list(true).unwrap().is_empty());
        assert_eq!(registry.list(false).unwrap().len(), 1);
    }

    #[test]
    fn test_priority_ordering() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let alpha = info("/repos/alpha", &temp);
        let mut beta = info("/repos/beta", &temp);
        beta.priority = 5;
        registry.register(alpha).unwrap();
        registry.register(beta).unwrap();

        let listed = registry.list(true).unwrap();
        assert_eq!(listed[0].name, "beta");
        assert_eq!(listed[1].name, "alpha");
    }

    #[test]
    fn test_update_stats_unknown_repo_fails() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let err = registry
            .update_stats("000000000000", &RepositoryStats::default())
            .unwrap_err();
        assert!(matches!(err, IndexError::RepositoryNotFound { .. }));
    }

    #[test]
    fn test_document_shape_is_stable() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);
        let entry = info("/repos/alpha", &temp);
        let id = entry.repository_id.clone();
        registry.register(entry).unwrap();

        let raw = std::fs::read_to_string(registry.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = value.get(&id).expect("keyed by repository id");
        for field in [
            "repository_id",
            "name",
            "path",
            "index_path",
            "language_stats",
            "total_files",
            "total_symbols",
            "indexed_at",
            "active",
            "priority",
        ] {
            assert!(record.get(field).is_some(), "missing field {field}");
        }
    }
}
