//! Migration of a legacy unified index into per-repository indexes.
//!
//! A unified index holds many repositories' rows distinguished only by
//! their file path prefixes. Migration scans the content rows, groups them
//! by the caller-supplied prefix rules, and replays each group into a fresh
//! per-repository index with newly assigned file ids and remapped symbols,
//! then registers every migrated repository.
//!
//! Rerunning is a no-op for repositories whose target index already exists
//! and is non-empty (overridable with `force`). A failure in one repository
//! does not affect the others; failures are reported for retry.

use crate::dispatch::CancelToken;
use crate::error::{IndexError, IndexResult};
use crate::registry::{RepoRegistry, RepositoryInfo};
use crate::storage::{CodeIndex, FileRecord, NewFile, StoredContent};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Caller-supplied migration rules. The prefix set is heuristic and
/// repository-set-specific, so it is an input, never guessed.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub prefixes: Vec<PathBuf>,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct RepoMigration {
    pub repo_id: String,
    pub path: PathBuf,
    pub files: u64,
    pub symbols: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub migrated: Vec<RepoMigration>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Content rows matching none of the prefix rules.
    pub unmatched: u64,
    pub cancelled: bool,
}

/// Split `legacy_path` into per-repository indexes under `index_root`.
pub fn migrate_unified_index(
    legacy_path: &Path,
    index_root: &Path,
    registry: &RepoRegistry,
    plan: &MigrationPlan,
    cancel: &CancelToken,
) -> IndexResult<MigrationReport> {
    if plan.prefixes.is_empty() {
        return Err(IndexError::InvalidInput {
            reason: "migration requires at least one repository prefix".to_string(),
        });
    }
    if !CodeIndex::exists(legacy_path) {
        return Err(IndexError::IndexNotFound {
            repo_id: "unified".to_string(),
            path: legacy_path.to_path_buf(),
        });
    }

    let legacy = CodeIndex::create_or_open(legacy_path)?;
    let rows = legacy.all_content()?;
    let file_records: BTreeMap<u32, FileRecord> = legacy
        .all_files()?
        .into_iter()
        .map(|record| (record.id.value(), record))
        .collect();

    // Group rows by the first matching prefix, keeping prefix order
    // deterministic.
    let mut groups: BTreeMap<PathBuf, Vec<StoredContent>> = BTreeMap::new();
    let mut report = MigrationReport::default();
    for row in rows {
        let matched = plan
            .prefixes
            .iter()
            .find(|prefix| Path::new(&row.file_path).starts_with(prefix));
        match matched {
            Some(prefix) => groups.entry(prefix.clone()).or_default().push(row),
            None => report.unmatched += 1,
        }
    }

    for (prefix, mut rows) in groups {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let repo_id = crate::paths::repo_id(&prefix);
        let target = index_root.join(&repo_id).join("code_index");

        if !plan.force && CodeIndex::exists(&target) {
            match CodeIndex::create_or_open(&target).and_then(|idx| idx.is_empty()) {
                Ok(false) => {
                    info!(repo = %repo_id, "target index already populated, skipping");
                    report.skipped.push(repo_id);
                    continue;
                }
                Ok(true) => {}
                Err(e) => {
                    report.failed.push((repo_id, e.to_string()));
                    continue;
                }
            }
        }

        rows.sort_by_key(|row| row.file_id);
        match migrate_one(&legacy, &prefix, &repo_id, &target, &rows, &file_records) {
            Ok(migration) => {
                let mut info = RepositoryInfo::new(&prefix, target.clone());
                info.total_files = migration.files;
                info.total_symbols = migration.symbols;
                registry.register(info)?;
                if let Ok(opened) = CodeIndex::create_or_open(&target) {
                    if let Ok(stats) = opened.repository_stats() {
                        registry.update_stats(&repo_id, &stats)?;
                    }
                }
                report.migrated.push(migration);
            }
            Err(e) => {
                warn!(repo = %repo_id, error = %e, "repository migration failed");
                report.failed.push((repo_id, e.to_string()));
            }
        }
    }

    Ok(report)
}

fn migrate_one(
    legacy: &CodeIndex,
    prefix: &Path,
    repo_id: &str,
    target: &Path,
    rows: &[StoredContent],
    file_records: &BTreeMap<u32, FileRecord>,
) -> IndexResult<RepoMigration> {
    let store = CodeIndex::create_or_open(target)?;
    store.start_batch()?;

    let result = (|| -> IndexResult<(u64, u64)> {
        let name = prefix
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repository");
        store.set_repository(repo_id, &prefix.to_string_lossy(), name)?;

        let mut files = 0u64;
        let mut symbols = 0u64;
        for row in rows {
            let relative = Path::new(&row.file_path)
                .strip_prefix(prefix)
                .unwrap_or(Path::new(&row.file_path))
                .to_string_lossy()
                .into_owned();

            // Prefer the legacy file row; fall back to deriving one from
            // the content row when the unified index never had it.
            let record = file_records.get(&row.file_id.value());
            let new_file = NewFile {
                path: row.file_path.clone(),
                relative_path: relative,
                language: record
                    .map(|r| r.language.clone())
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| row.row.language.clone()),
                size: record
                    .map(|r| r.size)
                    .unwrap_or(row.row.content.len() as u64),
                content_hash: record.map(|r| r.content_hash.clone()).unwrap_or_default(),
                last_modified: record.map(|r| r.last_modified).unwrap_or(0),
                line_count: record
                    .map(|r| r.line_count)
                    .unwrap_or(row.row.content.lines().count() as u64),
            };

            let new_id = store.upsert_file(
                &new_file,
                (!row.row.content.is_empty()).then_some(&row.row),
            )?;
            files += 1;

            let old_symbols = legacy.list_symbols_in_file(row.file_id)?;
            symbols += old_symbols.len() as u64;
            store.upsert_symbols(new_id, &row.file_path, &old_symbols)?;
        }
        Ok((files, symbols))
    })();

    match result {
        Ok((files, symbols)) => {
            store.commit_batch()?;
            Ok(RepoMigration {
                repo_id: repo_id.to_string(),
                path: prefix.to_path_buf(),
                files,
                symbols,
            })
        }
        Err(e) => {
            store.rollback_batch()?;
            Err(e)
        }
    }
}
