//! Multi-repository dispatcher: the outermost API surface of the engine.
//!
//! A `CoreContext` owns the shared state (settings, plugin registry,
//! repository registry, fuzzy index, per-repository index pool) and is
//! passed by reference; there are no globals. The `Dispatcher` routes
//! indexing and queries across one or many repositories:
//!
//! - `index_file` / `index_directory` write through the storage engine,
//!   with a bounded walker -> parser -> writer pipeline and deterministic,
//!   sorted-path file id assignment.
//! - `lookup` and `search` fan out across active repositories in priority
//!   order and merge deterministically; search interleaves round-robin.
//! - `find_references` scans stored content for whole-word occurrences.
//! - `health_check` verifies the registry, every active index, and that
//!   content rows hold source text rather than hashes.

pub mod cancel;
pub mod walker;

pub use cancel::{CancelToken, Deadline};
pub use walker::{FileWalker, WalkClass, WalkEntry};

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::fuzzy::FuzzyIndex;
use crate::parsing::{ParsedFile, ParserSet, PluginRegistry};
use crate::registry::{RepoRegistry, RepositoryInfo};
use crate::semantic::SemanticBackend;
use crate::storage::{CodeIndex, ContentRow, NewFile};
use crate::symbol::Symbol;
use crate::types::{FileId, SymbolKind};
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Files written between intermediate commits during bulk indexing.
const COMMIT_EVERY: usize = 64;

/// Rows produced by indexing a single file.
#[derive(Debug, Clone)]
pub struct IndexShard {
    pub file: PathBuf,
    pub file_id: FileId,
    pub language: String,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub symbols: Vec<Symbol>,
}

/// Counters returned by `index_directory`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total: u64,
    pub indexed: u64,
    pub ignored: u64,
    pub failed: u64,
    pub cancelled: bool,
}

/// A resolved symbol definition.
#[derive(Debug, Clone)]
pub struct SymbolDef {
    pub symbol: String,
    pub kind: String,
    pub language: String,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub defined_in: PathBuf,
    pub line: u32,
    pub span: (u32, u32),
    pub repository: String,
}

/// One search hit, annotated with its repository.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub repository: String,
    pub file: PathBuf,
    pub line: u32,
    pub snippet: String,
    pub score: f32,
}

/// Search results plus completion markers.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub truncated: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference {
    pub file: PathBuf,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: String,
    pub indexed_repos: usize,
    pub total_files: u64,
    pub warnings: Vec<String>,
}

/// Options for `search`.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub semantic: bool,
    pub repository_filter: Option<Vec<String>>,
    pub deadline: Deadline,
    pub cancel: CancelToken,
}

/// Shared engine state, passed by reference to every operation.
pub struct CoreContext {
    pub settings: Arc<Settings>,
    pub plugins: Arc<PluginRegistry>,
    pub registry: RepoRegistry,
    pub fuzzy: FuzzyIndex,
    index_root: PathBuf,
    pool: DashMap<String, Arc<CodeIndex>>,
    parsers: Mutex<Option<ParserSet>>,
    semantic: Option<Arc<dyn SemanticBackend>>,
}

impl CoreContext {
    pub fn new(settings: Settings, registry: RepoRegistry) -> Self {
        Self {
            settings: Arc::new(settings),
            plugins: Arc::new(PluginRegistry::with_default_plugins()),
            registry,
            fuzzy: FuzzyIndex::new(),
            index_root: crate::paths::index_storage_root(),
            pool: DashMap::new(),
            parsers: Mutex::new(None),
            semantic: None,
        }
    }

    /// Redirect index storage (used by tests and the migration tool).
    pub fn with_index_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.index_root = root.into();
        self
    }

    pub fn with_semantic_backend(mut self, backend: Arc<dyn SemanticBackend>) -> Self {
        self.semantic = Some(backend);
        self
    }

    pub fn index_root(&self) -> &Path {
        &self.index_root
    }

    /// Index directory for a repository rooted at `path`.
    pub fn index_path_for(&self, path: &Path) -> PathBuf {
        self.index_root
            .join(crate::paths::repo_id(path))
            .join("code_index")
    }

    /// Open an existing index, pooled per repository id.
    fn open_index(&self, repo: &RepositoryInfo) -> IndexResult<Arc<CodeIndex>> {
        if let Some(found) = self.pool.get(&repo.repository_id) {
            return Ok(found.clone());
        }
        if !CodeIndex::exists(&repo.index_path) {
            return Err(IndexError::IndexNotFound {
                repo_id: repo.repository_id.clone(),
                path: repo.index_path.clone(),
            });
        }
        let opened = Arc::new(CodeIndex::create_or_open(&repo.index_path)?);
        self.pool.insert(repo.repository_id.clone(), opened.clone());
        Ok(opened)
    }

    /// Open or create the index for a repository, registering it when new.
    fn ensure_repository(&self, root: &Path) -> IndexResult<(RepositoryInfo, Arc<CodeIndex>)> {
        let info = match self.registry.resolve_by_path(root)? {
            Some(info) => info,
            None => {
                let info = RepositoryInfo::new(root, self.index_path_for(root));
                self.registry.register(info.clone())?;
                info
            }
        };
        if let Some(found) = self.pool.get(&info.repository_id) {
            return Ok((info, found.clone()));
        }
        let store = Arc::new(CodeIndex::create_or_open(&info.index_path)?);
        if store.repository()?.is_none() {
            store.start_batch()?;
            store.set_repository(
                &info.repository_id,
                &info.path.to_string_lossy(),
                &info.name,
            )?;
            store.commit_batch()?;
        }
        self.pool.insert(info.repository_id.clone(), store.clone());
        Ok((info, store))
    }

    /// Registered repository owning `path`, if any.
    fn repository_containing(&self, path: &Path) -> IndexResult<Option<RepositoryInfo>> {
        let normalized = crate::paths::normalize(path);
        Ok(self
            .registry
            .list(false)?
            .into_iter()
            .find(|repo| normalized.starts_with(&repo.path)))
    }

    fn with_parsers<T>(&self, f: impl FnOnce(&mut ParserSet) -> T) -> T {
        let mut guard = self.parsers.lock();
        let parsers = guard.get_or_insert_with(|| ParserSet::new(self.plugins.clone()));
        f(parsers)
    }
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("index_root", &self.index_root)
            .finish()
    }
}

/// Outcome of parsing one file in the pipeline.
enum WorkOutcome {
    Parsed(Box<ParsedJob>),
    SkipBinary,
    Unsupported,
    Failed(String),
}

struct ParsedJob {
    path: PathBuf,
    content: String,
    size: u64,
    last_modified: u64,
    parsed: ParsedFile,
}

fn read_and_parse(path: &Path, parsers: &mut ParserSet) -> WorkOutcome {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return WorkOutcome::Failed(e.to_string()),
    };
    if walker::is_binary(&bytes) {
        return WorkOutcome::SkipBinary;
    }
    let last_modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let size = bytes.len() as u64;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    match parsers.parse(path, &content) {
        None => WorkOutcome::Unsupported,
        Some(Err(reason)) => WorkOutcome::Failed(reason),
        Some(Ok(parsed)) => WorkOutcome::Parsed(Box::new(ParsedJob {
            path: path.to_path_buf(),
            content,
            size,
            last_modified,
            parsed,
        })),
    }
}

fn content_row_for(path: &Path, content: &str, parsed: &ParsedFile) -> ContentRow {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let symbols = parsed
        .symbols
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let comments = parsed
        .symbols
        .iter()
        .filter_map(|s| s.documentation.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    ContentRow {
        filepath: path.to_string_lossy().into_owned(),
        filename,
        content: content.to_string(),
        language: parsed.language.clone(),
        symbols,
        imports: parsed.imports.join(" "),
        comments,
    }
}

/// Routes indexing and queries across repositories.
pub struct Dispatcher {
    context: Arc<CoreContext>,
}

impl Dispatcher {
    pub fn new(context: Arc<CoreContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &CoreContext {
        &self.context
    }

    /// Index one file. Parser failures are recovered: the shard comes back
    /// with no symbols and the failure is logged, never raised.
    pub fn index_file(&self, path: &Path, content: &str) -> IndexResult<IndexShard> {
        let path = crate::paths::normalize(path);
        let repo_root = match self.context.repository_containing(&path)? {
            Some(repo) => repo.path,
            None => path
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| IndexError::InvalidInput {
                    reason: format!("cannot determine repository for '{}'", path.display()),
                })?,
        };
        let (info, store) = self.context.ensure_repository(&repo_root)?;

        let parsed = match self.context.with_parsers(|parsers| parsers.parse(&path, content)) {
            Some(Ok(parsed)) => parsed,
            Some(Err(reason)) => {
                warn!(path = %path.display(), reason = %reason, "parser construction failed; indexing without symbols");
                ParsedFile::default()
            }
            None => {
                return Err(IndexError::InvalidInput {
                    reason: format!("no parser registered for '{}'", path.display()),
                });
            }
        };

        let job = ParsedJob {
            path: path.clone(),
            content: content.to_string(),
            size: content.len() as u64,
            last_modified: 0,
            parsed,
        };

        store.start_batch()?;
        let shard = match self.write_job(&info, &store, &job) {
            Ok(shard) => shard,
            Err(e) => {
                store.rollback_batch()?;
                return Err(e);
            }
        };
        store.commit_batch()?;
        self.context.registry.update_stats(&info.repository_id, &store.repository_stats()?)?;
        Ok(shard)
    }

    /// Write one parsed job inside the active batch and refresh the fuzzy
    /// index. Returns the resulting shard.
    fn write_job(
        &self,
        info: &RepositoryInfo,
        store: &CodeIndex,
        job: &ParsedJob,
    ) -> IndexResult<IndexShard> {
        let relative = job
            .path
            .strip_prefix(&info.path)
            .unwrap_or(&job.path)
            .to_string_lossy()
            .into_owned();
        let content_hash = format!("{:x}", Sha256::digest(job.content.as_bytes()));
        let record = NewFile {
            path: job.path.to_string_lossy().into_owned(),
            relative_path: relative,
            language: job.parsed.language.clone(),
            size: job.size,
            content_hash,
            last_modified: job.last_modified,
            line_count: job.content.lines().count() as u64,
        };

        let row = content_row_for(&job.path, &job.content, &job.parsed);
        let file_id = store.upsert_file(&record, (!job.content.is_empty()).then_some(&row))?;
        store.upsert_symbols(file_id, &record.path, &job.parsed.symbols)?;

        self.context.fuzzy.remove_file(&job.path);
        if !job.content.is_empty() {
            self.context.fuzzy.add_file(&job.path, &job.content);
        }
        for symbol in &job.parsed.symbols {
            self.context.fuzzy.add_symbol(
                &symbol.name,
                &job.path,
                symbol.range.start_line,
                &symbol.metadata,
            );
        }

        Ok(IndexShard {
            file: job.path.clone(),
            file_id,
            language: job.parsed.language.clone(),
            package: job.parsed.package.clone(),
            imports: job.parsed.imports.clone(),
            symbols: job.parsed.symbols.clone(),
        })
    }

    /// Index a directory tree.
    ///
    /// Files are discovered in sorted order and written in that order, so
    /// file id assignment is reproducible. Parsing runs on a worker pool
    /// behind a bounded queue; the walker blocks when the queue fills.
    pub fn index_directory(
        &self,
        root: &Path,
        recursive: bool,
        cancel: &CancelToken,
    ) -> IndexResult<IndexStats> {
        let root = crate::paths::normalize(root);
        let (info, store) = self.context.ensure_repository(&root)?;

        let entries = FileWalker::new(&self.context.settings).walk(&root, recursive);
        let mut stats = IndexStats {
            total: entries.len() as u64,
            ..Default::default()
        };

        let mut work = Vec::new();
        for entry in entries {
            match entry.class {
                WalkClass::Indexable => work.push(entry.path),
                WalkClass::SkipSize(size) => {
                    debug!(path = %entry.path.display(), size, "skipping oversized file");
                    stats.ignored += 1;
                }
                WalkClass::Error(reason) => {
                    warn!(path = %entry.path.display(), reason = %reason, "walk error");
                    stats.failed += 1;
                }
            }
        }

        let workers = self.context.settings.indexing.parallel_threads.max(1);
        let queue_capacity = self.context.settings.indexing.queue_capacity.max(1);
        let plugins = self.context.plugins.clone();

        let (work_tx, work_rx) = crossbeam_channel::bounded::<(u64, PathBuf)>(queue_capacity);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<(u64, WorkOutcome)>(queue_capacity);

        let mut write_error: Option<IndexError> = None;

        std::thread::scope(|scope| {
            let feeder_cancel = cancel.clone();
            scope.spawn(move || {
                for (seq, path) in work.into_iter().enumerate() {
                    if feeder_cancel.is_cancelled() {
                        break;
                    }
                    if work_tx.send((seq as u64, path)).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let done_tx = done_tx.clone();
                let plugins = plugins.clone();
                let worker_cancel = cancel.clone();
                scope.spawn(move || {
                    let mut parsers = ParserSet::new(plugins);
                    while let Ok((seq, path)) = work_rx.recv() {
                        if worker_cancel.is_cancelled() {
                            break;
                        }
                        let outcome = read_and_parse(&path, &mut parsers);
                        if done_tx.send((seq, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);
            drop(work_rx);

            // Writer: single thread, strict sequence order.
            let mut buffer: BTreeMap<u64, WorkOutcome> = BTreeMap::new();
            let mut next_seq = 0u64;
            let mut since_commit = 0usize;

            let result: IndexResult<()> = (|| {
                store.start_batch()?;
                'collect: for (seq, outcome) in done_rx.iter() {
                    buffer.insert(seq, outcome);
                    while let Some(outcome) = buffer.remove(&next_seq) {
                        if cancel.is_cancelled() {
                            break 'collect;
                        }
                        next_seq += 1;
                        match outcome {
                            WorkOutcome::Parsed(job) => {
                                self.write_job(&info, &store, &job)?;
                                stats.indexed += 1;
                                since_commit += 1;
                                if since_commit >= COMMIT_EVERY {
                                    store.commit_batch()?;
                                    store.start_batch()?;
                                    since_commit = 0;
                                }
                            }
                            WorkOutcome::SkipBinary | WorkOutcome::Unsupported => {
                                stats.ignored += 1;
                            }
                            WorkOutcome::Failed(reason) => {
                                debug!(reason = %reason, "file failed to parse");
                                stats.failed += 1;
                            }
                        }
                    }
                }

                if cancel.is_cancelled() {
                    stats.cancelled = true;
                    store.rollback_batch()?;
                } else {
                    store.commit_batch()?;
                }
                Ok(())
            })();

            // Unblock any worker still parked on a full done queue so the
            // scope join cannot deadlock.
            drop(done_rx);

            if let Err(e) = result {
                let _ = store.rollback_batch();
                write_error = Some(e);
            }
        });

        if let Some(e) = write_error {
            return Err(e);
        }

        self.context
            .registry
            .update_stats(&info.repository_id, &store.repository_stats()?)?;
        Ok(stats)
    }

    /// Exact-name lookup across the active repository set, ordered by
    /// repository priority, then kind priority, then insertion order.
    pub fn lookup(&self, name: &str, kind: Option<SymbolKind>) -> IndexResult<Option<SymbolDef>> {
        if name.trim().is_empty() {
            return Err(IndexError::InvalidInput {
                reason: "symbol name must not be empty".to_string(),
            });
        }
        for repo in self.active_repositories()? {
            let store = match self.context.open_index(&repo) {
                Ok(store) => store,
                Err(e) => {
                    warn!(repo = %repo.repository_id, error = %e, "skipping unopenable index");
                    continue;
                }
            };
            let found = store.lookup_symbol(name, kind, 1)?;
            let Some(symbol) = found.into_iter().next() else {
                continue;
            };
            let file = symbol
                .file_id
                .and_then(|id| store.file_record(id).transpose())
                .transpose()?;
            let (defined_in, language) = match file {
                Some(record) => (PathBuf::from(record.path), record.language),
                None => (PathBuf::new(), String::new()),
            };
            return Ok(Some(SymbolDef {
                symbol: symbol.name.clone(),
                kind: symbol.kind_label(),
                language,
                signature: symbol.signature.clone(),
                doc: symbol.documentation.clone(),
                defined_in,
                line: symbol.range.start_line,
                span: (symbol.range.start_line, symbol.range.end_line),
                repository: repo.repository_id.clone(),
            }));
        }
        Ok(None)
    }

    /// Active repositories in priority order. With multi-repository mode
    /// disabled, only the repository owning the current workspace remains.
    fn active_repositories(&self) -> IndexResult<Vec<RepositoryInfo>> {
        let mut repos = self.context.registry.list(true)?;
        if !self.context.settings.multi_repo {
            let workspace = crate::paths::normalize(&crate::paths::workspace_root());
            repos.retain(|repo| workspace.starts_with(&repo.path));
            repos.truncate(1);
        }
        Ok(repos)
    }

    /// Repositories addressed by a search: the explicit filter when given
    /// (inactive repositories may be addressed explicitly), otherwise the
    /// active set in priority order.
    fn search_targets(&self, options: &SearchOptions) -> IndexResult<Vec<RepositoryInfo>> {
        match &options.repository_filter {
            Some(ids) => {
                let mut targets = Vec::with_capacity(ids.len());
                for id in ids {
                    let repo = self.context.registry.resolve(id)?.ok_or_else(|| {
                        IndexError::InvalidInput {
                            reason: format!("unknown repository id '{id}'"),
                        }
                    })?;
                    targets.push(repo);
                }
                targets.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));
                Ok(targets)
            }
            None => self.active_repositories(),
        }
    }

    /// Full-text search across repositories.
    pub fn search(&self, query: &str, options: &SearchOptions) -> IndexResult<SearchOutcome> {
        if query.trim().is_empty() {
            return Err(IndexError::InvalidInput {
                reason: "query must not be empty".to_string(),
            });
        }
        let limit = options
            .limit
            .unwrap_or(self.context.settings.search.default_limit)
            .max(1);

        if options.semantic {
            if let Some(outcome) = self.try_semantic(query, limit)? {
                return Ok(outcome);
            }
            debug!("semantic search unavailable; falling back to BM25");
        }

        let targets = self.search_targets(options)?;
        let per_repo_budget =
            Duration::from_millis(self.context.settings.search.per_repo_budget_ms);
        let context_lines = self.context.settings.search.context_lines;

        let mut outcome = SearchOutcome::default();
        let mut per_repo: Vec<Vec<SearchResult>> = Vec::new();

        for repo in &targets {
            if options.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            if options.deadline.expired() {
                outcome.truncated = true;
                break;
            }
            // Hard per-repository cap applies regardless of the caller's
            // deadline.
            let budget = Deadline::within(options.deadline.remaining_capped(per_repo_budget));

            let store = match self.context.open_index(repo) {
                Ok(store) => store,
                Err(e) => {
                    warn!(repo = %repo.repository_id, error = %e, "skipping unopenable index");
                    continue;
                }
            };
            let hits = store.search_bm25(query, limit).map_err(|e| match e {
                crate::error::StorageError::Query(reason) => IndexError::InvalidInput { reason },
                other => IndexError::Storage(other),
            })?;
            let mut results = Vec::with_capacity(hits.len());
            for hit in hits {
                let snippet = match store.file_content(hit.file_id)? {
                    Some(content) => {
                        crate::storage::snippet::line_context(&content, hit.line, context_lines)
                    }
                    None => hit.snippet.clone(),
                };
                results.push(SearchResult {
                    repository: repo.repository_id.clone(),
                    file: PathBuf::from(hit.filepath),
                    line: hit.line,
                    snippet,
                    score: -hit.rank,
                });
            }
            per_repo.push(results);
            if budget.expired() {
                debug!(repo = %repo.repository_id, "per-repository search budget exhausted");
            }
        }

        // Round-robin interleave across repositories up to the limit.
        let mut cursors: Vec<std::vec::IntoIter<SearchResult>> =
            per_repo.into_iter().map(Vec::into_iter).collect();
        'fill: loop {
            let mut yielded = false;
            for cursor in cursors.iter_mut() {
                if let Some(result) = cursor.next() {
                    outcome.results.push(result);
                    yielded = true;
                    if outcome.results.len() >= limit {
                        break 'fill;
                    }
                }
            }
            if !yielded {
                break;
            }
        }
        Ok(outcome)
    }

    /// Semantic path: delegate to the configured backend when enabled.
    /// Returns None (fall back to BM25) when absent, disabled, or failing.
    fn try_semantic(&self, query: &str, limit: usize) -> IndexResult<Option<SearchOutcome>> {
        if !self.context.settings.semantic.enabled {
            return Ok(None);
        }
        let Some(backend) = &self.context.semantic else {
            return Ok(None);
        };
        match backend.search(query, limit) {
            Ok(hits) => {
                let repos = self.context.registry.list(true)?;
                let results = hits
                    .into_iter()
                    .map(|hit| {
                        let repository = repos
                            .iter()
                            .find(|repo| hit.file.starts_with(&repo.path))
                            .map(|repo| repo.repository_id.clone())
                            .unwrap_or_default();
                        SearchResult {
                            repository,
                            file: hit.file,
                            line: hit.line,
                            snippet: hit.snippet,
                            score: hit.score,
                        }
                    })
                    .collect();
                Ok(Some(SearchOutcome {
                    results,
                    truncated: false,
                    cancelled: false,
                }))
            }
            Err(reason) => {
                debug!(backend = backend.name(), reason = %reason, "semantic backend failed");
                Ok(None)
            }
        }
    }

    /// Whole-word textual references to a symbol across all active
    /// repositories, deduplicated by (file, line). No hard cap; callers
    /// paginate.
    pub fn find_references(
        &self,
        name: &str,
        deadline: &Deadline,
        cancel: &CancelToken,
    ) -> IndexResult<Vec<Reference>> {
        if name.trim().is_empty() {
            return Err(IndexError::InvalidInput {
                reason: "symbol name must not be empty".to_string(),
            });
        }
        let pattern = regex::Regex::new(&format!(r"\b{}\b", regex::escape(name)))
            .map_err(|e| IndexError::InvalidInput {
                reason: format!("unusable symbol name: {e}"),
            })?;

        let mut references: std::collections::BTreeSet<Reference> = Default::default();
        'repos: for repo in self.active_repositories()? {
            let store = match self.context.open_index(&repo) {
                Ok(store) => store,
                Err(e) => {
                    warn!(repo = %repo.repository_id, error = %e, "skipping unopenable index");
                    continue;
                }
            };
            for row in store.all_content()? {
                if cancel.is_cancelled() || deadline.expired() {
                    break 'repos;
                }
                for (idx, line) in row.row.content.lines().enumerate() {
                    if pattern.is_match(line) {
                        references.insert(Reference {
                            file: PathBuf::from(&row.file_path),
                            line: idx as u32 + 1,
                        });
                    }
                }
            }
        }
        Ok(references.into_iter().collect())
    }

    /// Quick name suggestions from the in-memory fuzzy index. Not
    /// authoritative; the storage engine is.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<crate::fuzzy::FuzzyMatch> {
        self.context.fuzzy.search(query, limit)
    }

    /// Quick sanity pass over the registry and every active index.
    pub fn health_check(&self) -> HealthReport {
        let mut warnings = Vec::new();
        let repos = match self.context.registry.list(true) {
            Ok(repos) => repos,
            Err(e) => {
                return HealthReport {
                    status: "error".to_string(),
                    indexed_repos: 0,
                    total_files: 0,
                    warnings: vec![format!("registry unreadable: {e}")],
                };
            }
        };

        let mut total_files = 0u64;
        let mut indexed_repos = 0usize;
        for repo in &repos {
            match self.context.open_index(repo) {
                Ok(store) => {
                    indexed_repos += 1;
                    match store.repository_stats() {
                        Ok(stats) => total_files += stats.total_files,
                        Err(e) => warnings
                            .push(format!("{}: stats unavailable: {e}", repo.repository_id)),
                    }
                    match store.sample_content_head(64) {
                        Ok(Some(head)) if looks_like_hash(&head) => warnings.push(format!(
                            "{}: content column holds hash-like data, search will return nothing",
                            repo.repository_id
                        )),
                        Ok(_) => {}
                        Err(e) => warnings
                            .push(format!("{}: content sample failed: {e}", repo.repository_id)),
                    }
                }
                Err(e) => warnings.push(format!("{}: {e}", repo.repository_id)),
            }
        }

        HealthReport {
            status: if warnings.is_empty() { "ok" } else { "degraded" }.to_string(),
            indexed_repos,
            total_files,
            warnings,
        }
    }
}

/// Heuristic for the single biggest failure mode: a content column holding
/// a digest instead of source text.
fn looks_like_hash(head: &str) -> bool {
    let head = head.trim_start();
    if head.starts_with("sha256:") {
        return true;
    }
    let hex_prefix: usize = head.chars().take_while(|c| c.is_ascii_hexdigit()).count();
    hex_prefix >= 32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_hash() {
        assert!(looks_like_hash(
            "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        ));
        assert!(looks_like_hash(
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        ));
        assert!(!looks_like_hash("def authenticate_user(): pass"));
        assert!(!looks_like_hash("cafe was here"));
    }
}
