//! Per-repository on-disk index.
//!
//! One `CodeIndex` owns one repository's records: the repository row, file
//! rows, one BM25 content row per non-empty text file, symbol rows, and a
//! metadata row carrying the schema version and id counters. All writes go
//! through an explicit batch; a batch either commits atomically or rolls
//! back leaving the index unchanged.
//!
//! Readers may proceed concurrently with the single writer; they observe the
//! last committed state.

use crate::error::{StorageError, StorageResult};
use crate::storage::schema::{
    IndexSchema, PREFIX_LENGTHS, SCHEMA_VERSION, doc_type, register_tokenizers, token_prefixes,
};
use crate::storage::snippet;
use crate::symbol::Symbol;
use crate::types::{FileCounter, FileId, Range, SymbolCounter, SymbolId, SymbolKind, Visibility};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument, Term};

const WRITER_BUFFER_BYTES: usize = 100_000_000;
const SCAN_LIMIT: usize = 1_000_000;

/// Metadata keys persisted as `meta` documents.
const META_SCHEMA_VERSION: &str = "schema_version";
const META_FILE_COUNTER: &str = "file_counter";
const META_SYMBOL_COUNTER: &str = "symbol_counter";

/// Input for a file upsert. Ids and timestamps are assigned by the index.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub path: String,
    pub relative_path: String,
    pub language: String,
    pub size: u64,
    pub content_hash: String,
    pub last_modified: u64,
    pub line_count: u64,
}

/// A stored file row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    /// Always 1: a per-repository index owns exactly one repository.
    pub repository_id: u32,
    pub path: String,
    pub relative_path: String,
    pub language: String,
    pub size: u64,
    pub content_hash: String,
    pub last_modified: u64,
    pub indexed_at: u64,
    pub line_count: u64,
}

/// One BM25 row: the searchable projection of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentRow {
    pub filepath: String,
    pub filename: String,
    pub content: String,
    pub language: String,
    pub symbols: String,
    pub imports: String,
    pub comments: String,
}

/// A BM25 search hit. `rank` ascends: smaller is more relevant.
#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub file_id: FileId,
    pub filepath: String,
    pub line: u32,
    pub snippet: String,
    pub rank: f32,
}

/// Stored content of one file, for reference scans and migration.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub file_id: FileId,
    pub file_path: String,
    pub row: ContentRow,
}

/// Aggregate counters for one repository index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub total_files: u64,
    pub total_symbols: u64,
    pub languages: BTreeMap<String, u64>,
}

/// Per-repository index handle.
pub struct CodeIndex {
    index: Index,
    reader: IndexReader,
    schema: IndexSchema,
    index_path: PathBuf,
    writer: Mutex<Option<IndexWriter<TantivyDocument>>>,
    file_counter: Mutex<FileCounter>,
    symbol_counter: Mutex<SymbolCounter>,
}

impl std::fmt::Debug for CodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIndex")
            .field("index_path", &self.index_path)
            .finish()
    }
}

impl CodeIndex {
    /// Open an index at `path`, creating it (and its schema) when absent.
    /// Idempotent: re-opening an existing index validates its schema version.
    pub fn create_or_open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let index_path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&index_path).map_err(|source| StorageError::OpenDirectory {
            path: index_path.clone(),
            source,
        })?;

        let (schema, index_schema) = IndexSchema::build();
        let existed = index_path.join("meta.json").exists();

        let index = if existed {
            Index::open_in_dir(&index_path)?
        } else {
            let dir = MmapDirectory::open(&index_path)
                .map_err(|e| StorageError::Query(e.to_string()))?;
            Index::create(dir, schema, IndexSettings::default())?
        };
        register_tokenizers(&index);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        reader.reload()?;

        let store = Self {
            index,
            reader,
            schema: index_schema,
            index_path,
            writer: Mutex::new(None),
            file_counter: Mutex::new(FileCounter::new()),
            symbol_counter: Mutex::new(SymbolCounter::new()),
        };

        match store.query_metadata(META_SCHEMA_VERSION)? {
            Some(found) if found != SCHEMA_VERSION => {
                return Err(StorageError::SchemaVersion {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
            Some(_) => {}
            None => {
                store.start_batch()?;
                store.store_metadata(META_SCHEMA_VERSION, SCHEMA_VERSION)?;
                store.commit_batch()?;
            }
        }
        store.reload_counters()?;
        Ok(store)
    }

    /// True when an index directory exists at `path`.
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().join("meta.json").exists()
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }

    fn reload_counters(&self) -> StorageResult<()> {
        let next_file = self.query_metadata(META_FILE_COUNTER)?.unwrap_or(1) as u32;
        let next_symbol = self.query_metadata(META_SYMBOL_COUNTER)?.unwrap_or(1) as u32;
        *self.file_counter.lock() = FileCounter::from_next(next_file);
        *self.symbol_counter.lock() = SymbolCounter::from_next(next_symbol);
        Ok(())
    }

    // ---- batch lifecycle -------------------------------------------------

    /// Start a write batch. No-op when one is already active.
    pub fn start_batch(&self) -> StorageResult<()> {
        let mut writer_lock = self.writer.lock();
        if writer_lock.is_none() {
            let writer = self.index.writer::<TantivyDocument>(WRITER_BUFFER_BYTES)?;
            *writer_lock = Some(writer);
        }
        Ok(())
    }

    pub fn in_batch(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Commit the active batch and make its documents visible to readers.
    pub fn commit_batch(&self) -> StorageResult<()> {
        // Persist counters inside the same commit so a reopened index
        // resumes id assignment where it left off.
        {
            let writer_lock = self.writer.lock();
            if let Some(writer) = writer_lock.as_ref() {
                let next_file = self.file_counter.lock().peek_next() as u64;
                let next_symbol = self.symbol_counter.lock().peek_next() as u64;
                self.write_metadata(writer, META_FILE_COUNTER, next_file)?;
                self.write_metadata(writer, META_SYMBOL_COUNTER, next_symbol)?;
            }
        }
        let mut writer_lock = self.writer.lock();
        if let Some(mut writer) = writer_lock.take() {
            writer.commit()?;
            self.reader.reload()?;
        }
        Ok(())
    }

    /// Abandon the active batch. The index is left exactly as of the last
    /// commit; in-memory counters are rewound to the committed state.
    pub fn rollback_batch(&self) -> StorageResult<()> {
        let mut writer_lock = self.writer.lock();
        if let Some(mut writer) = writer_lock.take() {
            writer.rollback()?;
        }
        drop(writer_lock);
        self.reload_counters()
    }

    fn with_writer<T>(
        &self,
        f: impl FnOnce(&IndexWriter<TantivyDocument>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let writer_lock = self.writer.lock();
        let writer = writer_lock.as_ref().ok_or(StorageError::NoActiveBatch)?;
        f(writer)
    }

    // ---- repository row --------------------------------------------------

    /// Write the single repository row (replacing any previous one).
    pub fn set_repository(&self, repo_id: &str, path: &str, name: &str) -> StorageResult<()> {
        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_text(
                self.schema.doc_type,
                doc_type::REPOSITORY,
            ));
            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::REPOSITORY);
            doc.add_text(self.schema.repo_id, repo_id);
            doc.add_text(self.schema.repo_path, path);
            doc.add_text(self.schema.repo_name, name);
            writer.add_document(doc)?;
            Ok(())
        })
    }

    /// Read the repository row: (repo_id, path, name).
    pub fn repository(&self) -> StorageResult<Option<(String, String, String)>> {
        let searcher = self.reader.searcher();
        let query = self.doc_type_query(doc_type::REPOSITORY);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_score, addr)) = top.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(addr)?;
        Ok(Some((
            self.get_str(&doc, self.schema.repo_id),
            self.get_str(&doc, self.schema.repo_path),
            self.get_str(&doc, self.schema.repo_name),
        )))
    }

    // ---- file + content rows ---------------------------------------------

    /// Insert or replace a file row and its BM25 content row, transactional
    /// within the active batch. A file that is already present keeps its id.
    ///
    /// `content_row` is None for empty files: the file row is still written,
    /// no BM25 row is.
    pub fn upsert_file(
        &self,
        file: &NewFile,
        content_row: Option<&ContentRow>,
    ) -> StorageResult<FileId> {
        let file_id = match self.file_by_relative_path(&file.relative_path)? {
            Some(existing) => existing.id,
            None => self.file_counter.lock().next_id(),
        };
        let indexed_at = chrono::Utc::now().timestamp() as u64;

        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_text(self.schema.file_key, &file.relative_path));
            writer.delete_term(Term::from_field_text(
                self.schema.content_key,
                &file.relative_path,
            ));

            let mut doc = TantivyDocument::new();
            doc.add_text(self.schema.doc_type, doc_type::FILE);
            doc.add_u64(self.schema.file_id, file_id.value() as u64);
            doc.add_text(self.schema.file_key, &file.relative_path);
            doc.add_text(self.schema.file_path, &file.path);
            doc.add_text(self.schema.relative_path, &file.relative_path);
            doc.add_text(self.schema.language, &file.language);
            doc.add_u64(self.schema.file_size, file.size);
            doc.add_text(self.schema.content_hash, &file.content_hash);
            doc.add_u64(self.schema.last_modified, file.last_modified);
            doc.add_u64(self.schema.indexed_at, indexed_at);
            doc.add_u64(self.schema.line_count, file.line_count);
            writer.add_document(doc)?;

            if let Some(row) = content_row {
                let prefix_source = format!(
                    "{} {} {} {}",
                    row.filename, row.symbols, row.imports, row.content
                );
                let mut doc = TantivyDocument::new();
                doc.add_text(self.schema.doc_type, doc_type::CONTENT);
                doc.add_u64(self.schema.file_id, file_id.value() as u64);
                doc.add_text(self.schema.content_key, &file.relative_path);
                doc.add_text(self.schema.file_path, &file.path);
                doc.add_text(self.schema.filepath_text, &row.filepath);
                doc.add_text(self.schema.filename, &row.filename);
                doc.add_text(self.schema.content, &row.content);
                doc.add_text(self.schema.language, &row.language);
                doc.add_text(self.schema.symbols_text, &row.symbols);
                doc.add_text(self.schema.imports_text, &row.imports);
                doc.add_text(self.schema.comments_text, &row.comments);
                doc.add_text(self.schema.prefix, token_prefixes(&prefix_source));
                writer.add_document(doc)?;
            }
            Ok(())
        })?;
        Ok(file_id)
    }

    /// Replace all symbols of a file with `symbols`, assigning fresh ids.
    /// Returns the assigned ids in input order.
    pub fn upsert_symbols(
        &self,
        file_id: FileId,
        file_path: &str,
        symbols: &[Symbol],
    ) -> StorageResult<Vec<SymbolId>> {
        let mut assigned = Vec::with_capacity(symbols.len());
        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_u64(
                self.schema.symbol_file_id,
                file_id.value() as u64,
            ));

            let mut counter = self.symbol_counter.lock();
            for symbol in symbols {
                let symbol_id = counter.next_id();
                assigned.push(symbol_id);

                let payload = serde_json::json!({
                    "visibility": symbol.visibility,
                    "modifiers": symbol.modifiers,
                    "metadata": symbol.metadata,
                });

                let mut doc = TantivyDocument::new();
                doc.add_text(self.schema.doc_type, doc_type::SYMBOL);
                doc.add_u64(self.schema.symbol_id, symbol_id.value() as u64);
                doc.add_u64(self.schema.symbol_file_id, file_id.value() as u64);
                doc.add_u64(self.schema.file_id, file_id.value() as u64);
                doc.add_text(self.schema.file_path, file_path);
                doc.add_text(self.schema.name, &symbol.name);
                doc.add_text(self.schema.name_exact, &symbol.name);
                doc.add_text(self.schema.kind, symbol.kind_label());
                doc.add_u64(self.schema.line_start, symbol.range.start_line as u64);
                doc.add_u64(self.schema.line_end, symbol.range.end_line as u64);
                doc.add_u64(self.schema.column_start, symbol.range.start_column as u64);
                doc.add_u64(self.schema.column_end, symbol.range.end_column as u64);
                if let Some(signature) = &symbol.signature {
                    doc.add_text(self.schema.signature, signature);
                }
                if let Some(documentation) = &symbol.documentation {
                    doc.add_text(self.schema.documentation, documentation);
                }
                doc.add_text(self.schema.metadata_json, payload.to_string());
                writer.add_document(doc)?;
            }
            Ok(())
        })?;
        Ok(assigned)
    }

    /// Remove a file row together with its content row and symbols.
    pub fn remove_file(&self, file_id: FileId, relative_path: &str) -> StorageResult<()> {
        self.with_writer(|writer| {
            writer.delete_term(Term::from_field_text(self.schema.file_key, relative_path));
            writer.delete_term(Term::from_field_text(self.schema.content_key, relative_path));
            writer.delete_term(Term::from_field_u64(
                self.schema.symbol_file_id,
                file_id.value() as u64,
            ));
            Ok(())
        })
    }

    // ---- queries ---------------------------------------------------------

    fn doc_type_query(&self, value: &str) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(self.schema.doc_type, value),
            IndexRecordOption::Basic,
        )
    }

    fn get_str(&self, doc: &TantivyDocument, field: tantivy::schema::Field) -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    fn get_u64(&self, doc: &TantivyDocument, field: tantivy::schema::Field) -> u64 {
        doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0)
    }

    fn doc_to_file(&self, doc: &TantivyDocument) -> StorageResult<FileRecord> {
        let id = FileId::new(self.get_u64(doc, self.schema.file_id) as u32).ok_or(
            StorageError::MalformedDocument {
                id: None,
                field: "file_id",
            },
        )?;
        Ok(FileRecord {
            id,
            repository_id: 1,
            path: self.get_str(doc, self.schema.file_path),
            relative_path: self.get_str(doc, self.schema.relative_path),
            language: self.get_str(doc, self.schema.language),
            size: self.get_u64(doc, self.schema.file_size),
            content_hash: self.get_str(doc, self.schema.content_hash),
            last_modified: self.get_u64(doc, self.schema.last_modified),
            indexed_at: self.get_u64(doc, self.schema.indexed_at),
            line_count: self.get_u64(doc, self.schema.line_count),
        })
    }

    fn doc_to_symbol(&self, doc: &TantivyDocument) -> StorageResult<Symbol> {
        let kind_label = self.get_str(doc, self.schema.kind);
        let kind = SymbolKind::from_str(&kind_label).unwrap_or(SymbolKind::Variable);

        let payload: serde_json::Value = serde_json::from_str(
            doc.get_first(self.schema.metadata_json)
                .and_then(|v| v.as_str())
                .unwrap_or("{}"),
        )
        .unwrap_or(serde_json::Value::Null);

        let visibility = payload
            .get("visibility")
            .and_then(|v| serde_json::from_value::<Visibility>(v.clone()).ok())
            .unwrap_or_default();
        let modifiers = payload
            .get("modifiers")
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
            .unwrap_or_default();
        let metadata = payload
            .get("metadata")
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        let range = Range::new(
            self.get_u64(doc, self.schema.line_start) as u32,
            self.get_u64(doc, self.schema.column_start) as u16,
            self.get_u64(doc, self.schema.line_end) as u32,
            self.get_u64(doc, self.schema.column_end) as u16,
        );

        let signature = doc
            .get_first(self.schema.signature)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let documentation = doc
            .get_first(self.schema.documentation)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(Symbol {
            id: SymbolId::new(self.get_u64(doc, self.schema.symbol_id) as u32),
            file_id: FileId::new(self.get_u64(doc, self.schema.symbol_file_id) as u32),
            name: self.get_str(doc, self.schema.name_exact),
            kind,
            visibility,
            modifiers,
            range,
            signature,
            documentation,
            metadata,
        })
    }

    pub fn file_by_relative_path(&self, relative_path: &str) -> StorageResult<Option<FileRecord>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.schema.file_key, relative_path),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.into_iter().next() {
            Some((_score, addr)) => {
                let doc: TantivyDocument = searcher.doc(addr)?;
                Ok(Some(self.doc_to_file(&doc)?))
            }
            None => Ok(None),
        }
    }

    pub fn file_record(&self, file_id: FileId) -> StorageResult<Option<FileRecord>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::FILE)) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_u64(self.schema.file_id, file_id.value() as u64),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.into_iter().next() {
            Some((_score, addr)) => {
                let doc: TantivyDocument = searcher.doc(addr)?;
                Ok(Some(self.doc_to_file(&doc)?))
            }
            None => Ok(None),
        }
    }

    /// All file rows, ordered by id.
    pub fn all_files(&self) -> StorageResult<Vec<FileRecord>> {
        let searcher = self.reader.searcher();
        let query = self.doc_type_query(doc_type::FILE);
        let top = searcher.search(&query, &TopDocs::with_limit(SCAN_LIMIT))?;
        let mut files = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            files.push(self.doc_to_file(&doc)?);
        }
        files.sort_by_key(|f| f.id);
        Ok(files)
    }

    /// Stored content of one file.
    pub fn file_content(&self, file_id: FileId) -> StorageResult<Option<String>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::CONTENT)) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_u64(self.schema.file_id, file_id.value() as u64),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.into_iter().next() {
            Some((_score, addr)) => {
                let doc: TantivyDocument = searcher.doc(addr)?;
                Ok(Some(self.get_str(&doc, self.schema.content)))
            }
            None => Ok(None),
        }
    }

    /// All stored content rows, ordered by file id.
    pub fn all_content(&self) -> StorageResult<Vec<StoredContent>> {
        let searcher = self.reader.searcher();
        let query = self.doc_type_query(doc_type::CONTENT);
        let top = searcher.search(&query, &TopDocs::with_limit(SCAN_LIMIT))?;
        let mut rows = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let file_id = FileId::new(self.get_u64(&doc, self.schema.file_id) as u32).ok_or(
                StorageError::MalformedDocument {
                    id: None,
                    field: "file_id",
                },
            )?;
            rows.push(StoredContent {
                file_id,
                file_path: self.get_str(&doc, self.schema.file_path),
                row: ContentRow {
                    filepath: self.get_str(&doc, self.schema.filepath_text),
                    filename: self.get_str(&doc, self.schema.filename),
                    content: self.get_str(&doc, self.schema.content),
                    language: self.get_str(&doc, self.schema.language),
                    symbols: self.get_str(&doc, self.schema.symbols_text),
                    imports: self.get_str(&doc, self.schema.imports_text),
                    comments: self.get_str(&doc, self.schema.comments_text),
                },
            });
        }
        rows.sort_by_key(|r| r.file_id);
        Ok(rows)
    }

    /// Execute a BM25 match over the content surface.
    ///
    /// A single-token query ending in `*` is a prefix query: prefixes of
    /// length 2 and 3 resolve against the prefix field; longer ones fall
    /// back to matching the stripped token.
    ///
    /// Ordering: primary by rank ascending (smaller = more relevant),
    /// secondary by file id ascending for stability.
    pub fn search_bm25(&self, query_str: &str, limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        if let Some(stripped) = prefix_query(query_str) {
            if PREFIX_LENGTHS.contains(&stripped.chars().count()) {
                return self.search_prefix(stripped, limit);
            }
            return self.search_bm25(stripped, limit);
        }
        self.search_content(
            query_str,
            limit,
            vec![
                self.schema.content,
                self.schema.symbols_text,
                self.schema.filename,
                self.schema.filepath_text,
                self.schema.imports_text,
                self.schema.comments_text,
            ],
        )
    }

    /// Content rows holding a token starting with `prefix` (length 2 or 3),
    /// served by the prefix field.
    pub fn search_prefix(&self, prefix: &str, limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let needle = prefix.trim().to_lowercase();
        if !PREFIX_LENGTHS.contains(&needle.chars().count()) {
            return Err(StorageError::Query(format!(
                "prefix '{needle}' is not of an indexed length {PREFIX_LENGTHS:?}"
            )));
        }
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::CONTENT)) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.prefix, &needle),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);

        let top = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let file_id = FileId::new(self.get_u64(&doc, self.schema.file_id) as u32).ok_or(
                StorageError::MalformedDocument {
                    id: None,
                    field: "file_id",
                },
            )?;
            let content = self.get_str(&doc, self.schema.content);
            let (snippet_text, line) = match snippet::excerpt(&content, &needle) {
                Some(excerpt) => (excerpt.text, excerpt.line),
                None => (content.lines().next().unwrap_or("").trim().to_string(), 1),
            };
            hits.push(Bm25Hit {
                file_id,
                filepath: self.get_str(&doc, self.schema.file_path),
                line,
                snippet: snippet_text,
                rank: -score,
            });
        }
        hits.sort_by(|a, b| {
            a.rank
                .partial_cmp(&b.rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.file_id.cmp(&b.file_id))
        });
        Ok(hits)
    }

    /// Match over raw code content only (the narrower full-text surface).
    pub fn search_fts(&self, query_str: &str, limit: usize) -> StorageResult<Vec<Bm25Hit>> {
        self.search_content(query_str, limit, vec![self.schema.content])
    }

    fn search_content(
        &self,
        query_str: &str,
        limit: usize,
        fields: Vec<tantivy::schema::Field>,
    ) -> StorageResult<Vec<Bm25Hit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, fields);
        let parsed = query_parser
            .parse_query(query_str)
            .map_err(|e| StorageError::Query(e.to_string()))?;

        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::CONTENT)) as Box<dyn Query>,
            ),
            (Occur::Must, parsed),
        ]);

        let top = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let anchor = snippet_anchor(query_str);

        let mut hits = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let file_id = FileId::new(self.get_u64(&doc, self.schema.file_id) as u32).ok_or(
                StorageError::MalformedDocument {
                    id: None,
                    field: "file_id",
                },
            )?;
            let content = self.get_str(&doc, self.schema.content);
            let (snippet_text, line) = match snippet::excerpt(&content, &anchor) {
                Some(excerpt) => (excerpt.text, excerpt.line),
                // Stemmed match without a literal occurrence: fall back to
                // the head of the file.
                None => (
                    content.lines().next().unwrap_or("").trim().to_string(),
                    1,
                ),
            };
            hits.push(Bm25Hit {
                file_id,
                filepath: self.get_str(&doc, self.schema.file_path),
                line,
                snippet: snippet_text,
                rank: -score,
            });
        }

        hits.sort_by(|a, b| {
            a.rank
                .partial_cmp(&b.rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.file_id.cmp(&b.file_id))
        });
        Ok(hits)
    }

    /// Full-text match over the symbol surface (name, signature,
    /// documentation), ordered like `search_bm25`.
    pub fn search_symbols(&self, query_str: &str, limit: usize) -> StorageResult<Vec<Symbol>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.schema.name, self.schema.signature, self.schema.documentation],
        );
        let parsed = query_parser
            .parse_query(query_str)
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::SYMBOL)) as Box<dyn Query>,
            ),
            (Occur::Must, parsed),
        ]);

        let top = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut found = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            found.push((score, self.doc_to_symbol(&doc)?));
        }
        found.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.map(|i| i.value()).cmp(&b.id.map(|i| i.value())))
        });
        Ok(found.into_iter().map(|(_score, symbol)| symbol).collect())
    }

    /// Exact-name symbol lookup with optional kind filter.
    ///
    /// Ordering: kind priority (types before callables before data), then
    /// file path, then start line.
    pub fn lookup_symbol(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
        limit: usize,
    ) -> StorageResult<Vec<Symbol>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::SYMBOL)) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.name_exact, name),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);
        let top = searcher.search(&query, &TopDocs::with_limit(SCAN_LIMIT))?;

        let mut matches = Vec::new();
        for (_score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let file_path = self.get_str(&doc, self.schema.file_path);
            let symbol = self.doc_to_symbol(&doc)?;
            if let Some(wanted) = kind {
                if symbol.kind != wanted {
                    continue;
                }
            }
            matches.push((file_path, symbol));
        }

        matches.sort_by(|(path_a, a), (path_b, b)| {
            a.kind
                .priority()
                .cmp(&b.kind.priority())
                .then(path_a.cmp(path_b))
                .then(a.range.start_line.cmp(&b.range.start_line))
        });

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_path, symbol)| symbol)
            .collect())
    }

    /// Defining file path of a symbol document, for lookup results.
    pub fn symbol_file_path(&self, file_id: FileId) -> StorageResult<Option<String>> {
        Ok(self.file_record(file_id)?.map(|f| f.path))
    }

    /// All symbols of a file, ordered by position.
    pub fn list_symbols_in_file(&self, file_id: FileId) -> StorageResult<Vec<Symbol>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_u64(self.schema.symbol_file_id, file_id.value() as u64),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(SCAN_LIMIT))?;
        let mut symbols = Vec::with_capacity(top.len());
        for (_score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            symbols.push(self.doc_to_symbol(&doc)?);
        }
        symbols.sort_by_key(|s| (s.range.start_line, s.id.map(|i| i.value()).unwrap_or(0)));
        Ok(symbols)
    }

    /// Aggregate counters and per-language file counts.
    pub fn repository_stats(&self) -> StorageResult<RepositoryStats> {
        let searcher = self.reader.searcher();
        let total_symbols =
            searcher.search(&self.doc_type_query(doc_type::SYMBOL), &Count)? as u64;

        let files = self.all_files()?;
        let mut languages = BTreeMap::new();
        for file in &files {
            *languages.entry(file.language.clone()).or_insert(0) += 1;
        }
        Ok(RepositoryStats {
            total_files: files.len() as u64,
            total_symbols,
            languages,
        })
    }

    /// Head of the lowest-numbered content row, for health sampling.
    pub fn sample_content_head(&self, bytes: usize) -> StorageResult<Option<String>> {
        let rows = self.all_content()?;
        Ok(rows.into_iter().next().map(|row| {
            let content = row.row.content;
            let mut end = bytes.min(content.len());
            while end > 0 && !content.is_char_boundary(end) {
                end -= 1;
            }
            content[..end].to_string()
        }))
    }

    pub fn document_count(&self) -> StorageResult<u64> {
        Ok(self.reader.searcher().num_docs())
    }

    /// True when the index holds no file rows.
    pub fn is_empty(&self) -> StorageResult<bool> {
        let searcher = self.reader.searcher();
        Ok(searcher.search(&self.doc_type_query(doc_type::FILE), &Count)? == 0)
    }

    // ---- metadata --------------------------------------------------------

    fn write_metadata(
        &self,
        writer: &IndexWriter<TantivyDocument>,
        key: &str,
        value: u64,
    ) -> StorageResult<()> {
        writer.delete_term(Term::from_field_text(self.schema.meta_key, key));
        let mut doc = TantivyDocument::new();
        doc.add_text(self.schema.doc_type, doc_type::META);
        doc.add_text(self.schema.meta_key, key);
        doc.add_u64(self.schema.meta_value, value);
        writer.add_document(doc)?;
        Ok(())
    }

    /// Store a metadata counter (requires an active batch).
    pub fn store_metadata(&self, key: &str, value: u64) -> StorageResult<()> {
        self.with_writer(|writer| self.write_metadata(writer, key, value))
    }

    /// Read a metadata counter by key.
    pub fn query_metadata(&self, key: &str) -> StorageResult<Option<u64>> {
        let searcher = self.reader.searcher();
        let query = BooleanQuery::new(vec![
            (
                Occur::Must,
                Box::new(self.doc_type_query(doc_type::META)) as Box<dyn Query>,
            ),
            (
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(self.schema.meta_key, key),
                    IndexRecordOption::Basic,
                )) as Box<dyn Query>,
            ),
        ]);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.into_iter().next() {
            Some((_score, addr)) => {
                let doc: TantivyDocument = searcher.doc(addr)?;
                Ok(doc
                    .get_first(self.schema.meta_value)
                    .and_then(|v| v.as_u64()))
            }
            None => Ok(None),
        }
    }
}

/// A query of the form `tok*` (one token, trailing star) is a prefix query.
/// Returns the token without the star.
fn prefix_query(query: &str) -> Option<&str> {
    let trimmed = query.trim();
    let stripped = trimmed.strip_suffix('*')?;
    if stripped.is_empty() || stripped.contains(|c: char| c.is_whitespace() || c == '*') {
        return None;
    }
    Some(stripped)
}

/// First searchable token of a query, used to anchor snippets.
fn snippet_anchor(query: &str) -> String {
    query
        .split(|c: char| c.is_whitespace() || c == '"')
        .find(|token| !token.is_empty())
        .unwrap_or(query)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;
    use tempfile::TempDir;

    fn new_file(relative: &str, language: &str, content: &str) -> NewFile {
        NewFile {
            path: format!("/repo/{relative}"),
            relative_path: relative.to_string(),
            language: language.to_string(),
            size: content.len() as u64,
            content_hash: format!("{:x}", sha2::Sha256::digest(content.as_bytes())),
            last_modified: 1_700_000_000,
            line_count: content.lines().count() as u64,
        }
    }

    use sha2::Digest;

    fn content_row(relative: &str, language: &str, content: &str) -> ContentRow {
        ContentRow {
            filepath: format!("/repo/{relative}"),
            filename: relative.rsplit('/').next().unwrap_or(relative).to_string(),
            content: content.to_string(),
            language: language.to_string(),
            symbols: String::new(),
            imports: String::new(),
            comments: String::new(),
        }
    }

    fn index_one(store: &CodeIndex, relative: &str, language: &str, content: &str) -> FileId {
        store.start_batch().unwrap();
        let id = store
            .upsert_file(
                &new_file(relative, language, content),
                (!content.is_empty()).then(|| content_row(relative, language, content)).as_ref(),
            )
            .unwrap();
        store.commit_batch().unwrap();
        id
    }

    #[test]
    fn test_create_is_idempotent() {
        let temp = TempDir::new().unwrap();
        {
            let store = CodeIndex::create_or_open(temp.path()).unwrap();
            assert!(store.is_empty().unwrap());
        }
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        assert_eq!(
            store.query_metadata("schema_version").unwrap(),
            Some(SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_upsert_and_search() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();

        index_one(&store, "a.py", "python", "def authenticate_user(): pass\n");
        index_one(&store, "b.py", "python", "def log(): pass\n");

        let hits = store.search_bm25("authenticate_user", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].filepath.ends_with("a.py"));
        assert_eq!(hits[0].line, 1);
        assert!(hits[0].snippet.contains("authenticate_user"));
    }

    #[test]
    fn test_reindex_keeps_file_id_and_replaces_rows() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();

        let first = index_one(&store, "a.py", "python", "x = 1\n");
        let second = index_one(&store, "a.py", "python", "x = 2\n");
        assert_eq!(first, second);

        let files = store.all_files().unwrap();
        assert_eq!(files.len(), 1);
        let content = store.file_content(first).unwrap().unwrap();
        assert_eq!(content, "x = 2\n");

        let rows = store.all_content().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_empty_file_gets_no_content_row() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();

        let id = index_one(&store, "empty.py", "python", "");
        assert!(store.file_record(id).unwrap().is_some());
        assert!(store.file_content(id).unwrap().is_none());
        assert!(store.all_content().unwrap().is_empty());
    }

    #[test]
    fn test_symbols_replaced_per_file() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        let file_id = index_one(&store, "a.py", "python", "class A: pass\n");

        store.start_batch().unwrap();
        store
            .upsert_symbols(
                file_id,
                "/repo/a.py",
                &[Symbol::new("A", SymbolKind::Class, Range::single_line(1, 0, 7))],
            )
            .unwrap();
        store.commit_batch().unwrap();
        assert_eq!(store.list_symbols_in_file(file_id).unwrap().len(), 1);

        store.start_batch().unwrap();
        store
            .upsert_symbols(
                file_id,
                "/repo/a.py",
                &[
                    Symbol::new("A", SymbolKind::Class, Range::single_line(1, 0, 7)),
                    Symbol::new("b", SymbolKind::Function, Range::single_line(2, 0, 10)),
                ],
            )
            .unwrap();
        store.commit_batch().unwrap();

        let symbols = store.list_symbols_in_file(file_id).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "A");
    }

    #[test]
    fn test_lookup_prefers_types_over_functions() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        let file_id = index_one(&store, "a.py", "python", "irrelevant\n");

        store.start_batch().unwrap();
        store
            .upsert_symbols(
                file_id,
                "/repo/a.py",
                &[
                    Symbol::new("Widget", SymbolKind::Function, Range::single_line(9, 0, 5)),
                    Symbol::new("Widget", SymbolKind::Class, Range::single_line(3, 0, 5)),
                ],
            )
            .unwrap();
        store.commit_batch().unwrap();

        let found = store.lookup_symbol("Widget", None, 10).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, SymbolKind::Class);

        let only_fn = store
            .lookup_symbol("Widget", Some(SymbolKind::Function), 10)
            .unwrap();
        assert_eq!(only_fn.len(), 1);
        assert_eq!(only_fn[0].kind, SymbolKind::Function);

        assert!(store.lookup_symbol("widget", None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_symbol_round_trip_preserves_details() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        let file_id = index_one(&store, "a.kt", "kotlin", "object X\n");

        let symbol = Symbol::new(
            "String.isPalindrome",
            SymbolKind::Extension,
            Range::single_line(1, 0, 50),
        )
        .with_signature("fun String.isPalindrome(): Boolean")
        .with_doc("Checks palindromes.")
        .with_visibility(Visibility::Internal)
        .with_modifiers(vec!["inline".to_string()])
        .with_meta("receiver", "String");

        store.start_batch().unwrap();
        store.upsert_symbols(file_id, "/repo/a.kt", &[symbol]).unwrap();
        store.commit_batch().unwrap();

        let restored = &store.list_symbols_in_file(file_id).unwrap()[0];
        assert_eq!(restored.name, "String.isPalindrome");
        assert_eq!(restored.kind, SymbolKind::Extension);
        assert_eq!(restored.visibility, Visibility::Internal);
        assert_eq!(restored.modifiers, vec!["inline"]);
        assert_eq!(
            restored.metadata.get("receiver").and_then(|v| v.as_str()),
            Some("String")
        );
        assert_eq!(
            restored.signature.as_deref(),
            Some("fun String.isPalindrome(): Boolean")
        );
    }

    #[test]
    fn test_prefix_queries() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        index_one(&store, "a.py", "python", "def authenticate_user(): pass\n");
        index_one(&store, "b.py", "python", "def log(): pass\n");

        let two = store.search_bm25("au*", 5).unwrap();
        assert_eq!(two.len(), 1);
        assert!(two[0].filepath.ends_with("a.py"));
        assert!(two[0].snippet.contains("au"));

        let three = store.search_bm25("aut*", 5).unwrap();
        assert_eq!(three.len(), 1);
        assert!(three[0].filepath.ends_with("a.py"));

        let other = store.search_bm25("lo*", 5).unwrap();
        assert_eq!(other.len(), 1);
        assert!(other[0].filepath.ends_with("b.py"));

        assert!(store.search_bm25("zz*", 5).unwrap().is_empty());

        // Longer prefixes fall back to a plain match on the stripped token.
        let long = store.search_bm25("authenticate*", 5).unwrap();
        assert_eq!(long.len(), 1);
        assert!(long[0].filepath.ends_with("a.py"));
    }

    #[test]
    fn test_search_prefix_rejects_unindexed_lengths() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        assert!(store.search_prefix("a", 5).is_err());
        assert!(store.search_prefix("auth", 5).is_err());
    }

    #[test]
    fn test_search_symbols_surface() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        let file_id = index_one(&store, "a.py", "python", "code\n");

        store.start_batch().unwrap();
        store
            .upsert_symbols(
                file_id,
                "/repo/a.py",
                &[
                    Symbol::new("fetch_user", SymbolKind::Function, Range::single_line(1, 0, 9))
                        .with_doc("Loads a user from the session store."),
                    Symbol::new("drop_table", SymbolKind::Function, Range::single_line(5, 0, 9)),
                ],
            )
            .unwrap();
        store.commit_batch().unwrap();

        let by_doc = store.search_symbols("session", 10).unwrap();
        assert_eq!(by_doc.len(), 1);
        assert_eq!(by_doc[0].name, "fetch_user");

        let by_name = store.search_symbols("drop_table", 10).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "drop_table");
    }

    #[test]
    fn test_rollback_leaves_index_unchanged() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        index_one(&store, "keep.py", "python", "keep = True\n");

        store.start_batch().unwrap();
        store
            .upsert_file(
                &new_file("drop.py", "python", "drop = True\n"),
                Some(&content_row("drop.py", "python", "drop = True\n")),
            )
            .unwrap();
        store.rollback_batch().unwrap();

        assert_eq!(store.all_files().unwrap().len(), 1);
        assert!(store.search_bm25("drop", 5).unwrap().is_empty());
    }

    #[test]
    fn test_stats_per_language() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        index_one(&store, "a.py", "python", "a = 1\n");
        index_one(&store, "b.py", "python", "b = 2\n");
        index_one(&store, "c.go", "go", "package main\n");

        let stats = store.repository_stats().unwrap();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.languages.get("python"), Some(&2));
        assert_eq!(stats.languages.get("go"), Some(&1));
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        index_one(&store, "a.py", "python", "something\n");
        assert!(store.search_bm25("zzzznotfound", 5).unwrap().is_empty());
    }

    #[test]
    fn test_counters_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = CodeIndex::create_or_open(temp.path()).unwrap();
            index_one(&store, "a.py", "python", "a = 1\n");
        }
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        let id = index_one(&store, "b.py", "python", "b = 2\n");
        assert_eq!(id.value(), 2);
    }

    #[test]
    fn test_repository_row() {
        let temp = TempDir::new().unwrap();
        let store = CodeIndex::create_or_open(temp.path()).unwrap();
        store.start_batch().unwrap();
        store
            .set_repository("abc123def456", "/repos/alpha", "alpha")
            .unwrap();
        store.commit_batch().unwrap();

        let (id, path, name) = store.repository().unwrap().unwrap();
        assert_eq!(id, "abc123def456");
        assert_eq!(path, "/repos/alpha");
        assert_eq!(name, "alpha");
    }
}
