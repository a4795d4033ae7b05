//! Error types for the indexing and retrieval engine.
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::types::FileId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing and query operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Malformed query, unknown repository id, bad options.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Index file missing for a registered repository.
    #[error("Index for repository '{repo_id}' not found at '{path}'")]
    IndexNotFound { repo_id: String, path: PathBuf },

    /// Registry entry missing for a requested repository id.
    #[error("Repository '{repo_id}' is not registered")]
    RepositoryNotFound { repo_id: String },

    #[error("No definition of '{name}' in any active repository index")]
    SymbolNotFound { name: String },

    #[error("No file row for id {id:?} in this index")]
    FileNotFound { id: FileId },

    /// A parser could not handle a file. Always recovered inside index_file;
    /// surfaced only in per-file failure counters.
    #[error("Failed to parse {language} file '{path}': {reason}")]
    ParseFailed {
        path: PathBuf,
        language: String,
        reason: String,
    },

    /// File system errors.
    #[error("Could not read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The on-disk engine reported an error.
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    /// Registry document could not be read or written.
    #[error("Registry operation failed at '{path}': {reason}")]
    Registry { path: PathBuf, reason: String },

    /// The operation's cancellation signal fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// Per-operation deadline expired.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Configuration rejected: {reason}")]
    Config { reason: String },

    #[error("File id space exhausted for this index")]
    FileIdExhausted,

    #[error("Symbol id space exhausted for this index")]
    SymbolIdExhausted,

    /// General errors for cases where a specific variant would not help.
    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Get recovery suggestions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Storage(_) => vec![
                "Re-index the repository with 'quarry index <path>'",
                "Verify the index directory is writable and has free space",
            ],
            Self::IndexNotFound { .. } => vec![
                "Run 'quarry index <path>' to build the repository index",
                "Check that the registry entry points at the right location",
            ],
            Self::RepositoryNotFound { .. } => vec![
                "Run 'quarry status' to list registered repositories",
                "Index the repository first with 'quarry index <path>'",
            ],
            Self::FileRead { .. } => vec![
                "Confirm the path exists and is readable by this process",
                "Re-run indexing once the file is accessible",
            ],
            Self::Registry { .. } => vec![
                "Check that the registry file is valid JSON",
                "Remove the registry file to start from an empty registry",
            ],
            Self::Timeout { .. } => vec![
                "Narrow the query or raise the search deadline",
                "Partial results were returned where the operation allows it",
            ],
            _ => vec![],
        }
    }
}

/// Errors specific to storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Tantivy index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Failed to open directory '{path}': {source}")]
    OpenDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Index schema version {found} is not supported (expected {expected})")]
    SchemaVersion { found: u64, expected: u64 },

    #[error("A write batch is not active; open one with start_batch()")]
    NoActiveBatch,

    #[error("Document for file {id:?} is missing field '{field}'")]
    MalformedDocument { id: Option<FileId>, field: &'static str },

    #[error("Query error: {0}")]
    Query(String),
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
