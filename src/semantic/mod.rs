//! Optional semantic search backend seam.
//!
//! The engine never bundles an embedding client; deployments plug one in by
//! implementing `SemanticBackend`. When semantic search is requested but no
//! backend is configured, is disabled, or fails, the dispatcher falls back
//! to BM25 transparently.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub file: PathBuf,
    pub line: u32,
    pub snippet: String,
    pub score: f32,
}

pub trait SemanticBackend: Send + Sync {
    /// Backend identifier for logs and status output.
    fn name(&self) -> &str;

    /// Run a semantic query. Errors are treated as "backend unavailable"
    /// and degrade to BM25.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticHit>, String>;
}
