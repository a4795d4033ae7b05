pub mod index;
pub mod schema;
pub mod snippet;

pub use index::{
    Bm25Hit, CodeIndex, ContentRow, FileRecord, NewFile, RepositoryStats, StoredContent,
};
pub use schema::{IndexSchema, SCHEMA_VERSION};
