//! Index schema and tokenizer registration.
//!
//! One tantivy index per repository holds every persistent record, with a
//! `doc_type` field discriminating repositories, files, BM25 content rows,
//! symbols and metadata. Content fields are analyzed with a Porter-stemming
//! chain; exact-match fields (paths, names, kinds) stay raw.
//!
//! Each content row additionally carries a `prefix` field holding the 2- and
//! 3-character prefixes of every token on the row, indexed without stemming.
//! That field backs `tok*`-style prefix queries for short prefixes, the way
//! the prefix indexes of the content table do.

use tantivy::Index;
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer};

/// Analyzer applied to searchable code content: split on non-alphanumerics,
/// lowercase, Porter-stem.
pub const PORTER_TOKENIZER: &str = "porter";

/// Analyzer for identifier-shaped fields that must not be stemmed: split on
/// non-alphanumerics and lowercase only. Used by the prefix field.
pub const IDENTIFIER_TOKENIZER: &str = "identifier";

/// Prefix lengths maintained in the prefix field.
pub const PREFIX_LENGTHS: [usize; 2] = [2, 3];

/// Current on-disk schema version, stored in a `meta` document.
pub const SCHEMA_VERSION: u64 = 1;

/// Document type discriminator values.
pub mod doc_type {
    pub const REPOSITORY: &str = "repository";
    pub const FILE: &str = "file";
    pub const CONTENT: &str = "content";
    pub const SYMBOL: &str = "symbol";
    pub const META: &str = "meta";
}

/// Schema fields for one repository index.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    // Discriminator
    pub doc_type: Field,

    // Shared identity fields
    pub file_id: Field,
    pub file_path: Field,

    // Repository document
    pub repo_id: Field,
    pub repo_path: Field,
    pub repo_name: Field,

    // File document
    pub file_key: Field,
    pub relative_path: Field,
    pub language: Field,
    pub file_size: Field,
    pub content_hash: Field,
    pub last_modified: Field,
    pub indexed_at: Field,
    pub line_count: Field,

    // BM25 content document
    pub content_key: Field,
    pub filepath_text: Field,
    pub filename: Field,
    pub content: Field,
    pub symbols_text: Field,
    pub imports_text: Field,
    pub comments_text: Field,
    pub prefix: Field,

    // Symbol document
    pub symbol_id: Field,
    pub symbol_file_id: Field,
    pub name: Field,
    pub name_exact: Field,
    pub kind: Field,
    pub line_start: Field,
    pub line_end: Field,
    pub column_start: Field,
    pub column_end: Field,
    pub signature: Field,
    pub documentation: Field,
    pub metadata_json: Field,

    // Metadata document (counters, schema version)
    pub meta_key: Field,
    pub meta_value: Field,
}

impl IndexSchema {
    /// Build the schema for a repository index.
    pub fn build() -> (Schema, IndexSchema) {
        let mut builder = SchemaBuilder::default();

        let doc_type = builder.add_text_field("doc_type", STRING | STORED | FAST);

        let file_id = builder.add_u64_field("file_id", INDEXED | STORED | FAST);
        let file_path = builder.add_text_field("file_path", STRING | STORED);

        let repo_id = builder.add_text_field("repo_id", STRING | STORED);
        let repo_path = builder.add_text_field("repo_path", STRING | STORED);
        let repo_name = builder.add_text_field("repo_name", STRING | STORED);

        let file_key = builder.add_text_field("file_key", STRING | STORED);
        let relative_path = builder.add_text_field("relative_path", STRING | STORED);
        let language = builder.add_text_field("language", STRING | STORED | FAST);
        let file_size = builder.add_u64_field("file_size", STORED);
        let content_hash = builder.add_text_field("content_hash", STRING | STORED);
        let last_modified = builder.add_u64_field("last_modified", STORED);
        let indexed_at = builder.add_u64_field("indexed_at", STORED);
        let line_count = builder.add_u64_field("line_count", STORED);

        let searchable = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(PORTER_TOKENIZER)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let content_key = builder.add_text_field("content_key", STRING | STORED);
        let filepath_text = builder.add_text_field("filepath", searchable.clone());
        let filename = builder.add_text_field("filename", searchable.clone());
        let content = builder.add_text_field("content", searchable.clone());
        let symbols_text = builder.add_text_field("symbols", searchable.clone());
        let imports_text = builder.add_text_field("imports", searchable.clone());
        let comments_text = builder.add_text_field("comments", searchable.clone());

        // Token prefixes, unstemmed and unstored. Queried with exact terms.
        let prefix = builder.add_text_field(
            "prefix",
            TextOptions::default().set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(IDENTIFIER_TOKENIZER)
                    .set_index_option(IndexRecordOption::Basic),
            ),
        );

        let symbol_id = builder.add_u64_field("symbol_id", INDEXED | STORED | FAST);
        let symbol_file_id = builder.add_u64_field("symbol_file_id", INDEXED | STORED | FAST);
        let name = builder.add_text_field("name", searchable.clone());
        let name_exact = builder.add_text_field("name_exact", STRING | STORED);
        let kind = builder.add_text_field("kind", STRING | STORED | FAST);
        let line_start = builder.add_u64_field("line_start", STORED);
        let line_end = builder.add_u64_field("line_end", STORED);
        let column_start = builder.add_u64_field("column_start", STORED);
        let column_end = builder.add_u64_field("column_end", STORED);
        let signature = builder.add_text_field("signature", searchable.clone());
        let documentation = builder.add_text_field("documentation", searchable);
        // Stored verbatim, never searched.
        let metadata_json = builder.add_text_field("metadata_json", TextOptions::default().set_stored());

        let meta_key = builder.add_text_field("meta_key", STRING | STORED | FAST);
        let meta_value = builder.add_u64_field("meta_value", STORED);

        let schema = builder.build();
        let index_schema = IndexSchema {
            doc_type,
            file_id,
            file_path,
            repo_id,
            repo_path,
            repo_name,
            file_key,
            relative_path,
            language,
            file_size,
            content_hash,
            last_modified,
            indexed_at,
            line_count,
            content_key,
            filepath_text,
            filename,
            content,
            symbols_text,
            imports_text,
            comments_text,
            prefix,
            symbol_id,
            symbol_file_id,
            name,
            name_exact,
            kind,
            line_start,
            line_end,
            column_start,
            column_end,
            signature,
            documentation,
            metadata_json,
            meta_key,
            meta_value,
        };

        (schema, index_schema)
    }
}

/// Register the analyzers on an index. Must run after every open/create,
/// before any read or write.
pub fn register_tokenizers(index: &Index) {
    let porter = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build();
    index.tokenizers().register(PORTER_TOKENIZER, porter);

    let identifier = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(IDENTIFIER_TOKENIZER, identifier);
}

/// Render the space-joined 2- and 3-character prefixes of every token in
/// `text`, lowercased and deduplicated, for the prefix field.
pub fn token_prefixes(text: &str) -> String {
    let mut prefixes = std::collections::BTreeSet::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if token.chars().count() < PREFIX_LENGTHS[0] {
            continue;
        }
        let lowered = token.to_lowercase();
        for length in PREFIX_LENGTHS {
            let prefix: String = lowered.chars().take(length).collect();
            if prefix.chars().count() == length {
                prefixes.insert(prefix);
            }
        }
    }
    prefixes.into_iter().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builds_all_fields() {
        let (schema, fields) = IndexSchema::build();
        assert_eq!(schema.get_field_name(fields.doc_type), "doc_type");
        assert_eq!(schema.get_field_name(fields.content), "content");
        assert_eq!(schema.get_field_name(fields.name_exact), "name_exact");
        assert_eq!(schema.get_field_name(fields.meta_key), "meta_key");
        assert_eq!(schema.get_field_name(fields.prefix), "prefix");
    }

    #[test]
    fn test_token_prefixes() {
        let rendered = token_prefixes("def authenticate_user(): pass");
        let prefixes: Vec<&str> = rendered.split(' ').collect();
        assert!(prefixes.contains(&"au"));
        assert!(prefixes.contains(&"aut"));
        assert!(prefixes.contains(&"us"));
        assert!(prefixes.contains(&"use"));
        assert!(prefixes.contains(&"de"));
        assert!(prefixes.contains(&"pa"));
        // Single-character tokens contribute nothing.
        assert_eq!(token_prefixes("x y"), "");
        // Deduplicated and sorted.
        let mut sorted = prefixes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(prefixes, sorted);
    }

    #[test]
    fn test_token_prefixes_lowercases() {
        let rendered = token_prefixes("Calculator");
        assert!(rendered.split(' ').any(|p| p == "ca"));
        assert!(rendered.split(' ').any(|p| p == "cal"));
    }
}
