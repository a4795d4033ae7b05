//! Shared glue for tree-sitter based parsers.
//!
//! Parsers declare their extraction as S-expression queries with a `@name`
//! capture for the identifier and one labeled capture for the declaration
//! node; `query_hits` flattens the match stream into position-ordered hits.

use crate::types::Range;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

/// One query match: the declaration node, its capture label, and the text of
/// the `@name` capture when present.
pub(crate) struct QueryHit<'t> {
    pub capture: String,
    pub node: Node<'t>,
    pub name: Option<String>,
}

/// Run `query` over `root`, producing hits ordered by source position.
pub(crate) fn query_hits<'t>(query: &Query, root: Node<'t>, content: &str) -> Vec<QueryHit<'t>> {
    let capture_names: Vec<&str> = query.capture_names().to_vec();
    let mut cursor = QueryCursor::new();
    let mut hits = Vec::new();

    let mut matches = cursor.matches(query, root, content.as_bytes());
    while let Some(query_match) = matches.next() {
        let mut name: Option<String> = None;
        let mut main: Option<(String, Node)> = None;

        for capture in query_match.captures {
            let label = capture_names
                .get(capture.index as usize)
                .copied()
                .unwrap_or("");
            if label == "name" {
                name = Some(content[capture.node.byte_range()].to_string());
            } else {
                main = Some((label.to_string(), capture.node));
            }
        }

        if let Some((capture, node)) = main {
            hits.push(QueryHit {
                capture,
                node,
                name,
            });
        }
    }

    hits.sort_by_key(|hit| (hit.node.start_byte(), hit.node.end_byte()));
    hits
}

/// Convert a node's span to the engine convention: 1-based lines, 0-based
/// columns.
pub(crate) fn node_range(node: &Node) -> Range {
    Range::new(
        node.start_position().row as u32 + 1,
        node.start_position().column.min(u16::MAX as usize) as u16,
        node.end_position().row as u32 + 1,
        node.end_position().column.min(u16::MAX as usize) as u16,
    )
}

/// Source text of a node.
pub(crate) fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    &content[node.byte_range()]
}

/// First line of a node's text, for signatures.
pub(crate) fn node_first_line<'a>(node: &Node, content: &'a str) -> &'a str {
    node_text(node, content).lines().next().unwrap_or("")
}

/// True when `node` or an ancestor (up to `limit` levels) is of `kind`.
pub(crate) fn has_ancestor(node: &Node, kind: &str, limit: usize) -> bool {
    let mut current = node.parent();
    let mut depth = 0;
    while let Some(n) = current {
        if n.kind() == kind {
            return true;
        }
        depth += 1;
        if depth >= limit {
            break;
        }
        current = n.parent();
    }
    false
}
