//! Match excerpts for search results.
//!
//! Produces a short window around the first occurrence of the matched term,
//! with the match wrapped in markers and an ellipsis on each truncated side.

/// Opening match marker.
pub const MARK_START: &str = "«";
/// Closing match marker.
pub const MARK_END: &str = "»";
/// Truncation marker.
pub const ELLIPSIS: &str = "...";

/// Bytes of context kept on each side of the match.
const DEFAULT_WINDOW: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    /// Rendered snippet text.
    pub text: String,
    /// 1-based line of the match start.
    pub line: u32,
}

/// Find the first ASCII-case-insensitive occurrence of `needle` in
/// `haystack`, returning its byte offset.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let hay = haystack.as_bytes();
    let ned = needle.as_bytes();
    hay.windows(ned.len())
        .position(|window| window.eq_ignore_ascii_case(ned))
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Build an excerpt around the first occurrence of `term` in `content`.
/// Returns None when the term does not occur.
pub fn excerpt(content: &str, term: &str) -> Option<Excerpt> {
    excerpt_with_window(content, term, DEFAULT_WINDOW)
}

pub fn excerpt_with_window(content: &str, term: &str, window: usize) -> Option<Excerpt> {
    let start = find_ignore_ascii_case(content, term)?;
    let end = start + term.len();
    let line = content[..start].matches('\n').count() as u32 + 1;

    let window_start = floor_char_boundary(content, start.saturating_sub(window));
    let window_end = ceil_char_boundary(content, end + window);

    // Trim the window to the surrounding line boundaries where they fall
    // inside it, so excerpts read as code rather than arbitrary slices.
    let lead = &content[window_start..start];
    let window_start = match lead.rfind('\n') {
        Some(pos) => window_start + pos + 1,
        None => window_start,
    };
    let tail = &content[end..window_end];
    let window_end = match tail.find('\n') {
        Some(pos) => end + pos,
        None => window_end,
    };

    let mut text = String::new();
    if window_start > 0 {
        text.push_str(ELLIPSIS);
    }
    text.push_str(&content[window_start..start]);
    text.push_str(MARK_START);
    text.push_str(&content[start..end]);
    text.push_str(MARK_END);
    text.push_str(&content[end..window_end]);
    if window_end < content.len() {
        text.push_str(ELLIPSIS);
    }

    Some(Excerpt { text, line })
}

/// Multi-line context snippet: the matched line plus `context` lines on each
/// side, used by the dispatcher's search results.
pub fn line_context(content: &str, line: u32, context: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let idx = (line.max(1) as usize - 1).min(lines.len() - 1);
    let start = idx.saturating_sub(context);
    let end = (idx + context + 1).min(lines.len());
    lines[start..end].join("\n")
}
