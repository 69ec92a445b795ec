//! Search (spec §4.8): literal or regex search against the wrapped content
//! of a pane's active tab, case-insensitive by design, cached against the
//! state it was computed from.

use regex::{Regex, RegexBuilder};
use reqtui_model::snapshot::{SnapshotId, Tab};
use reqtui_text::wrap::WrappedLine;

/// The key a cached search result is valid for (spec §4.8: "cached with
/// (query, regex, tab, snapshot-id, width)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    pub query: String,
    pub regex: bool,
    pub tab: Tab,
    pub snapshot_id: SnapshotId,
    pub width: u16,
}

/// A single match position within the wrapped content: the row index and
/// the byte range within that row's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub row: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub key: SearchKey,
    pub matches: Vec<SearchMatch>,
    pub current: Option<usize>,
}

impl SearchResult {
    /// Preserves the active match index across a re-decoration when the
    /// count of matches did not shrink below it (spec §4.8: "preserved
    /// across re-decoration when possible").
    pub fn carry_current(&mut self, previous: Option<usize>) {
        self.current = match previous {
            Some(i) if i < self.matches.len() => Some(i),
            _ if !self.matches.is_empty() => Some(0),
            _ => None,
        };
    }

    pub fn advance(&mut self) {
        if self.matches.is_empty() {
            self.current = None;
            return;
        }
        self.current = Some(match self.current {
            Some(i) => (i + 1) % self.matches.len(),
            None => 0,
        });
    }

    pub fn retreat(&mut self) {
        if self.matches.is_empty() {
            self.current = None;
            return;
        }
        self.current = Some(match self.current {
            Some(0) => self.matches.len() - 1,
            Some(i) => i - 1,
            None => self.matches.len() - 1,
        });
    }
}

/// Runs a literal or regex search over `lines`, case-insensitive regardless
/// of mode. An invalid regex pattern yields no matches rather than an error
/// (a malformed in-progress query should not crash the pane).
pub fn search(lines: &[WrappedLine], key: SearchKey) -> SearchResult {
    let matches = if key.regex {
        match RegexBuilder::new(&key.query).case_insensitive(true).build() {
            Ok(re) => find_regex(lines, &re),
            Err(_) => Vec::new(),
        }
    } else {
        find_literal(lines, &key.query)
    };
    SearchResult { key, matches, current: None }
}

fn find_literal(lines: &[WrappedLine], query: &str) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    let mut out = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        let haystack = line.text.to_lowercase();
        let mut start = 0;
        while let Some(pos) = haystack[start..].find(&needle) {
            let abs = start + pos;
            out.push(SearchMatch { row, start: abs, end: abs + needle.len() });
            start = abs + needle.len().max(1);
        }
    }
    out
}

fn find_regex(lines: &[WrappedLine], re: &Regex) -> Vec<SearchMatch> {
    let mut out = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        for m in re.find_iter(&line.text) {
            out.push(SearchMatch { row, start: m.start(), end: m.end() });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(rows: &[&str]) -> Vec<WrappedLine> {
        rows.iter()
            .map(|s| WrappedLine { text: s.to_string(), is_continuation: false })
            .collect()
    }

    fn key(query: &str, regex: bool) -> SearchKey {
        SearchKey {
            query: query.to_string(),
            regex,
            tab: Tab::Pretty,
            snapshot_id: SnapshotId(1),
            width: 80,
        }
    }

    #[test]
    fn literal_search_is_case_insensitive() {
        let result = search(&lines(&["Hello World", "nothing here"]), key("WORLD", false));
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0], SearchMatch { row: 0, start: 6, end: 11 });
    }

    #[test]
    fn regex_search_finds_all_occurrences() {
        let result = search(&lines(&["a1 a2 a3"]), key(r"a\d", true));
        assert_eq!(result.matches.len(), 3);
    }

    #[test]
    fn invalid_regex_yields_no_matches_not_an_error() {
        let result = search(&lines(&["anything"]), key("(unclosed", true));
        assert!(result.matches.is_empty());
    }

    #[test]
    fn advance_and_retreat_wrap_around() {
        let mut result = search(&lines(&["a a a"]), key("a", false));
        assert_eq!(result.matches.len(), 3);
        result.advance();
        assert_eq!(result.current, Some(0));
        result.retreat();
        assert_eq!(result.current, Some(2));
    }

    #[test]
    fn carry_current_drops_when_index_out_of_range() {
        let mut result = search(&lines(&["a"]), key("a", false));
        result.carry_current(Some(5));
        assert_eq!(result.current, Some(0));
    }
}
