//! In-document search
//!
//! Case-insensitive literal matching over a document's page texts, and a
//! cyclic cursor for next/previous match navigation.

use regex::{Regex, RegexBuilder};

/// Shortest term that is searched at all
pub const DEFAULT_MIN_TERM_LEN: usize = 2;

/// One occurrence of the search term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchMatch {
    /// Page number (1-indexed)
    pub page: usize,
    /// Character offset of the match start within the page text
    pub offset: usize,
    /// Match length in characters
    pub len: usize,
}

/// Build a case-insensitive pattern matching `term` literally
#[must_use]
pub fn literal_pattern(term: &str) -> Option<Regex> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Find every occurrence of `term` in `pages`, page by page, left to right.
///
/// Terms shorter than `min_len` characters produce no matches.
#[must_use]
pub fn find_matches(pages: &[String], term: &str, min_len: usize) -> Vec<SearchMatch> {
    if term.chars().count() < min_len.max(1) {
        return Vec::new();
    }
    let Some(pattern) = literal_pattern(term) else {
        return Vec::new();
    };

    let mut matches = Vec::new();
    for (index, text) in pages.iter().enumerate() {
        // Byte offsets from the regex are turned into character offsets
        // incrementally, since matches come in ascending order.
        let mut byte_pos = 0;
        let mut char_pos = 0;
        for found in pattern.find_iter(text) {
            char_pos += text[byte_pos..found.start()].chars().count();
            byte_pos = found.start();
            matches.push(SearchMatch {
                page: index + 1,
                offset: char_pos,
                len: found.as_str().chars().count(),
            });
        }
    }
    matches
}

/// Cyclic position within an ordered match list
#[derive(Debug, Clone, Default)]
pub struct MatchCursor {
    matches: Vec<SearchMatch>,
    current: Option<usize>,
}

impl MatchCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the matches and select the first one
    pub fn set_matches(&mut self, matches: Vec<SearchMatch>) {
        self.current = if matches.is_empty() { None } else { Some(0) };
        self.matches = matches;
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.current = None;
    }

    /// Advance to the next match, wrapping around
    pub fn next(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.current = Some(match self.current {
            Some(idx) => (idx + 1) % len,
            None => 0,
        });
        self.current()
    }

    /// Step back to the previous match, wrapping around
    pub fn previous(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.current = Some(match self.current {
            Some(idx) => (idx + len - 1) % len,
            None => len - 1,
        });
        self.current()
    }

    #[must_use]
    pub fn current(&self) -> Option<&SearchMatch> {
        self.current.and_then(|idx| self.matches.get(idx))
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[must_use]
    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Status text for the search bar
    #[must_use]
    pub fn info(&self) -> String {
        match self.current {
            _ if self.matches.is_empty() => "No matches".to_string(),
            Some(current) => format!("{} of {}", current + 1, self.matches.len()),
            None => format!("{} matches", self.matches.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| (*s).to_string()).collect()
    }

    fn m(page: usize, offset: usize, len: usize) -> SearchMatch {
        SearchMatch { page, offset, len }
    }

    #[test]
    fn finds_matches_in_page_order() {
        let text = pages(&["The checklist", "no hits here", "Check the CHECK valve"]);
        let found = find_matches(&text, "check", DEFAULT_MIN_TERM_LEN);
        assert_eq!(found, vec![m(1, 4, 5), m(3, 0, 5), m(3, 10, 5)]);
    }

    #[test]
    fn short_terms_find_nothing() {
        let text = pages(&["a a a a"]);
        assert!(find_matches(&text, "", DEFAULT_MIN_TERM_LEN).is_empty());
        assert!(find_matches(&text, "a", DEFAULT_MIN_TERM_LEN).is_empty());
        assert_eq!(find_matches(&text, "a ", DEFAULT_MIN_TERM_LEN).len(), 3);
    }

    #[test]
    fn metacharacters_match_literally() {
        let text = pages(&["version 3.0 uses a.b not axb", "3x0"]);
        assert_eq!(find_matches(&text, "a.b", 2), vec![m(1, 17, 3)]);
        assert_eq!(find_matches(&text, "3.0", 2), vec![m(1, 8, 3)]);
        assert_eq!(find_matches(&text, "(x", 2), vec![]);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = pages(&["Größe und größe"]);
        let found = find_matches(&text, "GRÖSSE", 2);
        assert!(found.is_empty());
        let found = find_matches(&text, "größe", 2);
        assert_eq!(found, vec![m(1, 0, 5), m(1, 10, 5)]);
    }

    #[test]
    fn matches_do_not_overlap() {
        let text = pages(&["aaaa"]);
        assert_eq!(find_matches(&text, "aa", 2), vec![m(1, 0, 2), m(1, 2, 2)]);
    }

    #[test]
    fn cursor_wraps_both_ways() {
        let mut cursor = MatchCursor::new();
        cursor.set_matches(vec![m(1, 0, 2), m(2, 0, 2), m(4, 3, 2)]);
        assert_eq!(cursor.current_index(), Some(0));

        assert_eq!(cursor.previous().map(|x| x.page), Some(4));
        assert_eq!(cursor.next().map(|x| x.page), Some(1));
        assert_eq!(cursor.next().map(|x| x.page), Some(2));
        assert_eq!(cursor.next().map(|x| x.page), Some(4));
        assert_eq!(cursor.next().map(|x| x.page), Some(1));
    }

    #[test]
    fn next_then_previous_round_trips() {
        let mut cursor = MatchCursor::new();
        cursor.set_matches((1..=5).map(|p| m(p, 0, 2)).collect());
        for _ in 0..3 {
            cursor.next();
        }
        let start = cursor.current_index();
        cursor.next();
        cursor.previous();
        assert_eq!(cursor.current_index(), start);
        cursor.previous();
        cursor.next();
        assert_eq!(cursor.current_index(), start);
    }

    #[test]
    fn empty_cursor_is_inert() {
        let mut cursor = MatchCursor::new();
        assert!(cursor.next().is_none());
        assert!(cursor.previous().is_none());
        assert_eq!(cursor.info(), "No matches");
    }

    #[test]
    fn info_reports_position() {
        let mut cursor = MatchCursor::new();
        cursor.set_matches(vec![m(1, 0, 2), m(1, 5, 2)]);
        assert_eq!(cursor.info(), "1 of 2");
        cursor.next();
        assert_eq!(cursor.info(), "2 of 2");
    }
}
