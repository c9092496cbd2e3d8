//! Search across every document of the binder: file names and extracted text

use regex::{Captures, Regex};

use crate::search::literal_pattern;
use crate::settings::SearchSettings;
use crate::text_cache::{DocumentId, TextCache};

/// Strings wrapped around every occurrence of the term in results
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightMarker {
    pub open: String,
    pub close: String,
}

impl Default for HighlightMarker {
    fn default() -> Self {
        Self {
            open: "<mark>".to_string(),
            close: "</mark>".to_string(),
        }
    }
}

impl HighlightMarker {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    fn apply(&self, pattern: &Regex, text: &str) -> String {
        pattern
            .replace_all(text, |caps: &Captures| {
                format!("{}{}{}", self.open, &caps[0], self.close)
            })
            .into_owned()
    }
}

/// A document to search, as listed by the binder
#[derive(Clone, Copy, Debug)]
pub struct SearchTarget<'a> {
    pub id: &'a DocumentId,
    pub name: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilenameMatch {
    pub document: DocumentId,
    pub name: String,
    pub highlighted_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentMatch {
    pub document: DocumentId,
    pub name: String,
    /// Context around the first occurrence, term highlighted
    pub snippet: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalSearchResults {
    pub filename_matches: Vec<FilenameMatch>,
    pub content_matches: Vec<ContentMatch>,
}

impl GlobalSearchResults {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filename_matches.is_empty() && self.content_matches.is_empty()
    }
}

/// Search names and cached text of `docs` for `term`.
///
/// Documents whose text is not cached yet are only matched by name.
#[must_use]
pub fn search_all_documents<'a>(
    term: &str,
    docs: impl IntoIterator<Item = SearchTarget<'a>>,
    cache: &TextCache,
    settings: &SearchSettings,
    marker: &HighlightMarker,
) -> GlobalSearchResults {
    let mut results = GlobalSearchResults::default();
    if term.chars().count() < settings.global_min_term_len.max(1) {
        return results;
    }
    let Some(pattern) = literal_pattern(term) else {
        return results;
    };

    for doc in docs {
        if pattern.is_match(doc.name) {
            results.filename_matches.push(FilenameMatch {
                document: doc.id.clone(),
                name: doc.name.to_string(),
                highlighted_name: marker.apply(&pattern, doc.name),
            });
        }

        let Some(text) = cache.get(doc.id) else {
            continue;
        };
        if let Some(snippet) = snippet(&text.full_text, &pattern, settings.snippet_radius, marker) {
            results.content_matches.push(ContentMatch {
                document: doc.id.clone(),
                name: doc.name.to_string(),
                snippet,
            });
        }
    }
    results
}

/// `radius` characters either side of the first match, with `...` where
/// the text was cut
fn snippet(text: &str, pattern: &Regex, radius: usize, marker: &HighlightMarker) -> Option<String> {
    let found = pattern.find(text)?;
    let match_start = text[..found.start()].chars().count();
    let match_len = found.as_str().chars().count();
    let total = match_start + match_len + text[found.end()..].chars().count();

    let start = match_start.saturating_sub(radius);
    let end = (match_start + match_len + radius).min(total);
    let excerpt: String = text.chars().skip(start).take(end - start).collect();

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&marker.apply(pattern, &excerpt));
    if end < total {
        out.push_str("...");
    }
    Some(out)
}
