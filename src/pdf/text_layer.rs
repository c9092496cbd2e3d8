//! Text layer of a rendered page
//!
//! Maps character ranges of the page text onto rectangles of the rendered
//! bitmap so search matches can be marked and scrolled into view.

use super::types::{Rect, TextItem};
use crate::search::SearchMatch;

#[derive(Clone, Debug)]
struct Span {
    /// First character of the run within the page text
    start: usize,
    /// Length in characters
    len: usize,
    /// Bounds in bitmap pixels
    bounds: Rect,
}

#[derive(Clone, Debug, Default)]
pub struct TextLayer {
    spans: Vec<Span>,
    char_count: usize,
}

/// A marked search match on the displayed page
#[derive(Clone, Debug, PartialEq)]
pub struct Highlight {
    pub matched: SearchMatch,
    /// One rectangle per text run the match touches, in bitmap pixels
    pub rects: Vec<Rect>,
    /// The selected match, drawn distinctly
    pub current: bool,
}

impl TextLayer {
    /// Build the layer from text runs in PDF points and the render scale
    #[must_use]
    pub fn build(items: &[TextItem], scale: f32) -> Self {
        let mut spans = Vec::with_capacity(items.len());
        let mut start = 0;
        for item in items {
            let len = item.text.chars().count();
            if len > 0 {
                spans.push(Span {
                    start,
                    len,
                    bounds: item.bounds.scaled(scale),
                });
            }
            start += len;
        }
        Self {
            spans,
            char_count: start,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of characters covered by the layer
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// Rectangles covering `len` characters starting at `start`.
    ///
    /// Partial runs are cut proportionally to their character count.
    #[must_use]
    pub fn rects_for(&self, start: usize, len: usize) -> Vec<Rect> {
        let end = start + len;
        self.spans
            .iter()
            .filter(|span| span.start < end && start < span.start + span.len)
            .map(|span| {
                let a = start.max(span.start) - span.start;
                let b = end.min(span.start + span.len) - span.start;
                let char_width = span.bounds.width / span.len as f32;
                Rect::new(
                    span.bounds.x + char_width * a as f32,
                    span.bounds.y,
                    char_width * (b - a) as f32,
                    span.bounds.height,
                )
            })
            .collect()
    }

    /// Bounding box of a match, if the layer covers it
    #[must_use]
    pub fn bounds_of(&self, m: &SearchMatch) -> Option<Rect> {
        self.rects_for(m.offset, m.len)
            .into_iter()
            .reduce(|acc, r| acc.union(&r))
    }

    /// Highlights for all matches on `page`, flagging `current`
    #[must_use]
    pub fn highlights(
        &self,
        page: usize,
        matches: &[SearchMatch],
        current: Option<&SearchMatch>,
    ) -> Vec<Highlight> {
        matches
            .iter()
            .filter(|m| m.page == page)
            .map(|m| Highlight {
                matched: m.clone(),
                rects: self.rects_for(m.offset, m.len),
                current: current == Some(m),
            })
            .collect()
    }
}
