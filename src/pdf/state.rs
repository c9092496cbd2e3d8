//! Navigation and search state of an open document

use crate::search::{MatchCursor, SearchMatch};

/// Page position and search state of the viewer session
#[derive(Clone, Debug)]
pub struct ViewerState {
    /// Current page (1-indexed)
    pub page: usize,

    /// Total page count
    pub page_count: usize,

    /// Term as last entered, kept while text extraction runs
    pub search_term: String,

    /// Matches of the term and the selected one
    pub cursor: MatchCursor,
}

impl ViewerState {
    /// State of a freshly opened document: first page, no search
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self {
            page: 1,
            page_count,
            search_term: String::new(),
            cursor: MatchCursor::new(),
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Step(delta) => {
                let target = i64::try_from(self.page)
                    .ok()
                    .and_then(|page| page.checked_add(delta))
                    .and_then(|page| usize::try_from(page).ok());
                match target {
                    Some(page) => self.turn_to(page),
                    None => vec![],
                }
            }

            Command::GoTo(page) => self.turn_to(page),

            Command::SetSearchTerm(term) => {
                self.search_term = term;
                vec![Effect::RecomputeMatches]
            }

            Command::SetMatches(matches) => {
                self.cursor.set_matches(matches);
                let mut effects = vec![Effect::MatchesChanged(self.cursor.len())];
                match self.cursor.current().cloned() {
                    Some(m) => effects.extend(self.show_match(m)),
                    None => effects.push(Effect::RefreshHighlights { center: None }),
                }
                effects
            }

            Command::NextMatch => match self.cursor.next().cloned() {
                Some(m) => self.show_match(m),
                None => vec![],
            },

            Command::PrevMatch => match self.cursor.previous().cloned() {
                Some(m) => self.show_match(m),
                None => vec![],
            },
        }
    }

    fn turn_to(&mut self, page: usize) -> Vec<Effect> {
        if page < 1 || page > self.page_count || page == self.page {
            return vec![];
        }
        self.page = page;
        vec![
            Effect::PageChanged(page),
            Effect::RenderPage {
                page,
                highlight: None,
            },
        ]
    }

    fn show_match(&mut self, m: SearchMatch) -> Vec<Effect> {
        if m.page == self.page {
            return vec![Effect::RefreshHighlights { center: Some(m) }];
        }
        self.page = m.page;
        vec![
            Effect::PageChanged(m.page),
            Effect::RenderPage {
                page: m.page,
                highlight: Some(m),
            },
        ]
    }

    /// Status text for the page indicator
    #[must_use]
    pub fn page_label(&self) -> String {
        format!("Page {} of {}", self.page, self.page_count)
    }
}

/// Commands that modify viewer state
#[derive(Clone, Debug)]
pub enum Command {
    /// Move by a relative number of pages
    Step(i64),
    /// Jump to a page (1-indexed)
    GoTo(usize),
    /// Store a new search term
    SetSearchTerm(String),
    /// Install freshly computed matches and select the first
    SetMatches(Vec<SearchMatch>),
    NextMatch,
    PrevMatch,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// The current page number changed
    PageChanged(usize),
    /// Render a page, then highlight and center `highlight` on it
    RenderPage {
        page: usize,
        highlight: Option<SearchMatch>,
    },
    /// Match the stored term against the document text
    RecomputeMatches,
    /// New match list with this many entries
    MatchesChanged(usize),
    /// Redraw highlights on the displayed page, centering a match
    RefreshHighlights { center: Option<SearchMatch> },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(page: usize, offset: usize) -> SearchMatch {
        SearchMatch {
            page,
            offset,
            len: 3,
        }
    }

    fn render(page: usize, highlight: Option<SearchMatch>) -> Effect {
        Effect::RenderPage { page, highlight }
    }

    #[test]
    fn step_within_range_renders() {
        let mut state = ViewerState::new(10);
        let effects = state.apply(Command::Step(1));
        assert_eq!(state.page, 2);
        assert_eq!(effects, vec![Effect::PageChanged(2), render(2, None)]);
    }

    #[test]
    fn step_past_either_end_is_a_no_op() {
        let mut state = ViewerState::new(10);
        assert!(state.apply(Command::Step(-1)).is_empty());
        assert_eq!(state.page, 1);

        state.page = 10;
        assert!(state.apply(Command::Step(1)).is_empty());
        assert_eq!(state.page, 10);

        assert!(state.apply(Command::Step(i64::MIN)).is_empty());
        assert!(state.apply(Command::Step(i64::MAX)).is_empty());
    }

    #[test]
    fn go_to_checks_range() {
        let mut state = ViewerState::new(5);
        assert!(state.apply(Command::GoTo(0)).is_empty());
        assert!(state.apply(Command::GoTo(6)).is_empty());
        assert!(state.apply(Command::GoTo(1)).is_empty());
        assert_eq!(
            state.apply(Command::GoTo(5)),
            vec![Effect::PageChanged(5), render(5, None)]
        );
    }

    #[test]
    fn new_matches_jump_to_first_match_page() {
        let mut state = ViewerState::new(5);
        let effects = state.apply(Command::SetMatches(vec![m(3, 0), m(4, 10)]));
        assert_eq!(state.page, 3);
        assert_eq!(
            effects,
            vec![
                Effect::MatchesChanged(2),
                Effect::PageChanged(3),
                render(3, Some(m(3, 0))),
            ]
        );
    }

    #[test]
    fn match_on_current_page_only_refreshes() {
        let mut state = ViewerState::new(5);
        let effects = state.apply(Command::SetMatches(vec![m(1, 4)]));
        assert_eq!(
            effects,
            vec![
                Effect::MatchesChanged(1),
                Effect::RefreshHighlights {
                    center: Some(m(1, 4))
                },
            ]
        );
    }

    #[test]
    fn empty_matches_clear_highlights() {
        let mut state = ViewerState::new(5);
        let effects = state.apply(Command::SetMatches(vec![]));
        assert_eq!(
            effects,
            vec![
                Effect::MatchesChanged(0),
                Effect::RefreshHighlights { center: None }
            ]
        );
        assert!(state.apply(Command::NextMatch).is_empty());
        assert!(state.apply(Command::PrevMatch).is_empty());
    }

    #[test]
    fn match_navigation_wraps_across_pages() {
        let mut state = ViewerState::new(5);
        let _ = state.apply(Command::SetMatches(vec![m(1, 0), m(1, 9), m(4, 2)]));

        let effects = state.apply(Command::NextMatch);
        assert_eq!(
            effects,
            vec![Effect::RefreshHighlights {
                center: Some(m(1, 9))
            }]
        );

        let effects = state.apply(Command::NextMatch);
        assert_eq!(effects, vec![Effect::PageChanged(4), render(4, Some(m(4, 2)))]);

        let effects = state.apply(Command::NextMatch);
        assert_eq!(state.page, 1);
        assert_eq!(effects, vec![Effect::PageChanged(1), render(1, Some(m(1, 0)))]);
    }

    #[test]
    fn search_term_asks_for_recompute() {
        let mut state = ViewerState::new(1);
        let effects = state.apply(Command::SetSearchTerm("valve".into()));
        assert_eq!(state.search_term, "valve");
        assert_eq!(effects, vec![Effect::RecomputeMatches]);
        assert_eq!(state.page_label(), "Page 1 of 1");
    }
}
