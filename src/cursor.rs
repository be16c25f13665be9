//! # Cursor Pagination
//!
//! Opaque server-issued cursors and the back-stack that lets a page walk
//! forward and backward through a cursor-paginated collection.
//!
//! Cursors are only stored and replayed; they are never built or parsed here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque pagination token issued by the API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a token received from the API. Empty tokens are not cursors.
    pub fn new<S: Into<String>>(token: S) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current cursor plus the cursors needed to go back.
///
/// `None` as the current cursor means the first page. `history` grows only
/// through [`PaginationState::go_next`] and shrinks only through
/// [`PaginationState::go_prev`]; [`PaginationState::reset`] clears both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    current: Option<Cursor>,
    history: Vec<Option<Cursor>>,
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_cursor(&self) -> Option<&Cursor> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[Option<Cursor>] {
        &self.history
    }

    pub fn is_first_page(&self) -> bool {
        self.current.is_none()
    }

    pub fn can_go_prev(&self) -> bool {
        !self.is_first_page()
    }

    /// 1-based page number, derived from the history depth.
    pub fn page_number(&self) -> usize {
        self.history.len() + 1
    }

    /// Back to page 1.
    pub fn reset(&mut self) {
        self.current = None;
        self.history.clear();
    }

    /// Advance to `next`. Returns `false` and leaves the state untouched when
    /// there is no next cursor (the last result had no more items).
    pub fn go_next(&mut self, next: Option<Cursor>) -> bool {
        let Some(next) = next else {
            return false;
        };
        let previous = self.current.replace(next);
        self.history.push(previous);
        true
    }

    /// Step back one page. A no-op on page 1; returns whether the state moved.
    pub fn go_prev(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(s: &str) -> Option<Cursor> {
        Cursor::new(s)
    }

    #[test]
    fn next_next_prev_prev_returns_to_initial() {
        let mut state = PaginationState::new();
        assert!(state.go_next(cursor("c1")));
        assert!(state.go_next(cursor("c2")));
        assert_eq!(state.page_number(), 3);
        assert!(state.go_prev());
        assert!(state.go_prev());
        assert_eq!(state, PaginationState::new());
        assert!(state.is_first_page());
        assert!(state.history().is_empty());
    }

    #[test]
    fn go_next_without_cursor_is_ignored() {
        let mut state = PaginationState::new();
        state.go_next(cursor("abc"));
        let before = state.clone();

        assert!(!state.go_next(None));
        assert!(!state.go_next(Cursor::new("")));
        assert_eq!(state, before);
    }

    #[test]
    fn history_records_first_page_as_none() {
        let mut state = PaginationState::new();
        state.go_next(cursor("abc"));
        assert_eq!(state.history(), &[None]);
        assert_eq!(state.current_cursor().map(Cursor::as_str), Some("abc"));

        state.go_prev();
        assert!(state.current_cursor().is_none());
        assert!(state.history().is_empty());
    }

    #[test]
    fn go_prev_on_first_page_is_noop() {
        let mut state = PaginationState::new();
        assert!(!state.go_prev());
        assert!(!state.go_prev());
        assert_eq!(state, PaginationState::new());
    }

    #[test]
    fn reset_clears_deep_history() {
        let mut state = PaginationState::new();
        for token in ["a", "b", "c", "d"] {
            state.go_next(cursor(token));
        }
        assert!(state.can_go_prev());
        state.reset();
        assert_eq!(state, PaginationState::new());
    }

    #[test]
    fn cursor_serializes_as_plain_string() {
        let c = Cursor::new("eyJpZCI6MX0=").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"eyJpZCI6MX0=\"");
        let back: Cursor = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(back.as_str(), "xyz");
    }
}
