//! Search state snapshot
//!
//! The search controller owns the query, the per-page match offsets and the
//! selection. Text layers only ever read a [`SearchState`] snapshot of it.

use crate::mapping::MatchRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The selected match: which page, and which match on that page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedMatch {
    pub page_index: usize,
    pub match_index: usize,
}

/// Options for [`SearchState::find`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub highlight_all: bool,
}

/// Read-only snapshot of the search controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    /// Whether a search is active
    pub active: bool,

    pub case_sensitive: bool,

    /// Highlight every match instead of only the selected one
    pub highlight_all: bool,

    /// Query length in characters
    pub query_len: usize,

    pub selected: Option<SelectedMatch>,

    /// Ascending global start offsets of the matches on each page
    pub page_matches: BTreeMap<usize, Vec<usize>>,
}

impl SearchState {
    /// No active search
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Search every page and select the first match
    ///
    /// `pages` yields `(page_index, page_text)` where the page text is the
    /// concatenation of the page's runs. An empty query yields an inactive
    /// state.
    pub fn find<'a>(
        pages: impl IntoIterator<Item = (usize, &'a str)>,
        query: &str,
        options: SearchOptions,
    ) -> Self {
        if query.is_empty() {
            return Self::inactive();
        }

        let page_matches: BTreeMap<usize, Vec<usize>> = pages
            .into_iter()
            .map(|(page_index, text)| (page_index, find_matches(text, query, options.case_sensitive)))
            .filter(|(_, matches)| !matches.is_empty())
            .collect();

        let selected = page_matches.keys().next().map(|&page_index| SelectedMatch {
            page_index,
            match_index: 0,
        });

        Self {
            active: true,
            case_sensitive: options.case_sensitive,
            highlight_all: options.highlight_all,
            query_len: query.chars().count(),
            selected,
            page_matches,
        }
    }

    /// Matches on `page_index` as global ranges
    pub fn page_ranges(&self, page_index: usize) -> Vec<MatchRange> {
        self.page_matches
            .get(&page_index)
            .map(|starts| {
                starts
                    .iter()
                    .map(|&start| MatchRange::new(start, self.query_len))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index of the selected match if it lies on `page_index`
    pub fn selected_on(&self, page_index: usize) -> Option<usize> {
        self.selected
            .filter(|selected| selected.page_index == page_index)
            .map(|selected| selected.match_index)
    }

    /// Total number of matches across pages
    pub fn match_count(&self) -> usize {
        self.page_matches.values().map(Vec::len).sum()
    }

    /// Select a match; `None` clears the selection
    pub fn select(&mut self, selected: Option<SelectedMatch>) {
        self.selected = selected;
    }
}

/// Character offsets of every non-overlapping occurrence of `query` in `text`
pub fn find_matches(text: &str, query: &str, case_sensitive: bool) -> Vec<usize> {
    let fold = |ch: char| -> char {
        if case_sensitive {
            ch
        } else {
            // Single-char lowercase keeps offsets aligned with the page text.
            ch.to_lowercase().next().unwrap_or(ch)
        }
    };

    let haystack: Vec<char> = text.chars().map(fold).collect();
    let needle: Vec<char> = query.chars().map(fold).collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    let mut start = 0;
    while start + needle.len() <= haystack.len() {
        if haystack[start..start + needle.len()] == needle[..] {
            matches.push(start);
            start += needle.len();
        } else {
            start += 1;
        }
    }
    matches
}
