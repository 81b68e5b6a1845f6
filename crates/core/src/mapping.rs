//! Mapping page-global match offsets onto runs
//!
//! The search controller reports matches as offsets into the concatenation of
//! every run's text. Highlighting needs them as `(run, offset within run)`
//! pairs. A single cursor walks the runs once for the whole (ascending) match
//! list, so mapping is linear in runs plus matches.

use crate::error::MappingIssue;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// A match as a range of page-global character offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRange {
    pub start: usize,
    pub len: usize,
}

impl MatchRange {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// Offset one past the last matched character
    ///
    /// Saturates, so a bogus range maps as lying beyond the page text.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.len)
    }
}

/// A character position inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunPosition {
    pub run_index: usize,
    pub offset: usize,
}

impl RunPosition {
    pub fn new(run_index: usize, offset: usize) -> Self {
        Self { run_index, offset }
    }
}

/// A match mapped onto runs; `end` is exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchPosition {
    pub begin: RunPosition,
    pub end: RunPosition,
}

impl MatchPosition {
    /// Whether the match crosses a run boundary
    pub fn spans_runs(&self) -> bool {
        self.begin.run_index != self.end.run_index
    }

    /// Indices of every run the match touches
    pub fn runs(&self) -> RangeInclusive<usize> {
        self.begin.run_index..=self.end.run_index
    }
}

/// Mapped positions plus any inconsistencies found on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchMapping {
    pub positions: Vec<MatchPosition>,
    pub issues: Vec<MappingIssue>,
}

struct Cursor<'a> {
    run_lengths: &'a [usize],
    total_chars: usize,
    run_index: usize,
    chars_before: usize,
}

impl Cursor<'_> {
    fn last_run(&self) -> usize {
        self.run_lengths.len() - 1
    }

    fn run_end(&self) -> usize {
        self.chars_before + self.run_lengths[self.run_index]
    }

    /// Position of a match start: an offset on a boundary belongs to the next run
    fn seek_begin(&mut self, offset: usize) {
        while self.run_index != self.last_run() && offset >= self.run_end() {
            self.chars_before = self.run_end();
            self.run_index += 1;
        }
    }

    /// Position of a match end: an offset on a boundary stays in the current run
    fn seek_end(&mut self, offset: usize) {
        while self.run_index != self.last_run() && offset > self.run_end() {
            self.chars_before = self.run_end();
            self.run_index += 1;
        }
    }

    fn position(
        &self,
        match_index: usize,
        offset: usize,
        issues: &mut Vec<MappingIssue>,
    ) -> RunPosition {
        let run_len = self.run_lengths[self.run_index];
        let local = match offset.checked_sub(self.chars_before) {
            Some(local) => local,
            None => {
                issues.push(MappingIssue::OutOfOrder {
                    match_index,
                    offset,
                });
                0
            }
        };

        if local > run_len {
            issues.push(MappingIssue::OffsetBeyondText {
                match_index,
                offset,
                total_chars: self.total_chars,
            });
            return RunPosition::new(self.run_index, run_len);
        }

        RunPosition::new(self.run_index, local)
    }
}

/// Map ascending, non-overlapping global match ranges onto runs
///
/// `run_lengths` holds the character length of every run in page order.
/// Inconsistent offsets are clamped to the last run and reported; a page
/// without runs maps nothing.
pub fn map_matches(run_lengths: &[usize], matches: &[MatchRange]) -> MatchMapping {
    let mut mapping = MatchMapping::default();

    if run_lengths.is_empty() {
        for match_index in 0..matches.len() {
            let issue = MappingIssue::NoRuns { match_index };
            tracing::error!(%issue, "could not map match onto text runs");
            mapping.issues.push(issue);
        }
        return mapping;
    }

    let mut cursor = Cursor {
        run_lengths,
        total_chars: run_lengths.iter().sum(),
        run_index: 0,
        chars_before: 0,
    };

    for (match_index, range) in matches.iter().enumerate() {
        cursor.seek_begin(range.start);
        let begin = cursor.position(match_index, range.start, &mut mapping.issues);

        cursor.seek_end(range.end());
        let end = cursor.position(match_index, range.end(), &mut mapping.issues);

        mapping.positions.push(MatchPosition { begin, end });
    }

    for issue in &mapping.issues {
        tracing::error!(%issue, "could not map match onto text runs");
    }

    mapping
}
