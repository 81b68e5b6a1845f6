//! Painting search matches into overlay nodes
//!
//! Only the runs a match touches are rewritten. Runs in between the begin and
//! end run of a multi-run match keep their text and only receive a class.

use crate::mapping::{MatchPosition, RunPosition};
use crate::overlay::{HighlightKind, HighlightStyle, OverlayNode, Segment};
use crate::run::RunStore;
use serde::Serialize;

/// Which matches to paint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightMode {
    /// Paint every match instead of only the selected one
    pub highlight_all: bool,

    /// Index of the selected match, when the selection is on this page
    pub selected: Option<usize>,
}

/// Request to scroll a run into view
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollRequest {
    pub page_index: usize,
    pub run_index: usize,
    pub top_offset_px: f32,
}

struct Painter<'a> {
    nodes: &'a mut [OverlayNode],
    runs: &'a RunStore,
}

impl Painter<'_> {
    /// Clear the run and write its text up to `begin`
    fn begin_text(&mut self, begin: RunPosition, style: Option<HighlightStyle>) {
        let Some(run) = self.runs.get(begin.run_index) else {
            return;
        };
        let Some(node) = self.nodes.get_mut(begin.run_index) else {
            return;
        };
        let text = run.slice(0, Some(begin.offset));
        node.set_spans([Segment { text, style }]);
    }

    /// Append the run's text from `from` to `to` (or to its end)
    fn append_text(&mut self, from: RunPosition, to: Option<usize>, style: Option<HighlightStyle>) {
        let Some(run) = self.runs.get(from.run_index) else {
            return;
        };
        let Some(node) = self.nodes.get_mut(from.run_index) else {
            return;
        };
        let text = run.slice(from.offset, to);
        node.append_span(Segment { text, style });
    }

    fn highlight_node(&mut self, run_index: usize, style: HighlightStyle) {
        if let Some(node) = self.nodes.get_mut(run_index) {
            node.set_class(Some(style));
        }
    }
}

/// Paint `matches` into `nodes`
///
/// `nodes` must already show plain run text for every run the matches touch.
/// Returns the run to scroll into view when the selected match was painted.
pub fn render_matches(
    nodes: &mut [OverlayNode],
    runs: &RunStore,
    matches: &[MatchPosition],
    mode: HighlightMode,
) -> Option<usize> {
    if matches.is_empty() {
        return None;
    }

    let range = if mode.highlight_all {
        0..matches.len()
    } else {
        match mode.selected {
            Some(selected) if selected < matches.len() => selected..selected + 1,
            _ => return None,
        }
    };

    let mut painter = Painter { nodes, runs };
    let mut scroll_to = None;
    let mut prev_end: Option<RunPosition> = None;

    for index in range {
        let MatchPosition { begin, end } = matches[index];
        let selected = mode.selected == Some(index);
        if selected {
            scroll_to = Some(begin.run_index);
        }

        match prev_end {
            Some(prev) if prev.run_index == begin.run_index => {
                painter.append_text(prev, Some(begin.offset), None);
            }
            _ => {
                if let Some(prev) = prev_end {
                    painter.append_text(prev, None, None);
                }
                painter.begin_text(begin, None);
            }
        }

        if begin.run_index == end.run_index {
            let style = HighlightStyle::new(HighlightKind::Whole, selected);
            painter.append_text(begin, Some(end.offset), Some(style));
        } else {
            let style = HighlightStyle::new(HighlightKind::Begin, selected);
            painter.append_text(begin, None, Some(style));
            for middle in begin.run_index + 1..end.run_index {
                painter.highlight_node(middle, HighlightStyle::new(HighlightKind::Middle, selected));
            }
            painter.begin_text(end, Some(HighlightStyle::new(HighlightKind::End, selected)));
        }

        prev_end = Some(end);
    }

    if let Some(prev) = prev_end {
        painter.append_text(prev, None, None);
    }

    scroll_to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{map_matches, MatchRange};
    use crate::run::{RunGeometry, RunText, TextRun};

    fn page(texts: &[&str]) -> (Vec<OverlayNode>, RunStore) {
        let mut nodes = Vec::new();
        let mut runs = RunStore::new();
        for text in texts {
            let geometry = RunGeometry::new("F1", 10.0, "serif", 0.0, 10.0, 10.0);
            let text = RunText::ltr(*text);
            let mut node = OverlayNode::from_geometry(&geometry);
            node.inject_text(&text);
            nodes.push(node);
            runs.push(TextRun::new(geometry, text));
        }
        (nodes, runs)
    }

    fn mapped(runs: &RunStore, ranges: &[MatchRange]) -> Vec<MatchPosition> {
        map_matches(&runs.char_lengths(), ranges).positions
    }

    fn all() -> HighlightMode {
        HighlightMode { highlight_all: true, selected: None }
    }

    fn style(kind: HighlightKind) -> Option<HighlightStyle> {
        Some(HighlightStyle::new(kind, false))
    }

    #[test]
    fn test_single_run_highlight() {
        let (mut nodes, runs) = page(&["Hello World"]);
        let matches = mapped(&runs, &[MatchRange::new(6, 5)]);

        render_matches(&mut nodes, &runs, &matches, all());

        assert_eq!(
            nodes[0].content(),
            &[Segment::plain("Hello "), Segment { text: "World".into(), style: style(HighlightKind::Whole) }]
        );
        assert_eq!(nodes[0].text_content(), "Hello World");
    }

    #[test]
    fn test_two_run_highlight() {
        let (mut nodes, runs) = page(&["Hello ", "World", "!"]);
        let matches = mapped(&runs, &[MatchRange::new(3, 6)]);

        render_matches(&mut nodes, &runs, &matches, all());

        assert_eq!(
            nodes[0].content(),
            &[Segment::plain("Hel"), Segment { text: "lo ".into(), style: style(HighlightKind::Begin) }]
        );
        assert_eq!(
            nodes[1].content(),
            &[Segment { text: "Wor".into(), style: style(HighlightKind::End) }, Segment::plain("ld")]
        );
        assert!(nodes.iter().all(|node| node.class().is_none()));
        assert_eq!(nodes[2].content(), &[Segment::plain("!")]);
    }

    #[test]
    fn test_three_run_highlight_marks_middle() {
        let (mut nodes, runs) = page(&["ab", "cd", "ef"]);
        let matches = mapped(&runs, &[MatchRange::new(1, 4)]);

        render_matches(&mut nodes, &runs, &matches, all());

        assert_eq!(nodes[1].class(), style(HighlightKind::Middle));
        assert_eq!(nodes[1].content(), &[Segment::plain("cd")]);
        assert_eq!(
            nodes[0].content(),
            &[Segment::plain("a"), Segment { text: "b".into(), style: style(HighlightKind::Begin) }]
        );
        assert_eq!(
            nodes[2].content(),
            &[Segment { text: "e".into(), style: style(HighlightKind::End) }, Segment::plain("f")]
        );
    }

    #[test]
    fn test_several_matches_in_one_run() {
        let (mut nodes, runs) = page(&["abcabcabc"]);
        let matches = mapped(&runs, &[MatchRange::new(0, 1), MatchRange::new(3, 1), MatchRange::new(6, 1)]);

        render_matches(&mut nodes, &runs, &matches, all());

        let whole = style(HighlightKind::Whole);
        assert_eq!(
            nodes[0].content(),
            &[
                Segment { text: "a".into(), style: whole },
                Segment::plain("bc"),
                Segment { text: "a".into(), style: whole },
                Segment::plain("bc"),
                Segment { text: "a".into(), style: whole },
                Segment::plain("bc"),
            ]
        );
    }

    #[test]
    fn test_selected_only_mode() {
        let (mut nodes, runs) = page(&["one ", "two ", "one"]);
        let matches = mapped(&runs, &[MatchRange::new(0, 3), MatchRange::new(8, 3)]);

        let mode = HighlightMode { highlight_all: false, selected: Some(1) };
        let scroll = render_matches(&mut nodes, &runs, &matches, mode);

        assert_eq!(scroll, Some(2));
        assert!(!nodes[0].is_highlighted());
        assert_eq!(nodes[0].content(), &[Segment::plain("one ")]);
        assert_eq!(
            nodes[2].content(),
            &[Segment::highlighted("one", HighlightStyle::new(HighlightKind::Whole, true))]
        );
    }

    #[test]
    fn test_highlight_all_marks_selected() {
        let (mut nodes, runs) = page(&["xx ", "yy ", "xx"]);
        let matches = mapped(&runs, &[MatchRange::new(0, 2), MatchRange::new(6, 2)]);

        let mode = HighlightMode { highlight_all: true, selected: Some(0) };
        let scroll = render_matches(&mut nodes, &runs, &matches, mode);

        assert_eq!(scroll, Some(0));
        assert_eq!(nodes[0].content()[0].style, Some(HighlightStyle::new(HighlightKind::Whole, true)));
        assert_eq!(nodes[2].content()[0].style, style(HighlightKind::Whole));
    }

    #[test]
    fn test_selected_multi_run_match_carries_qualifier() {
        let (mut nodes, runs) = page(&["ab", "cd", "ef"]);
        let matches = mapped(&runs, &[MatchRange::new(1, 4)]);

        let mode = HighlightMode { highlight_all: false, selected: Some(0) };
        render_matches(&mut nodes, &runs, &matches, mode);

        assert_eq!(nodes[1].class(), Some(HighlightStyle::new(HighlightKind::Middle, true)));
        assert_eq!(nodes[0].content()[1].style, Some(HighlightStyle::new(HighlightKind::Begin, true)));
        assert_eq!(nodes[2].content()[0].style, Some(HighlightStyle::new(HighlightKind::End, true)));
    }

    #[test]
    fn test_not_selected_page_renders_nothing() {
        let (mut nodes, runs) = page(&["abc"]);
        let matches = mapped(&runs, &[MatchRange::new(0, 1)]);
        let before = nodes.clone();

        let scroll = render_matches(&mut nodes, &runs, &matches, HighlightMode::default());

        assert_eq!(scroll, None);
        assert_eq!(nodes, before);
    }

    #[test]
    fn test_selected_index_out_of_range_renders_nothing() {
        let (mut nodes, runs) = page(&["abc"]);
        let matches = mapped(&runs, &[MatchRange::new(0, 1)]);
        let before = nodes.clone();

        let mode = HighlightMode { highlight_all: false, selected: Some(4) };
        assert_eq!(render_matches(&mut nodes, &runs, &matches, mode), None);
        assert_eq!(nodes, before);
    }

    #[test]
    fn test_runs_outside_matches_untouched() {
        let (mut nodes, runs) = page(&["keep", "ab", "cd", "keep too"]);
        nodes[0].set_plain_text("custom");
        nodes[3].set_plain_text("custom");
        let matches = mapped(&runs, &[MatchRange::new(5, 2)]);

        render_matches(&mut nodes, &runs, &matches, all());

        assert_eq!(nodes[0].text_content(), "custom");
        assert_eq!(nodes[3].text_content(), "custom");
        assert!(nodes[1].is_highlighted());
        assert!(nodes[2].is_highlighted());
    }
}
