//! Per-page text layer
//!
//! Builds the overlay in two phases. Geometry for every run arrives first and
//! creates empty, positioned nodes; the recognized text arrives later (possibly
//! before layout has finished) and is injected once both are available. The
//! alignment pass then runs through the debounce timer, and once it has
//! completed, search matches are painted.
//!
//! Readiness is a one-way state machine, reset only by [`TextLayer::begin_layout`]:
//!
//! ```text
//! Empty --end_layout--> GeometryReady --text injected--> TextReady --aligned--> Rendered
//! ```
//!
//! Calls that arrive in the wrong phase are no-ops. They are retried by the
//! next natural trigger (another `assign_text`, a timer poll, a search update).

use crate::config::TextLayerConfig;
use crate::error::MappingIssue;
use crate::highlight::{render_matches, HighlightMode, ScrollRequest};
use crate::mapping::{map_matches, MatchPosition};
use crate::metrics::{AlignOutcome, AlignmentStats, MetricsScaler, TextMetrics};
use crate::overlay::OverlayNode;
use crate::run::{RunGeometry, RunStore, RunText, TextRun};
use crate::search::SearchState;
use serde::Serialize;
use textlayer_scheduler::{DebounceDecision, DebounceStats, DebounceTimer, Timestamp};

/// Readiness of a page's text layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPhase {
    /// Collecting run geometry
    Empty,
    /// Layout finished, waiting for text
    GeometryReady,
    /// Text injected, waiting for the alignment pass
    TextReady,
    /// Nodes aligned; matches may be painted
    Rendered,
}

impl LayerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerPhase::Empty => "empty",
            LayerPhase::GeometryReady => "geometry_ready",
            LayerPhase::TextReady => "text_ready",
            LayerPhase::Rendered => "rendered",
        }
    }
}

/// Snapshot of the collaborators' state for one operation
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub now: Timestamp,

    /// Last time the viewport scrolled; `None` if it never did
    pub last_scroll: Option<Timestamp>,

    pub search: &'a SearchState,
}

impl<'a> FrameContext<'a> {
    pub fn new(now: Timestamp, last_scroll: Option<Timestamp>, search: &'a SearchState) -> Self {
        Self {
            now,
            last_scroll,
            search,
        }
    }

    /// A context for a viewport that has never scrolled
    pub fn idle(search: &'a SearchState) -> Self {
        Self::new(Timestamp::ZERO, None, search)
    }
}

/// Result of repainting the page's matches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchUpdate {
    /// Runs restored to plain text
    pub cleared_runs: usize,

    /// Matches mapped onto runs
    pub mapped: usize,

    pub issues: Vec<MappingIssue>,

    /// Where to scroll for the selected match
    pub scroll: Option<ScrollRequest>,
}

/// What an operation on the layer did
#[derive(Debug, Clone, PartialEq)]
pub enum LayerEvent {
    /// Nothing to do in the current phase
    Idle,

    /// The text did not line up with the geometry and was dropped
    TextRejected { geometry_runs: usize, text_runs: usize },

    /// The alignment pass was postponed until `due`
    Deferred { due: Timestamp },

    /// The alignment pass ran and matches were painted
    Rendered {
        alignment: AlignmentStats,
        matches: MatchUpdate,
    },

    /// The page has too many runs to align
    TooManyRuns { runs: usize, limit: usize },
}

/// Text overlay of one page
pub struct TextLayer<M> {
    page_index: usize,
    config: TextLayerConfig,
    metrics: M,
    phase: LayerPhase,
    geometry: Vec<RunGeometry>,
    nodes: Vec<OverlayNode>,
    runs: RunStore,
    pending_text: Option<Vec<RunText>>,
    timer: DebounceTimer,
    matches: Vec<MatchPosition>,
}

impl<M: TextMetrics> TextLayer<M> {
    /// Create a layer with the default configuration
    pub fn new(page_index: usize, metrics: M) -> Self {
        Self::with_config(page_index, TextLayerConfig::default(), metrics)
    }

    pub fn with_config(page_index: usize, config: TextLayerConfig, metrics: M) -> Self {
        let timer = DebounceTimer::new(config.debounce());
        Self {
            page_index,
            config,
            metrics,
            phase: LayerPhase::Empty,
            geometry: Vec::new(),
            nodes: Vec::new(),
            runs: RunStore::new(),
            pending_text: None,
            timer,
            matches: Vec::new(),
        }
    }

    /// Start a fresh layout, discarding nodes, runs, matches and any pending pass
    ///
    /// Text assigned but not yet injected is kept for the new layout.
    pub fn begin_layout(&mut self) {
        self.timer.cancel();
        self.phase = LayerPhase::Empty;
        self.geometry.clear();
        self.nodes.clear();
        self.runs.clear();
        self.matches.clear();
        tracing::debug!(page = self.page_index, "text layer: layout started");
    }

    /// Add the geometry of the next run in page order
    pub fn append_geometry(&mut self, geometry: RunGeometry) {
        if self.phase != LayerPhase::Empty {
            tracing::debug!(page = self.page_index, "text layer: geometry after layout ignored");
            return;
        }
        self.nodes.push(OverlayNode::from_geometry(&geometry));
        self.geometry.push(geometry);
    }

    /// Finish layout and inject text if it is already available
    pub fn end_layout(&mut self, ctx: &FrameContext<'_>) -> LayerEvent {
        if self.phase == LayerPhase::Empty {
            self.phase = LayerPhase::GeometryReady;
            tracing::debug!(
                page = self.page_index,
                runs = self.nodes.len(),
                "text layer: layout done"
            );
        }
        self.inject_text(ctx)
    }

    /// Supply the recognized text of every run, index-aligned with the geometry
    ///
    /// Once text has been injected, further calls are no-ops.
    pub fn assign_text(&mut self, texts: Vec<RunText>, ctx: &FrameContext<'_>) -> LayerEvent {
        if self.content_assigned() {
            return LayerEvent::Idle;
        }
        self.pending_text = Some(texts);
        self.inject_text(ctx)
    }

    fn inject_text(&mut self, ctx: &FrameContext<'_>) -> LayerEvent {
        if self.phase != LayerPhase::GeometryReady {
            return LayerEvent::Idle;
        }
        let Some(texts) = self.pending_text.take() else {
            return LayerEvent::Idle;
        };

        if texts.len() != self.geometry.len() {
            tracing::warn!(
                page = self.page_index,
                geometry_runs = self.geometry.len(),
                text_runs = texts.len(),
                "text layer: text does not line up with geometry, dropped"
            );
            return LayerEvent::TextRejected {
                geometry_runs: self.geometry.len(),
                text_runs: texts.len(),
            };
        }

        for ((node, geometry), text) in self.nodes.iter_mut().zip(&self.geometry).zip(texts) {
            node.inject_text(&text);
            self.runs.push(TextRun::new(geometry.clone(), text));
        }
        self.phase = LayerPhase::TextReady;
        tracing::debug!(page = self.page_index, "text layer: text injected");

        self.schedule_render(ctx)
    }

    fn schedule_render(&mut self, ctx: &FrameContext<'_>) -> LayerEvent {
        match self.timer.trigger(ctx.now, ctx.last_scroll) {
            DebounceDecision::RunNow => self.render_layer(ctx.search),
            DebounceDecision::Deferred { due } => LayerEvent::Deferred { due },
        }
    }

    /// Fire the debounce timer if it is due
    pub fn poll(&mut self, ctx: &FrameContext<'_>) -> LayerEvent {
        if self.phase != LayerPhase::TextReady {
            return LayerEvent::Idle;
        }
        match self.timer.poll(ctx.now, ctx.last_scroll) {
            None => LayerEvent::Idle,
            Some(DebounceDecision::RunNow) => self.render_layer(ctx.search),
            Some(DebounceDecision::Deferred { due }) => LayerEvent::Deferred { due },
        }
    }

    /// Run the alignment pass, then paint matches
    fn render_layer(&mut self, search: &SearchState) -> LayerEvent {
        if self.phase != LayerPhase::TextReady {
            return LayerEvent::Idle;
        }

        let mut scaler = MetricsScaler::new(&mut self.metrics, self.config.max_runs);
        match scaler.align(&mut self.nodes, &self.runs) {
            AlignOutcome::TooManyRuns { runs, limit } => {
                tracing::warn!(
                    page = self.page_index,
                    runs,
                    limit,
                    "text layer: too many runs, overlay not rendered"
                );
                LayerEvent::TooManyRuns { runs, limit }
            }
            AlignOutcome::Completed(alignment) => {
                self.phase = LayerPhase::Rendered;
                tracing::debug!(
                    page = self.page_index,
                    attached = alignment.attached,
                    "text layer: rendered"
                );
                let matches = self.update_matches(search).unwrap_or_default();
                LayerEvent::Rendered { alignment, matches }
            }
        }
    }

    /// Clear old highlights and paint the current matches
    ///
    /// Returns `None` before the layer has been rendered.
    pub fn update_matches(&mut self, search: &SearchState) -> Option<MatchUpdate> {
        if self.phase != LayerPhase::Rendered {
            return None;
        }

        let mut update = MatchUpdate {
            cleared_runs: self.clear_matches(),
            ..MatchUpdate::default()
        };

        if !search.active {
            return Some(update);
        }

        let ranges = search.page_ranges(self.page_index);
        let mapping = map_matches(&self.runs.char_lengths(), &ranges);
        self.matches = mapping.positions;
        update.mapped = self.matches.len();
        update.issues = mapping.issues;

        let mode = HighlightMode {
            highlight_all: search.highlight_all,
            selected: search.selected_on(self.page_index),
        };
        let scroll_to = render_matches(&mut self.nodes, &self.runs, &self.matches, mode);
        update.scroll = scroll_to.map(|run_index| ScrollRequest {
            page_index: self.page_index,
            run_index,
            top_offset_px: self.config.scroll_top_offset_px,
        });

        Some(update)
    }

    /// Restore every run covered by the current matches to plain text
    fn clear_matches(&mut self) -> usize {
        let mut cleared = 0;
        let mut cleared_until = 0;

        for position in std::mem::take(&mut self.matches) {
            let first = cleared_until.max(position.begin.run_index);
            for run_index in first..=position.end.run_index {
                let (Some(node), Some(run)) = (self.nodes.get_mut(run_index), self.runs.get(run_index))
                else {
                    continue;
                };
                node.set_plain_text(run.text.clone());
                node.set_class(None);
                cleared += 1;
            }
            cleared_until = cleared_until.max(position.end.run_index + 1);
        }

        cleared
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn config(&self) -> &TextLayerConfig {
        &self.config
    }

    pub fn phase(&self) -> LayerPhase {
        self.phase
    }

    pub fn layout_done(&self) -> bool {
        self.phase >= LayerPhase::GeometryReady
    }

    pub fn content_assigned(&self) -> bool {
        self.phase >= LayerPhase::TextReady
    }

    pub fn rendering_done(&self) -> bool {
        self.phase == LayerPhase::Rendered
    }

    pub fn nodes(&self) -> &[OverlayNode] {
        &self.nodes
    }

    pub fn runs(&self) -> &RunStore {
        &self.runs
    }

    /// Matches currently painted (or last mapped) on this page
    pub fn matches(&self) -> &[MatchPosition] {
        &self.matches
    }

    /// Due time of the pending alignment pass
    pub fn pending_render(&self) -> Option<Timestamp> {
        self.timer.pending_due()
    }

    pub fn debounce_stats(&self) -> DebounceStats {
        self.timer.stats()
    }
}
