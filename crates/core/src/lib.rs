//! Text Layer Core Library
//!
//! Invisible, selectable text overlay for rendered document pages: run
//! geometry and text, width alignment against a metrics source, and painting
//! of search matches.

pub mod config;
pub mod error;
pub mod highlight;
pub mod layer;
pub mod mapping;
pub mod metrics;
pub mod overlay;
pub mod registry;
pub mod run;
pub mod search;

pub use config::TextLayerConfig;
pub use error::{MappingIssue, TextLayerError, TextLayerResult};
pub use highlight::{render_matches, HighlightMode, ScrollRequest};
pub use layer::{FrameContext, LayerEvent, LayerPhase, MatchUpdate, TextLayer};
pub use mapping::{map_matches, MatchMapping, MatchPosition, MatchRange, RunPosition};
pub use metrics::{
    AlignOutcome, AlignmentStats, FixedAdvanceMetrics, FontFileMetrics, MetricsScaler, TextMetrics,
};
pub use overlay::{
    HighlightKind, HighlightStyle, NodeTransform, OverlayNode, Segment, WritingDirection,
};
pub use registry::TextLayerSet;
pub use run::{RunGeometry, RunStore, RunText, TextDirection, TextRun};
pub use search::{find_matches, SearchOptions, SearchState, SelectedMatch};
