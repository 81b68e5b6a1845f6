//! Text layers of a whole document
//!
//! Owns one [`TextLayer`] per open page, drives their debounce timers from a
//! single poll, and repaints every rendered page when the search changes.

use crate::config::TextLayerConfig;
use crate::highlight::ScrollRequest;
use crate::layer::{FrameContext, LayerEvent, MatchUpdate, TextLayer};
use crate::metrics::TextMetrics;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Per-page text layers keyed by page index
pub struct TextLayerSet<M> {
    config: TextLayerConfig,
    layers: BTreeMap<usize, TextLayer<M>>,
}

impl<M: TextMetrics> TextLayerSet<M> {
    pub fn new(config: TextLayerConfig) -> Self {
        Self {
            config,
            layers: BTreeMap::new(),
        }
    }

    /// Create (or replace) the layer of a page and start its layout
    pub fn open_page(&mut self, page_index: usize, metrics: M) -> &mut TextLayer<M> {
        let layer = TextLayer::with_config(page_index, self.config.clone(), metrics);
        let layer = match self.layers.entry(page_index) {
            Entry::Occupied(mut entry) => {
                tracing::debug!(page = page_index, "text layer: replacing open page");
                entry.insert(layer);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(layer),
        };
        layer.begin_layout();
        layer
    }

    /// Drop a page's layer, e.g. when it scrolls far out of view
    pub fn close_page(&mut self, page_index: usize) -> Option<TextLayer<M>> {
        self.layers.remove(&page_index)
    }

    pub fn get(&self, page_index: usize) -> Option<&TextLayer<M>> {
        self.layers.get(&page_index)
    }

    pub fn get_mut(&mut self, page_index: usize) -> Option<&mut TextLayer<M>> {
        self.layers.get_mut(&page_index)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Page indices with a layer, ascending
    pub fn pages(&self) -> Vec<usize> {
        self.layers.keys().copied().collect()
    }

    /// Fire due debounce timers on every page
    ///
    /// Returns the non-idle events by page.
    pub fn poll(&mut self, ctx: &FrameContext<'_>) -> Vec<(usize, LayerEvent)> {
        self.layers
            .iter_mut()
            .map(|(&page_index, layer)| (page_index, layer.poll(ctx)))
            .filter(|(_, event)| *event != LayerEvent::Idle)
            .collect()
    }

    /// Repaint matches on every rendered page after a search change
    pub fn refresh_matches(&mut self, ctx: &FrameContext<'_>) -> Vec<(usize, MatchUpdate)> {
        self.layers
            .iter_mut()
            .filter_map(|(&page_index, layer)| {
                layer
                    .update_matches(ctx.search)
                    .map(|update| (page_index, update))
            })
            .collect()
    }

    /// First scroll request among a batch of updates
    pub fn scroll_target(updates: &[(usize, MatchUpdate)]) -> Option<ScrollRequest> {
        updates.iter().find_map(|(_, update)| update.scroll)
    }
}
