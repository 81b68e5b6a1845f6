//! Text layer configuration

use crate::error::{TextLayerError, TextLayerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default debounce window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Pages with more runs than this are never aligned
pub const DEFAULT_MAX_RUNS: usize = 100_000;

/// Vertical offset applied when scrolling the selected match into view
pub const DEFAULT_SCROLL_TOP_OFFSET_PX: f32 = -50.0;

/// Configuration for a page's text layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayerConfig {
    /// Idle time after the last scroll before the alignment pass runs
    pub debounce_ms: u64,

    /// Run-count ceiling for the alignment pass
    pub max_runs: usize,

    /// Offset from the top of the viewport for the selected match
    pub scroll_top_offset_px: f32,
}

impl Default for TextLayerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_runs: DEFAULT_MAX_RUNS,
            scroll_top_offset_px: DEFAULT_SCROLL_TOP_OFFSET_PX,
        }
    }
}

impl TextLayerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the run-count ceiling
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = max_runs;
        self
    }

    /// Set the scroll-into-view offset
    pub fn with_scroll_top_offset(mut self, offset_px: f32) -> Self {
        self.scroll_top_offset_px = offset_px;
        self
    }

    /// Debounce window as a [`Duration`]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reject values the layer cannot work with
    pub fn validate(&self) -> TextLayerResult<()> {
        if self.max_runs == 0 {
            return Err(TextLayerError::InvalidConfig(
                "max_runs must be at least 1".to_string(),
            ));
        }
        if !self.scroll_top_offset_px.is_finite() {
            return Err(TextLayerError::InvalidConfig(format!(
                "scroll_top_offset_px must be finite, got {}",
                self.scroll_top_offset_px
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> TextLayerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> TextLayerResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
