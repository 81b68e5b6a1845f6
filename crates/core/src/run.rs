//! Text runs and the per-page run store
//!
//! A run is a contiguous span of recognized text sharing one font and
//! position. Geometry arrives from the page renderer before the text is known;
//! the two are joined into a [`TextRun`] once the text has been recognized.

use serde::{Deserialize, Serialize};

/// Direction of a run as reported by the text extraction pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
    /// Top-to-bottom (vertical) text
    Ttb,
}

impl TextDirection {
    /// Whether glyphs flow vertically
    pub fn is_vertical(self) -> bool {
        matches!(self, TextDirection::Ttb)
    }
}

fn unit_scale() -> f32 {
    1.0
}

/// Geometry of a run, known before its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunGeometry {
    /// Font resource name in the page (e.g. "g_font_3")
    pub font_name: String,

    /// Font size in extractor units
    pub font_size: f32,

    /// CSS font family used to style the overlay node
    pub font_family: String,

    /// Left edge in pixels
    pub x: f32,

    /// Baseline in pixels
    pub y: f32,

    /// Width of the run as painted in the raster, in extractor units
    pub canvas_width: f32,

    /// Horizontal extractor-to-pixel scale
    #[serde(default = "unit_scale")]
    pub h_scale: f32,

    /// Vertical extractor-to-pixel scale
    #[serde(default = "unit_scale")]
    pub v_scale: f32,
}

impl RunGeometry {
    /// Create geometry already expressed in pixels
    pub fn new(
        font_name: impl Into<String>,
        font_size: f32,
        font_family: impl Into<String>,
        x: f32,
        y: f32,
        canvas_width: f32,
    ) -> Self {
        Self {
            font_name: font_name.into(),
            font_size,
            font_family: font_family.into(),
            x,
            y,
            canvas_width,
            h_scale: 1.0,
            v_scale: 1.0,
        }
    }

    /// Set the extractor-to-pixel scale factors
    pub fn with_scale(mut self, h_scale: f32, v_scale: f32) -> Self {
        self.h_scale = h_scale;
        self.v_scale = v_scale;
        self
    }

    /// Font height in pixels
    pub fn font_height_px(&self) -> f32 {
        self.font_size * self.v_scale
    }

    /// Painted width in pixels
    pub fn canvas_width_px(&self) -> f32 {
        self.canvas_width * self.h_scale
    }
}

/// Recognized text of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunText {
    pub text: String,

    #[serde(default)]
    pub dir: TextDirection,
}

impl RunText {
    pub fn new(text: impl Into<String>, dir: TextDirection) -> Self {
        Self {
            text: text.into(),
            dir,
        }
    }

    /// Left-to-right text
    pub fn ltr(text: impl Into<String>) -> Self {
        Self::new(text, TextDirection::Ltr)
    }

    /// Whether the text has no non-whitespace character
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }
}

/// A run with both geometry and text
///
/// Immutable once created. Lengths and offsets count `char`s.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub geometry: RunGeometry,
    pub text: String,
    pub direction: TextDirection,
    char_len: usize,
}

impl TextRun {
    pub fn new(geometry: RunGeometry, text: RunText) -> Self {
        let char_len = text.text.chars().count();
        Self {
            geometry,
            text: text.text,
            direction: text.dir,
            char_len,
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Characters `from..to`, or `from..` when `to` is `None`
    ///
    /// Out-of-range bounds are clamped.
    pub fn slice(&self, from: usize, to: Option<usize>) -> String {
        let to = to.unwrap_or(self.char_len).min(self.char_len);
        self.text
            .chars()
            .skip(from)
            .take(to.saturating_sub(from))
            .collect()
    }
}

/// Ordered runs of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStore {
    runs: Vec<TextRun>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a run; runs must be pushed in page order
    pub fn push(&mut self, run: TextRun) {
        self.runs.push(run);
    }

    pub fn get(&self, index: usize) -> Option<&TextRun> {
        self.runs.get(index)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextRun> {
        self.runs.iter()
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }

    /// Character length of every run, in page order
    pub fn char_lengths(&self) -> Vec<usize> {
        self.runs.iter().map(TextRun::char_len).collect()
    }

    /// Concatenation of all run texts in page order
    pub fn page_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

impl FromIterator<TextRun> for RunStore {
    fn from_iter<I: IntoIterator<Item = TextRun>>(iter: I) -> Self {
        Self {
            runs: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> RunGeometry {
        RunGeometry::new("F1", 10.0, "sans-serif", 0.0, 20.0, 50.0)
    }

    #[test]
    fn test_geometry_scaling() {
        let geometry = geometry().with_scale(2.0, 1.5);
        assert_eq!(geometry.font_height_px(), 15.0);
        assert_eq!(geometry.canvas_width_px(), 100.0);
    }

    #[test]
    fn test_geometry_json_defaults_scale() {
        let json = r#"{
            "font_name": "F1", "font_size": 12, "font_family": "serif",
            "x": 1, "y": 2, "canvas_width": 30
        }"#;
        let geometry: RunGeometry = serde_json::from_str(json).unwrap();
        assert_eq!(geometry.h_scale, 1.0);
        assert_eq!(geometry.v_scale, 1.0);
    }

    #[test]
    fn test_whitespace_detection() {
        assert!(RunText::ltr("   ").is_whitespace());
        assert!(RunText::ltr("\t\u{00A0}").is_whitespace());
        assert!(RunText::ltr("").is_whitespace());
        assert!(!RunText::ltr(" a ").is_whitespace());
    }

    #[test]
    fn test_run_slice_counts_chars() {
        let run = TextRun::new(geometry(), RunText::ltr("héllo"));
        assert_eq!(run.char_len(), 5);
        assert_eq!(run.slice(1, Some(3)), "él");
        assert_eq!(run.slice(3, None), "lo");
        assert_eq!(run.slice(4, Some(99)), "o");
        assert_eq!(run.slice(4, Some(2)), "");
    }

    #[test]
    fn test_run_store_page_text() {
        let store: RunStore = ["Hello ", "World", "!"]
            .into_iter()
            .map(|text| TextRun::new(geometry(), RunText::ltr(text)))
            .collect();

        assert_eq!(store.len(), 3);
        assert_eq!(store.char_lengths(), vec![6, 5, 1]);
        assert_eq!(store.page_text(), "Hello World!");
        assert_eq!(store.get(1).map(|run| run.text.as_str()), Some("World"));
    }

    #[test]
    fn test_direction_serde() {
        let text: RunText = serde_json::from_str(r#"{ "text": "x", "dir": "ttb" }"#).unwrap();
        assert!(text.dir.is_vertical());
        let text: RunText = serde_json::from_str(r#"{ "text": "x" }"#).unwrap();
        assert_eq!(text.dir, TextDirection::Ltr);
    }
}
