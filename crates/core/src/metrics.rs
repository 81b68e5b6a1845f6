//! Text metrics and glyph-width alignment
//!
//! The raster image paints each run with the document's embedded font, while
//! the overlay node renders the same characters with a substitute font. To make
//! selection line up with the painted glyphs, every node is stretched
//! horizontally so its natural width equals the painted width.

use crate::error::TextLayerResult;
use crate::overlay::{NodeTransform, OverlayNode};
use crate::run::{RunStore, TextDirection};
use std::collections::HashMap;
use std::path::Path;

/// Rotation applied to vertical runs before scaling
pub const VERTICAL_ROTATION_DEG: f32 = 90.0;

/// Measures the rendered width of text
///
/// `font` is the shorthand used to style the node (e.g. `12px serif`), so the
/// measurement matches what the overlay will display.
pub trait TextMetrics {
    /// Width of `text` in pixels
    fn measure(&mut self, font: &str, text: &str) -> f32;
}

impl<F> TextMetrics for F
where
    F: FnMut(&str, &str) -> f32,
{
    fn measure(&mut self, font: &str, text: &str) -> f32 {
        self(font, text)
    }
}

/// Pixel size from a font shorthand such as `12.5px sans-serif`
pub fn font_size_px(font: &str) -> Option<f32> {
    font.split_whitespace()
        .find_map(|token| token.strip_suffix("px"))
        .and_then(|size| size.parse::<f32>().ok())
        .filter(|size| size.is_finite() && *size > 0.0)
}

/// Every character advances by a fixed fraction of the font size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvanceMetrics {
    advance_em: f32,
}

impl FixedAdvanceMetrics {
    pub fn new(advance_em: f32) -> Self {
        Self { advance_em }
    }

    pub fn advance_em(&self) -> f32 {
        self.advance_em
    }
}

impl Default for FixedAdvanceMetrics {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TextMetrics for FixedAdvanceMetrics {
    fn measure(&mut self, font: &str, text: &str) -> f32 {
        let Some(size) = font_size_px(font) else {
            tracing::trace!(font, "unparsable font size");
            return 0.0;
        };
        text.chars().count() as f32 * self.advance_em * size
    }
}

/// Widths from the horizontal advances of a TrueType/OpenType face
///
/// Advances are read once, when the face is loaded. Characters the face does
/// not map measure as a space.
#[derive(Clone)]
pub struct FontFileMetrics {
    advances: HashMap<char, u16>,
    face_index: u32,
    units_per_em: u16,
    fallback_advance: u16,
}

impl FontFileMetrics {
    /// Parse the first face of a font file or collection
    pub fn from_bytes(data: Vec<u8>) -> TextLayerResult<Self> {
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let mut last_error = ttf_parser::FaceParsingError::UnknownMagic;
        for face_index in 0..count {
            match ttf_parser::Face::parse(&data, face_index) {
                Ok(face) => {
                    let units_per_em = face.units_per_em().max(1);
                    let advances = advance_table(&face);
                    let fallback_advance =
                        advances.get(&' ').copied().unwrap_or(units_per_em / 2);
                    tracing::debug!(
                        face_index,
                        units_per_em,
                        glyphs = advances.len(),
                        "font face loaded"
                    );
                    return Ok(Self {
                        advances,
                        face_index,
                        units_per_em,
                        fallback_advance,
                    });
                }
                Err(error) => last_error = error,
            }
        }
        Err(last_error.into())
    }

    /// Load a font file from disk
    pub fn load(path: &Path) -> TextLayerResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Advance of `ch` in font units, if the face maps it
    pub fn advance(&self, ch: char) -> Option<u16> {
        self.advances.get(&ch).copied()
    }
}

/// Horizontal advance of every character the face's Unicode cmaps map
fn advance_table(face: &ttf_parser::Face<'_>) -> HashMap<char, u16> {
    let mut advances = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return advances;
    };
    for subtable in cmap.subtables.into_iter().filter(|subtable| subtable.is_unicode()) {
        subtable.codepoints(|code_point| {
            let Some(ch) = char::from_u32(code_point) else {
                return;
            };
            if advances.contains_key(&ch) {
                return;
            }
            if let Some(advance) = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
            {
                advances.insert(ch, advance);
            }
        });
    }
    advances
}

impl std::fmt::Debug for FontFileMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFileMetrics")
            .field("glyphs", &self.advances.len())
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl TextMetrics for FontFileMetrics {
    fn measure(&mut self, font: &str, text: &str) -> f32 {
        let Some(size) = font_size_px(font) else {
            tracing::trace!(font, "unparsable font size");
            return 0.0;
        };

        let units: u32 = text
            .chars()
            .map(|ch| u32::from(self.advance(ch).unwrap_or(self.fallback_advance)))
            .sum();

        units as f32 * size / f32::from(self.units_per_em)
    }
}

/// Transform stretching a node of `natural_width` to `canvas_width`
///
/// Returns `None` for unmeasurable text (zero, negative or non-finite natural
/// width) and for a non-finite painted width.
pub fn compute_transform(
    canvas_width: f32,
    natural_width: f32,
    direction: TextDirection,
) -> Option<NodeTransform> {
    if !canvas_width.is_finite() || !natural_width.is_finite() || natural_width <= 0.0 {
        return None;
    }

    let rotate_deg = if direction.is_vertical() {
        VERTICAL_ROTATION_DEG
    } else {
        0.0
    };

    Some(NodeTransform {
        scale_x: canvas_width / natural_width,
        rotate_deg,
    })
}

/// Counters from a completed alignment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentStats {
    /// Nodes added to the visible overlay
    pub attached: usize,

    /// Nodes left out because their text measured zero width
    pub unmeasurable: usize,

    /// Whitespace-only nodes skipped
    pub whitespace: usize,
}

/// Result of an alignment pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOutcome {
    Completed(AlignmentStats),

    /// The page exceeds the run ceiling; nothing was attached
    TooManyRuns { runs: usize, limit: usize },
}

/// Measures runs and finalizes their node transforms
pub struct MetricsScaler<'a, M: TextMetrics + ?Sized> {
    metrics: &'a mut M,
    max_runs: usize,
}

impl<'a, M: TextMetrics + ?Sized> MetricsScaler<'a, M> {
    pub fn new(metrics: &'a mut M, max_runs: usize) -> Self {
        Self { metrics, max_runs }
    }

    /// Align every node with its run
    ///
    /// `nodes` and `runs` are index-aligned. The pass runs to completion or,
    /// when the page has more than `max_runs` runs, does nothing at all.
    pub fn align(&mut self, nodes: &mut [OverlayNode], runs: &RunStore) -> AlignOutcome {
        if nodes.len() > self.max_runs {
            return AlignOutcome::TooManyRuns {
                runs: nodes.len(),
                limit: self.max_runs,
            };
        }

        let mut stats = AlignmentStats::default();
        for (index, (node, run)) in nodes.iter_mut().zip(runs.iter()).enumerate() {
            if node.is_whitespace() {
                stats.whitespace += 1;
                continue;
            }

            let natural_width = self.metrics.measure(&node.font(), &run.text);
            match compute_transform(node.canvas_width, natural_width, run.direction) {
                Some(transform) => {
                    node.attach(transform);
                    stats.attached += 1;
                }
                None => {
                    tracing::trace!(run = index, natural_width, "run not measurable, left out");
                    stats.unmeasurable += 1;
                }
            }
        }

        AlignOutcome::Completed(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{RunGeometry, RunText, TextRun};

    fn page(texts: &[(&str, TextDirection)], canvas_width: f32) -> (Vec<OverlayNode>, RunStore) {
        let mut nodes = Vec::new();
        let mut runs = RunStore::new();
        for (text, dir) in texts {
            let geometry = RunGeometry::new("F1", 10.0, "sans-serif", 0.0, 20.0, canvas_width);
            let text = RunText::new(*text, *dir);
            let mut node = OverlayNode::from_geometry(&geometry);
            node.inject_text(&text);
            nodes.push(node);
            runs.push(TextRun::new(geometry, text));
        }
        (nodes, runs)
    }

    #[test]
    fn test_font_size_parsing() {
        assert_eq!(font_size_px("12px serif"), Some(12.0));
        assert_eq!(font_size_px("12.5px Times New Roman"), Some(12.5));
        assert_eq!(font_size_px("serif"), None);
        assert_eq!(font_size_px("0px serif"), None);
    }

    #[test]
    fn test_fixed_advance_width() {
        let mut metrics = FixedAdvanceMetrics::new(0.5);
        assert_eq!(metrics.measure("10px sans-serif", "abcd"), 20.0);
        assert_eq!(metrics.measure("10px sans-serif", ""), 0.0);
        assert_eq!(metrics.measure("sans-serif", "abcd"), 0.0);
    }

    #[test]
    fn test_scale_factor() {
        let transform = compute_transform(100.0, 50.0, TextDirection::Ltr).unwrap();
        assert_eq!(transform.scale_x, 2.0);
        assert_eq!(transform.rotate_deg, 0.0);
    }

    #[test]
    fn test_zero_width_is_unmeasurable() {
        assert_eq!(compute_transform(100.0, 0.0, TextDirection::Ltr), None);
        assert_eq!(compute_transform(100.0, f32::NAN, TextDirection::Ltr), None);
        assert_eq!(compute_transform(100.0, -3.0, TextDirection::Ltr), None);
    }

    #[test]
    fn test_non_finite_canvas_width_is_unmeasurable() {
        assert_eq!(compute_transform(f32::NAN, 50.0, TextDirection::Ltr), None);
        assert_eq!(compute_transform(f32::INFINITY, 50.0, TextDirection::Ltr), None);
        assert_eq!(compute_transform(f32::NEG_INFINITY, 50.0, TextDirection::Ttb), None);

        let (mut nodes, runs) = page(&[("abc", TextDirection::Ltr)], f32::NAN);
        let mut metrics = FixedAdvanceMetrics::default();
        let outcome = MetricsScaler::new(&mut metrics, 10).align(&mut nodes, &runs);

        assert_eq!(
            outcome,
            AlignOutcome::Completed(AlignmentStats { attached: 0, unmeasurable: 1, whitespace: 0 })
        );
        assert!(!nodes[0].is_attached());
    }

    #[test]
    fn test_vertical_run_is_rotated() {
        let transform = compute_transform(30.0, 60.0, TextDirection::Ttb).unwrap();
        assert_eq!(transform.rotate_deg, 90.0);
        assert_eq!(transform.scale_x, 0.5);
    }

    #[test]
    fn test_align_attaches_measured_runs() {
        // 10 chars * 0.5em * 10px = 50px natural, 100px painted.
        let (mut nodes, runs) = page(&[("abcdefghij", TextDirection::Ltr)], 100.0);
        let mut metrics = FixedAdvanceMetrics::new(0.5);

        let outcome = MetricsScaler::new(&mut metrics, 10).align(&mut nodes, &runs);

        assert_eq!(
            outcome,
            AlignOutcome::Completed(AlignmentStats { attached: 1, unmeasurable: 0, whitespace: 0 })
        );
        assert!(nodes[0].is_attached());
        assert_eq!(nodes[0].transform().map(|t| t.scale_x), Some(2.0));
    }

    #[test]
    fn test_align_skips_whitespace_and_zero_width() {
        let (mut nodes, runs) = page(
            &[
                ("visible", TextDirection::Ltr),
                ("   ", TextDirection::Ltr),
                ("\u{200B}", TextDirection::Ltr),
            ],
            40.0,
        );
        let mut measured = Vec::new();
        let mut metrics = |font: &str, text: &str| -> f32 {
            measured.push((font.to_string(), text.to_string()));
            if text == "\u{200B}" {
                0.0
            } else {
                20.0
            }
        };

        let outcome = MetricsScaler::new(&mut metrics, 10).align(&mut nodes, &runs);

        assert_eq!(
            outcome,
            AlignOutcome::Completed(AlignmentStats { attached: 1, unmeasurable: 1, whitespace: 1 })
        );
        assert!(nodes[0].is_attached());
        assert!(!nodes[1].is_attached());
        assert!(!nodes[2].is_attached());
        // Whitespace runs are never measured; the font matches the node style.
        assert_eq!(
            measured,
            vec![
                ("10px sans-serif".to_string(), "visible".to_string()),
                ("10px sans-serif".to_string(), "\u{200B}".to_string()),
            ]
        );
    }

    #[test]
    fn test_align_ceiling_attaches_nothing() {
        let (mut nodes, runs) = page(
            &[("a", TextDirection::Ltr), ("b", TextDirection::Ltr), ("c", TextDirection::Ltr)],
            10.0,
        );
        let mut metrics = FixedAdvanceMetrics::default();

        let outcome = MetricsScaler::new(&mut metrics, 2).align(&mut nodes, &runs);

        assert_eq!(outcome, AlignOutcome::TooManyRuns { runs: 3, limit: 2 });
        assert!(nodes.iter().all(|node| !node.is_attached()));
    }

    #[test]
    fn test_align_at_ceiling_still_runs() {
        let (mut nodes, runs) = page(&[("a", TextDirection::Ltr), ("b", TextDirection::Ltr)], 10.0);
        let mut metrics = FixedAdvanceMetrics::default();

        let outcome = MetricsScaler::new(&mut metrics, 2).align(&mut nodes, &runs);
        assert!(matches!(outcome, AlignOutcome::Completed(stats) if stats.attached == 2));
    }

    #[test]
    fn test_font_file_rejects_garbage() {
        assert!(FontFileMetrics::from_bytes(b"not a font".to_vec()).is_err());
    }

    // Test face: 1000 units/em; space 250, 'A' 600, 'B' 700, .notdef 500.
    const TEST_FONT: &[u8] = include_bytes!("../../../tests/fixtures/advances.ttf");

    #[test]
    fn test_font_file_measures_glyph_advances() {
        let mut metrics = FontFileMetrics::from_bytes(TEST_FONT.to_vec()).unwrap();
        assert_eq!(metrics.units_per_em(), 1000);
        assert_eq!(metrics.advance('A'), Some(600));
        assert_eq!(metrics.advance('z'), None);

        let face = ttf_parser::Face::parse(TEST_FONT, 0).unwrap();
        let units: u32 = "AB A"
            .chars()
            .map(|ch| {
                let glyph = face.glyph_index(ch).unwrap();
                u32::from(face.glyph_hor_advance(glyph).unwrap())
            })
            .sum();
        let expected = units as f32 * 12.0 / f32::from(face.units_per_em());

        let width = metrics.measure("12px serif", "AB A");
        assert!((width - expected).abs() < 1e-4);
        assert!((width - 25.8).abs() < 1e-4);
    }

    #[test]
    fn test_font_file_unmapped_char_measures_as_space() {
        let mut metrics = FontFileMetrics::from_bytes(TEST_FONT.to_vec()).unwrap();

        assert!((metrics.measure("10px serif", "Az") - 8.5).abs() < 1e-4);
        assert_eq!(metrics.measure("serif", "AB"), 0.0);
    }

    #[test]
    fn test_font_file_drives_alignment() {
        // "AB" at 10px is 13px wide; painted at 26px it stretches by 2.
        let (mut nodes, runs) = page(&[("AB", TextDirection::Ltr)], 26.0);
        let mut metrics = FontFileMetrics::from_bytes(TEST_FONT.to_vec()).unwrap();

        MetricsScaler::new(&mut metrics, 10).align(&mut nodes, &runs);

        let scale = nodes[0].transform().map(|t| t.scale_x).unwrap();
        assert!((scale - 2.0).abs() < 1e-5);
    }
}
