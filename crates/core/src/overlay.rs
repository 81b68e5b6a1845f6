//! Overlay nodes
//!
//! One positioned, styled node per text run. The node is a retained model that
//! any surface can present: a DOM, a canvas painter, or a terminal grid reads
//! its content segments, class, and transform.

use crate::run::{RunGeometry, RunText, TextDirection};
use serde::Serialize;
use std::fmt;

/// Which part of a match a highlight covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// Match contained in a single run
    Whole,
    /// First run of a multi-run match
    Begin,
    /// Run fully enclosed by a multi-run match
    Middle,
    /// Last run of a multi-run match
    End,
}

/// Style of a highlighted segment or node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HighlightStyle {
    pub kind: HighlightKind,
    pub selected: bool,
}

impl HighlightStyle {
    pub fn new(kind: HighlightKind, selected: bool) -> Self {
        Self { kind, selected }
    }

    /// Space-separated class list, e.g. `highlight begin selected`
    pub fn class_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HighlightStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("highlight")?;
        match self.kind {
            HighlightKind::Whole => {}
            HighlightKind::Begin => f.write_str(" begin")?,
            HighlightKind::Middle => f.write_str(" middle")?,
            HighlightKind::End => f.write_str(" end")?,
        }
        if self.selected {
            f.write_str(" selected")?;
        }
        Ok(())
    }
}

/// A piece of a node's displayed text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<HighlightStyle>,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn highlighted(text: impl Into<String>, style: HighlightStyle) -> Self {
        Self {
            text: text.into(),
            style: Some(style),
        }
    }
}

/// Writing direction of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingDirection {
    Ltr,
    Rtl,
}

impl From<TextDirection> for WritingDirection {
    fn from(direction: TextDirection) -> Self {
        // Vertical runs are rotated by their transform, not by direction.
        match direction {
            TextDirection::Rtl => WritingDirection::Rtl,
            TextDirection::Ltr | TextDirection::Ttb => WritingDirection::Ltr,
        }
    }
}

/// Transform aligning a node with the raster glyphs
///
/// Applied with the origin at the node's top-left corner: rotation first,
/// then a horizontal-only scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeTransform {
    pub scale_x: f32,
    pub rotate_deg: f32,
}

impl NodeTransform {
    /// CSS transform value, e.g. `rotate(90deg) scale(2, 1)`
    pub fn css(&self) -> String {
        if self.rotate_deg != 0.0 {
            format!("rotate({}deg) scale({}, 1)", self.rotate_deg, self.scale_x)
        } else {
            format!("scale({}, 1)", self.scale_x)
        }
    }
}

/// The overlay element for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayNode {
    pub left: f32,
    pub top: f32,
    pub font_size_px: f32,
    pub font_family: String,
    pub font_name: String,

    /// Painted width the node is stretched to
    pub canvas_width: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    dir: Option<WritingDirection>,
    whitespace: bool,
    content: Vec<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<HighlightStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transform: Option<NodeTransform>,
    attached: bool,
}

impl OverlayNode {
    /// Create an empty node positioned from run geometry
    pub fn from_geometry(geometry: &RunGeometry) -> Self {
        let font_height = geometry.font_height_px();
        Self {
            left: geometry.x,
            top: geometry.y - font_height,
            font_size_px: font_height,
            font_family: geometry.font_family.clone(),
            font_name: geometry.font_name.clone(),
            canvas_width: geometry.canvas_width_px(),
            dir: None,
            whitespace: false,
            content: Vec::new(),
            class: None,
            transform: None,
            attached: false,
        }
    }

    /// Font shorthand used both for styling and for measuring
    pub fn font(&self) -> String {
        format!("{}px {}", self.font_size_px, self.font_family)
    }

    /// Displayed text with all segments joined
    pub fn text_content(&self) -> String {
        self.content.iter().map(|segment| segment.text.as_str()).collect()
    }

    pub fn content(&self) -> &[Segment] {
        &self.content
    }

    /// Class of the whole node (set on runs enclosed by a match)
    pub fn class(&self) -> Option<HighlightStyle> {
        self.class
    }

    pub fn dir(&self) -> Option<WritingDirection> {
        self.dir
    }

    pub fn transform(&self) -> Option<NodeTransform> {
        self.transform
    }

    /// Whether the run has no visible characters
    pub fn is_whitespace(&self) -> bool {
        self.whitespace
    }

    /// Whether the node is part of the visible overlay
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether any part of the node is highlighted
    pub fn is_highlighted(&self) -> bool {
        self.class.is_some() || self.content.iter().any(|segment| segment.style.is_some())
    }

    /// Replace the content with unstyled text
    pub fn set_plain_text(&mut self, text: impl Into<String>) {
        self.content.clear();
        self.append_span(Segment::plain(text));
    }

    /// Replace the content with the given segments
    pub fn set_spans(&mut self, spans: impl IntoIterator<Item = Segment>) {
        self.content.clear();
        for span in spans {
            self.append_span(span);
        }
    }

    /// Append a segment; empty segments are dropped
    pub fn append_span(&mut self, segment: Segment) {
        if !segment.text.is_empty() {
            self.content.push(segment);
        }
    }

    pub fn set_class(&mut self, class: Option<HighlightStyle>) {
        self.class = class;
    }

    pub(crate) fn inject_text(&mut self, text: &RunText) {
        if text.is_whitespace() {
            self.whitespace = true;
            return;
        }
        self.set_plain_text(text.text.clone());
        self.dir = Some(WritingDirection::from(text.dir));
    }

    /// Finalize geometry; a node is aligned at most once
    pub(crate) fn attach(&mut self, transform: NodeTransform) {
        if self.transform.is_none() {
            self.transform = Some(transform);
            self.attached = true;
        }
    }

    /// Markup for HTML-like surfaces
    pub fn to_markup(&self) -> String {
        let mut markup = String::from("<div");
        if let Some(class) = self.class {
            markup.push_str(&format!(" class=\"{class}\""));
        }
        match self.dir {
            Some(WritingDirection::Ltr) => markup.push_str(" dir=\"ltr\""),
            Some(WritingDirection::Rtl) => markup.push_str(" dir=\"rtl\""),
            None => {}
        }
        markup.push('>');
        for segment in &self.content {
            match segment.style {
                Some(style) => markup.push_str(&format!(
                    "<span class=\"{style}\">{}</span>",
                    escape(&segment.text)
                )),
                None => markup.push_str(&escape(&segment.text)),
            }
        }
        markup.push_str("</div>");
        markup
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
