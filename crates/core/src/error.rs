//! Error types for the text layer

/// Errors from fallible text layer setup (configuration, fonts)
#[derive(Debug, thiserror::Error)]
pub enum TextLayerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("font parse error: {0}")]
    Font(#[from] ttf_parser::FaceParsingError),
}

pub type TextLayerResult<T> = Result<T, TextLayerError>;

/// An inconsistency between match offsets and the page's run lengths
///
/// These are reported and logged, never fatal: the mapped position is clamped
/// so the rest of the page still renders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingIssue {
    #[error("match {match_index}: offset {offset} lies beyond the page text ({total_chars} chars)")]
    OffsetBeyondText {
        match_index: usize,
        offset: usize,
        total_chars: usize,
    },

    #[error("match {match_index}: offset {offset} precedes the previous match")]
    OutOfOrder { match_index: usize, offset: usize },

    #[error("match {match_index}: page has no text runs")]
    NoRuns { match_index: usize },
}
