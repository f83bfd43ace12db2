//! Error types for the annotation engine

use thiserror::Error;

/// Result type alias for annotation operations
pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Annotation engine error types
#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Highlight group {group} did not participate in the match")]
    NoMatchGroup { group: usize },

    #[error("Invalid region {begin}..{end}")]
    InvalidRegion { begin: usize, end: usize },
}
