//! Engine configuration
//!
//! Settings are fixed at engine construction and immutable for the life
//! of the session; behavior toggles never live in ambient state.

use crate::face::Face;

/// Per-engine annotation settings
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Compile rule patterns case-insensitively
    pub case_insensitive: bool,
    /// Run only the syntactic pass (strings and comments)
    pub syntactic_only: bool,
    /// Face applied by rules that do not name one
    pub default_face: Face,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            syntactic_only: false,
            default_face: Face::Keyword,
        }
    }
}
