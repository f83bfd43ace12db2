//! Face identifiers for annotated text
//!
//! A face names a display attribute class (comment, string, keyword...)
//! without carrying concrete colors or styles. The presentation layer
//! maps face names to whatever visual attributes it likes.

/// Semantic face identifiers attached to text ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// Comment bodies
    Comment,
    /// Comment opening/closing delimiters
    CommentDelimiter,
    /// String literals
    Str,
    /// Documentation comments and strings
    Doc,
    /// Language keywords
    Keyword,
    /// Type names
    Type,
    /// Function names
    Function,
    /// Variable names
    Variable,
    /// Constants and enum variants
    Constant,
    /// Numeric literals
    Number,
    /// Preprocessor directives
    Preprocessor,
    /// Suspicious or dangerous constructs
    Warning,
    /// Plain text (no special display)
    Default,
}

impl Face {
    /// Get a human-readable name for this face
    pub fn name(&self) -> &'static str {
        match self {
            Face::Comment => "Comment",
            Face::CommentDelimiter => "CommentDelimiter",
            Face::Str => "String",
            Face::Doc => "Doc",
            Face::Keyword => "Keyword",
            Face::Type => "Type",
            Face::Function => "Function",
            Face::Variable => "Variable",
            Face::Constant => "Constant",
            Face::Number => "Number",
            Face::Preprocessor => "Preprocessor",
            Face::Warning => "Warning",
            Face::Default => "Default",
        }
    }

    /// Parse a face from a string name (for TOML rule files)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Comment" => Some(Face::Comment),
            "CommentDelimiter" => Some(Face::CommentDelimiter),
            "String" => Some(Face::Str),
            "Doc" => Some(Face::Doc),
            "Keyword" => Some(Face::Keyword),
            "Type" => Some(Face::Type),
            "Function" => Some(Face::Function),
            "Variable" => Some(Face::Variable),
            "Constant" => Some(Face::Constant),
            "Number" => Some(Face::Number),
            "Preprocessor" => Some(Face::Preprocessor),
            "Warning" => Some(Face::Warning),
            "Default" => Some(Face::Default),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_roundtrip() {
        let faces = [
            Face::Comment,
            Face::CommentDelimiter,
            Face::Str,
            Face::Keyword,
            Face::Default,
        ];
        for face in faces {
            assert_eq!(Face::from_name(face.name()), Some(face));
        }
    }

    #[test]
    fn test_from_name_invalid() {
        assert_eq!(Face::from_name("NoSuchFace"), None);
        assert_eq!(Face::from_name(""), None);
    }
}
