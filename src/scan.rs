//! Tokenizer adapter: syntactic classification of strings and comments
//!
//! The syntactic pass asks one question of the document's lexical model:
//! what construct is position P inside, and since where. The [`Tokenize`]
//! trait is that contract; [`DelimiterScanner`] implements it from a
//! delimiter table, caching resumable checkpoints per line.

use crate::region::{floor_char_boundary, line_begin, line_end};

/// Syntactic classification of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Ordinary code
    Code,
    /// Inside a string literal
    Str,
    /// Inside a comment
    Comment,
}

/// A classified span `[start, end)`, with delimiter widths when known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// What the span is
    pub kind: SpanKind,
    /// Start of the span (inclusive)
    pub start: usize,
    /// End of the span (exclusive)
    pub end: usize,
    /// Byte width of the opening delimiter at `start`, 0 if none
    pub open_len: usize,
    /// Byte width of the closing delimiter ending at `end`, 0 if none
    pub close_len: usize,
}

impl Classification {
    fn code(start: usize, end: usize) -> Self {
        Self {
            kind: SpanKind::Code,
            start,
            end,
            open_len: 0,
            close_len: 0,
        }
    }
}

/// Contract between the syntactic pass and the document's lexical model
pub trait Tokenize {
    /// Classify the span containing `offset`
    ///
    /// Deterministic given the document content: resumes from a cached
    /// checkpoint at or before `offset`, or from the document start.
    fn classify_at(&mut self, text: &str, offset: usize) -> Classification;

    /// Drop cached state for the line containing `offset` and beyond
    ///
    /// Entries are removed outright, never flagged; a later `classify_at`
    /// recomputes them from the surviving prefix.
    fn invalidate_from(&mut self, text: &str, offset: usize);
}

/// Delimiter table describing one language's strings and comments
#[derive(Debug, Clone, Default)]
pub struct SyntaxSpec {
    /// Token opening a to-end-of-line comment
    pub line_comment: Option<String>,
    /// Tokens opening and closing a block comment
    pub block_comment: Option<(String, String)>,
    /// Characters that both open and close a string
    pub string_delims: Vec<char>,
    /// Escape character honored inside strings
    pub escape: Option<char>,
}

impl SyntaxSpec {
    /// An empty table: everything classifies as code
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Line,
    Block,
    Str(char),
}

#[derive(Debug, Clone, Copy)]
struct Opener {
    kind: OpenKind,
    start: usize,
    token_len: usize,
}

/// Built-in [`Tokenize`] implementation driven by a [`SyntaxSpec`]
///
/// Caches line-start positions known to lie outside any string or
/// comment; classification scans forward from the nearest one.
#[derive(Debug)]
pub struct DelimiterScanner {
    spec: SyntaxSpec,
    /// Sorted line starts verified to be in ordinary code; always holds 0
    checkpoints: Vec<usize>,
}

impl DelimiterScanner {
    /// Create a scanner for one delimiter table
    pub fn new(spec: SyntaxSpec) -> Self {
        Self {
            spec,
            checkpoints: vec![0],
        }
    }

    /// Nearest checkpoint at or before `offset`
    fn seed(&self, offset: usize) -> usize {
        match self.checkpoints.binary_search(&offset) {
            Ok(i) => self.checkpoints[i],
            Err(0) => 0,
            Err(i) => self.checkpoints[i - 1],
        }
    }

    /// Record line starts in `(from, to]` as in-code checkpoints
    fn record_checkpoints(&mut self, text: &str, from: usize, to: usize) {
        let mut last = *self.checkpoints.last().unwrap_or(&0);
        if to <= last {
            return;
        }
        let mut p = from.max(last);
        while let Some(i) = text[p..to].find('\n') {
            let start = p + i + 1;
            if start > last && start <= to {
                self.checkpoints.push(start);
                last = start;
            }
            p = start;
        }
    }

    /// Earliest string or comment opener at or after `from`
    fn next_opener(&self, text: &str, from: usize) -> Option<Opener> {
        let hay = &text[from..];
        let mut best: Option<Opener> = None;
        let mut consider = |cand: Opener| {
            if best.map_or(true, |b| cand.start < b.start) {
                best = Some(cand);
            }
        };
        if let Some(lc) = self.spec.line_comment.as_ref().filter(|t| !t.is_empty()) {
            if let Some(i) = hay.find(lc.as_str()) {
                consider(Opener {
                    kind: OpenKind::Line,
                    start: from + i,
                    token_len: lc.len(),
                });
            }
        }
        if let Some((open, _)) = self.spec.block_comment.as_ref().filter(|(o, _)| !o.is_empty()) {
            if let Some(i) = hay.find(open.as_str()) {
                consider(Opener {
                    kind: OpenKind::Block,
                    start: from + i,
                    token_len: open.len(),
                });
            }
        }
        for (i, ch) in hay.char_indices() {
            if self.spec.string_delims.contains(&ch) {
                consider(Opener {
                    kind: OpenKind::Str(ch),
                    start: from + i,
                    token_len: ch.len_utf8(),
                });
                break;
            }
        }
        best
    }

    /// Read the full extent of the construct starting at `op`
    ///
    /// Unterminated constructs classify to the end of the document.
    fn read_construct(&self, text: &str, op: &Opener) -> Classification {
        let body = op.start + op.token_len;
        match op.kind {
            OpenKind::Line => Classification {
                kind: SpanKind::Comment,
                start: op.start,
                end: line_end(text, op.start),
                open_len: op.token_len,
                close_len: 0,
            },
            OpenKind::Block => {
                let close = self.spec.block_comment.as_ref().map(|(_, c)| c.as_str());
                let (end, close_len) = match close.and_then(|c| {
                    text[body..].find(c).map(|i| (body + i + c.len(), c.len()))
                }) {
                    Some(found) => found,
                    None => (text.len(), 0),
                };
                Classification {
                    kind: SpanKind::Comment,
                    start: op.start,
                    end,
                    open_len: op.token_len,
                    close_len,
                }
            }
            OpenKind::Str(delim) => {
                let mut end = text.len();
                let mut close_len = 0;
                let mut skip = false;
                for (i, ch) in text[body..].char_indices() {
                    if skip {
                        skip = false;
                        continue;
                    }
                    if self.spec.escape == Some(ch) {
                        skip = true;
                        continue;
                    }
                    if ch == delim {
                        end = body + i + ch.len_utf8();
                        close_len = ch.len_utf8();
                        break;
                    }
                }
                Classification {
                    kind: SpanKind::Str,
                    start: op.start,
                    end,
                    open_len: op.token_len,
                    close_len,
                }
            }
        }
    }
}

impl Tokenize for DelimiterScanner {
    fn classify_at(&mut self, text: &str, offset: usize) -> Classification {
        let len = text.len();
        if offset >= len {
            return Classification::code(len, len);
        }
        let offset = floor_char_boundary(text, offset);
        let mut cursor = self.seed(offset);
        loop {
            let Some(op) = self.next_opener(text, cursor) else {
                self.record_checkpoints(text, cursor, len);
                return Classification::code(cursor, len);
            };
            if offset < op.start {
                self.record_checkpoints(text, cursor, op.start);
                return Classification::code(cursor, op.start);
            }
            self.record_checkpoints(text, cursor, op.start);
            let construct = self.read_construct(text, &op);
            if offset < construct.end {
                return construct;
            }
            cursor = construct.end;
        }
    }

    fn invalidate_from(&mut self, text: &str, offset: usize) {
        let lb = line_begin(text, offset.min(text.len()));
        self.checkpoints.retain(|&p| p <= lb);
        if self.checkpoints.is_empty() {
            self.checkpoints.push(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_like() -> DelimiterScanner {
        DelimiterScanner::new(SyntaxSpec {
            line_comment: Some("//".to_string()),
            block_comment: Some(("/*".to_string(), "*/".to_string())),
            string_delims: vec!['"'],
            escape: Some('\\'),
        })
    }

    #[test]
    fn test_code_span() {
        let mut scanner = c_like();
        let text = "let x = 1;";
        let c = scanner.classify_at(text, 4);
        assert_eq!(c.kind, SpanKind::Code);
        assert_eq!((c.start, c.end), (0, text.len()));
    }

    #[test]
    fn test_line_comment_span() {
        let mut scanner = c_like();
        let text = "code // note\nmore";
        let c = scanner.classify_at(text, 8);
        assert_eq!(c.kind, SpanKind::Comment);
        assert_eq!((c.start, c.end), (5, 12));
        assert_eq!(c.open_len, 2);
        assert_eq!(c.close_len, 0);
        // The next line is code again
        let c = scanner.classify_at(text, 14);
        assert_eq!(c.kind, SpanKind::Code);
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let mut scanner = c_like();
        let text = "a /* one\ntwo */ b";
        let c = scanner.classify_at(text, 10);
        assert_eq!(c.kind, SpanKind::Comment);
        assert_eq!((c.start, c.end), (2, 15));
        assert_eq!(c.open_len, 2);
        assert_eq!(c.close_len, 2);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut scanner = c_like();
        let text = "a /* never closed";
        let c = scanner.classify_at(text, 5);
        assert_eq!(c.kind, SpanKind::Comment);
        assert_eq!(c.end, text.len());
        assert_eq!(c.close_len, 0);
    }

    #[test]
    fn test_string_with_escapes() {
        let mut scanner = c_like();
        let text = r#"x = "a\"b" + 1"#;
        let c = scanner.classify_at(text, 6);
        assert_eq!(c.kind, SpanKind::Str);
        assert_eq!((c.start, c.end), (4, 10));
        // The escaped quote did not end the string
        let c = scanner.classify_at(text, 8);
        assert_eq!(c.kind, SpanKind::Str);
    }

    #[test]
    fn test_string_spans_lines() {
        let mut scanner = c_like();
        let text = "a = \"line1\nline2\"";
        let c = scanner.classify_at(text, 6);
        assert_eq!(c.kind, SpanKind::Str);
        assert_eq!((c.start, c.end), (4, 17));
    }

    #[test]
    fn test_delimiters_inside_comment_ignored() {
        let mut scanner = c_like();
        let text = "/* \" not a string */ \"real\"";
        let c = scanner.classify_at(text, 4);
        assert_eq!(c.kind, SpanKind::Comment);
        assert_eq!((c.start, c.end), (0, 20));
        let c = scanner.classify_at(text, 22);
        assert_eq!(c.kind, SpanKind::Str);
        assert_eq!((c.start, c.end), (21, 27));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let mut scanner = c_like();
        let text = "a\nb /* c\nd */ e \"s\" f";
        let first = scanner.classify_at(text, 10);
        let again = scanner.classify_at(text, 10);
        assert_eq!(first, again);
    }

    #[test]
    fn test_invalidate_reflects_new_text() {
        let mut scanner = c_like();
        let old = "code\ncode\n\"str\"";
        // Warm the checkpoint cache past the edit point
        let c = scanner.classify_at(old, 12);
        assert_eq!(c.kind, SpanKind::Str);
        // Open a block comment on line one and invalidate from there
        let new = "co/* \ncode\n\"str\"";
        scanner.invalidate_from(new, 2);
        let c = scanner.classify_at(new, 12);
        assert_eq!(c.kind, SpanKind::Comment);
        assert_eq!(c.start, 2);
        assert_eq!(c.end, new.len());
    }

    #[test]
    fn test_empty_spec_is_all_code() {
        let mut scanner = DelimiterScanner::new(SyntaxSpec::new());
        let text = "\"quotes\" // and comments";
        let c = scanner.classify_at(text, 3);
        assert_eq!(c.kind, SpanKind::Code);
        assert_eq!((c.start, c.end), (0, text.len()));
    }
}
