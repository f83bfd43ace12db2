//! Syntactic pass: string and comment faces from the tokenizer adapter
//!
//! Runs before the keyword pass and writes with `Force`: syntactic
//! classification always wins over stale data, while keyword rules may
//! still paint over it afterwards under their own policies.

use log::debug;

use crate::face::Face;
use crate::props::{Annotations, OverridePolicy, PropKey, PropValue};
use crate::region::{line_begin, next_line_begin, Region};
use crate::scan::{SpanKind, Tokenize};

/// Annotate strings and comments over `region`
///
/// A construct straddling the region boundary is annotated in full, so
/// the returned end may exceed the requested one; the caller folds it
/// into the covered range. Terminates on unterminated constructs because
/// the adapter classifies them to the end of the document.
pub(crate) fn annotate_syntax(
    text: &str,
    region: Region,
    scanner: &mut dyn Tokenize,
    anns: &mut Annotations,
) -> usize {
    let mut pos = region.begin;
    let mut max_end = region.end;

    while pos < region.end && pos < text.len() {
        let c = scanner.classify_at(text, pos);
        let span = Region::new(c.start, c.end);
        match c.kind {
            SpanKind::Code => {}
            SpanKind::Str => {
                apply_face(anns, span, Face::Str);
                mark_if_multiline(text, anns, span);
                max_end = max_end.max(span.end);
            }
            SpanKind::Comment => {
                apply_face(anns, span, Face::Comment);
                // Delimiter sub-spans get their own face on top
                if c.open_len > 0 {
                    apply_face(
                        anns,
                        Region::new(span.begin, span.begin + c.open_len),
                        Face::CommentDelimiter,
                    );
                }
                if c.close_len > 0 {
                    apply_face(
                        anns,
                        Region::new(span.end - c.close_len, span.end),
                        Face::CommentDelimiter,
                    );
                }
                mark_if_multiline(text, anns, span);
                max_end = max_end.max(span.end);
            }
        }
        // The adapter always reports spans ending past their start, but
        // never let a degenerate answer stall the walk
        pos = c.end.max(pos + 1);
    }

    debug!(
        "syntactic pass over {}..{} reached {}",
        region.begin, region.end, max_end
    );
    max_end
}

fn apply_face(anns: &mut Annotations, region: Region, face: Face) {
    anns.apply(
        region,
        PropKey::Face,
        Some(PropValue::Face(face)),
        OverridePolicy::Force,
    );
}

/// Mark a span whose extent crosses a line boundary, together with the
/// line it started on
pub(crate) fn mark_if_multiline(text: &str, anns: &mut Annotations, span: Region) {
    if span.end > next_line_begin(text, span.begin) {
        anns.set_multiline(Region::new(line_begin(text, span.begin), span.end));
    }
}
