//! Region arithmetic and the widening policy applied before annotation
//!
//! All offsets are byte offsets into UTF-8 text. The widening policy
//! guarantees that a pass never sees a fragment of something a previous
//! pass determined must be read as a unit.

use crate::props::Annotations;

/// A half-open byte range `[begin, end)` into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Start offset (inclusive)
    pub begin: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Region {
    /// Create a new region
    pub fn new(begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    /// Length of the region in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.begin)
    }

    /// Check if the region is empty
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// Check if this region contains a byte position
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.begin && pos < self.end
    }

    /// Check if this region overlaps another
    pub fn overlaps(&self, other: Region) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// Smallest region covering both `self` and `other`
    pub fn merge(&self, other: Region) -> Region {
        Region::new(self.begin.min(other.begin), self.end.max(other.end))
    }
}

/// Find the nearest valid UTF-8 char boundary at or before `pos`
pub fn floor_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Find the nearest valid UTF-8 char boundary at or after `pos`
pub fn ceil_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p < text.len() && !text.is_char_boundary(p) {
        p += 1;
    }
    p
}

/// Byte offset of the start of the line containing `pos`
pub fn line_begin(text: &str, pos: usize) -> usize {
    let pos = floor_char_boundary(text, pos);
    match text[..pos].rfind('\n') {
        Some(i) => i + 1,
        None => 0,
    }
}

/// Byte offset of the end of the line containing `pos`, excluding the newline
pub fn line_end(text: &str, pos: usize) -> usize {
    let pos = floor_char_boundary(text, pos);
    match text[pos..].find('\n') {
        Some(i) => pos + i,
        None => text.len(),
    }
}

/// Byte offset of the start of the line after the one containing `pos`
pub fn next_line_begin(text: &str, pos: usize) -> usize {
    let e = line_end(text, pos);
    if e < text.len() {
        e + 1
    } else {
        text.len()
    }
}

/// Widen `[begin, end)` for annotation: whole lines, and outward past any
/// range marked as multi-line-sensitive
///
/// Runs the widening rules to a fixpoint, since pulling a boundary over a
/// marked range can expose a new partial line, and vice versa.
pub fn extend_region(text: &str, anns: &Annotations, begin: usize, end: usize) -> Region {
    let len = text.len();
    let mut b = floor_char_boundary(text, begin.min(len));
    let mut e = ceil_char_boundary(text, end.min(len)).max(b);

    loop {
        let (ob, oe) = (b, e);

        // Snap both boundaries outward to whole lines. An empty request
        // still covers the full line it sits on.
        b = line_begin(text, b);
        e = next_line_begin(text, if e > b { e - 1 } else { e });

        // A marked range just before the start pulls the start back
        if b > 0 {
            if let Some(m) = anns.mark_extent_at(b - 1) {
                if m.begin < b {
                    b = m.begin;
                }
            }
        }

        // A marked range at the last byte pushes the end forward
        if e > b {
            if let Some(m) = anns.mark_extent_at(e - 1) {
                if m.end > e {
                    e = m.end;
                }
            }
        }

        if b == ob && e == oe {
            break;
        }
    }

    Region::new(b, e)
}
