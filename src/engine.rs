//! The incremental annotation controller
//!
//! Owns the annotation layer and the compiled rules for one document and
//! coordinates the passes: an edit notification flags a dirty range, the
//! next `annotate` call widens it, clears stale properties, runs the
//! syntactic pass and then the keyword pass, and reports what it covered.
//! Everything is single-threaded; a caller that wants to chunk work may
//! annotate any subrange and the engine still converges to clean.

use std::rc::Rc;

use log::{debug, warn};

use crate::compile::{compile, CompiledRuleSet};
use crate::config::AnnotationConfig;
use crate::error::{AnnotateError, Result};
use crate::keywords;
use crate::props::{Annotations, PropKey, PropSpan, PropValue};
use crate::region::{ceil_char_boundary, extend_region, Region};
use crate::rules::RuleSource;
use crate::scan::{DelimiterScanner, SyntaxSpec, Tokenize};
use crate::syntactic;

/// Incremental annotation engine for one document
pub struct Engine {
    config: AnnotationConfig,
    /// Deferred rule source, pending its one-time resolution
    source: Option<RuleSource>,
    compiled: Option<Rc<CompiledRuleSet>>,
    /// A broken rule set turns the keyword pass off; the syntactic pass
    /// keeps running
    compile_failed: bool,
    scanner: Box<dyn Tokenize>,
    anns: Annotations,
    dirty: Option<Region>,
}

impl Engine {
    /// Create an engine using the built-in delimiter scanner
    ///
    /// A static rule list compiles immediately, so a malformed rule
    /// surfaces here; a deferred source resolves on first use instead.
    pub fn new(rules: RuleSource, syntax: SyntaxSpec, config: AnnotationConfig) -> Result<Self> {
        Self::with_tokenizer(rules, Box::new(DelimiterScanner::new(syntax)), config)
    }

    /// Create an engine with a caller-supplied tokenizer adapter
    pub fn with_tokenizer(
        rules: RuleSource,
        tokenizer: Box<dyn Tokenize>,
        config: AnnotationConfig,
    ) -> Result<Self> {
        let mut engine = Self {
            config,
            source: None,
            compiled: None,
            compile_failed: false,
            scanner: tokenizer,
            anns: Annotations::new(),
            dirty: None,
        };
        engine.set_rules(rules)?;
        Ok(engine)
    }

    /// Create an engine sharing an already compiled rule set
    ///
    /// Compiled sets are immutable, so several documents using the same
    /// rule list can share one.
    pub fn with_compiled(
        rules: Rc<CompiledRuleSet>,
        syntax: SyntaxSpec,
        config: AnnotationConfig,
    ) -> Self {
        Self {
            config,
            source: None,
            compiled: Some(rules),
            compile_failed: false,
            scanner: Box::new(DelimiterScanner::new(syntax)),
            anns: Annotations::new(),
            dirty: None,
        }
    }

    /// The compiled rule set, once available
    pub fn compiled_rules(&self) -> Option<Rc<CompiledRuleSet>> {
        self.compiled.clone()
    }

    /// Replace the rule list; existing annotations become stale and the
    /// caller should re-annotate
    pub fn set_rules(&mut self, rules: RuleSource) -> Result<()> {
        self.compiled = None;
        self.source = None;
        self.compile_failed = false;
        match rules {
            RuleSource::List(list) => {
                self.compiled = Some(Rc::new(compile(&list, &self.config)?));
            }
            deferred @ RuleSource::Deferred(_) => self.source = Some(deferred),
        }
        Ok(())
    }

    /// Resolve and compile a deferred rule source, exactly once
    fn ensure_rules(&mut self) -> Result<()> {
        if self.compiled.is_some() || self.compile_failed {
            return Ok(());
        }
        let Some(RuleSource::Deferred(make)) = self.source.take() else {
            return Ok(());
        };
        let list = make();
        match compile(&list, &self.config) {
            Ok(set) => {
                self.compiled = Some(Rc::new(set));
                Ok(())
            }
            Err(e) => {
                warn!("rule compilation failed, keyword pass disabled: {e}");
                self.compile_failed = true;
                Err(e)
            }
        }
    }

    /// Record an edit: `old_len` bytes at `begin` became `[begin, end)`
    ///
    /// `text` is the document content after the edit. Annotations shift,
    /// the tokenizer cache is invalidated from the edit's line, and the
    /// dirty range grows by one character past `end` (unless the edit
    /// already touches the end of the document) to catch consequences of
    /// deleting or inserting at a line's start.
    pub fn notify_edit(&mut self, text: &str, begin: usize, end: usize, old_len: usize) {
        let len = text.len();
        let begin = begin.min(len);
        let end = end.clamp(begin, len);

        // A previously pending range refers to pre-edit offsets
        if let Some(d) = self.dirty {
            self.dirty = Some(Region::new(
                shift_pos(d.begin, begin, end, old_len),
                shift_pos(d.end, begin, end, old_len),
            ));
        }
        self.anns.shift(begin, end, old_len);
        self.scanner.invalidate_from(text, begin);

        let wide_end = if end < len {
            ceil_char_boundary(text, end + 1)
        } else {
            end
        };
        let edited = Region::new(begin, wide_end.max(begin));
        self.dirty = Some(match self.dirty {
            Some(d) => d.merge(edited),
            None => edited,
        });
        debug!(
            "edit {begin}..{end} (replaced {old_len}); dirty {:?}",
            self.dirty
        );
    }

    /// Re-annotate at least `[begin, end)`, returning the covered range
    ///
    /// The range widens per the extension policy, stale properties in
    /// the widened range are cleared, and the two passes run in order
    /// (the keyword pass is skipped in syntactic-only mode or after a
    /// failed compilation). Annotating the same unchanged range twice
    /// yields identical annotations.
    pub fn annotate(&mut self, text: &str, begin: usize, end: usize) -> Result<Region> {
        if begin > end || end > text.len() {
            return Err(AnnotateError::InvalidRegion { begin, end });
        }
        self.ensure_rules()?;

        let region = extend_region(text, &self.anns, begin, end);
        debug!(
            "annotate {begin}..{end} widened to {}..{}",
            region.begin, region.end
        );
        self.anns.clear_region(region);

        let mut covered_end =
            syntactic::annotate_syntax(text, region, self.scanner.as_mut(), &mut self.anns);

        if !self.config.syntactic_only && !self.compile_failed {
            if let Some(rules) = self.compiled.clone() {
                if !rules.is_empty() {
                    let report = keywords::annotate_keywords(text, region, &rules, &mut self.anns);
                    covered_end = covered_end.max(report.end);
                }
            }
        }

        // Only the widened region saw both passes; a construct tail the
        // syntactic pass overran is marked multi-line-sensitive, so any
        // remaining dirty part of it widens back over the whole construct
        self.consume_dirty(region);
        Ok(Region::new(region.begin, covered_end))
    }

    /// Annotate whatever is pending, returning the covered range
    ///
    /// This is the scheduler entry point; `Ok(None)` means already clean.
    pub fn annotate_pending(&mut self, text: &str) -> Result<Option<Region>> {
        let Some(d) = self.dirty else {
            return Ok(None);
        };
        let len = text.len();
        let begin = d.begin.min(len);
        let end = d.end.min(len).max(begin);
        self.annotate(text, begin, end).map(Some)
    }

    /// Check whether no re-annotation is pending
    pub fn is_clean(&self) -> bool {
        self.dirty.is_none()
    }

    /// The range still waiting for re-annotation, if any
    pub fn dirty_region(&self) -> Option<Region> {
        self.dirty
    }

    /// The face value at `pos`, if any
    pub fn face_at(&self, pos: usize) -> Option<&PropValue> {
        self.anns.face_at(pos)
    }

    /// Face spans overlapping `region`, clipped to it
    pub fn faces_in(&self, region: Region) -> Vec<PropSpan> {
        self.anns.spans_in(region, &PropKey::Face)
    }

    /// The value of an arbitrary property at `pos`
    pub fn property_at(&self, pos: usize, key: &PropKey) -> Option<&PropValue> {
        self.anns.get_at(pos, key)
    }

    /// Extent of the multi-line-sensitive range covering `pos`, if any
    ///
    /// Exposed so an external scheduler can widen its own boundaries.
    pub fn multiline_extent(&self, pos: usize) -> Option<Region> {
        self.anns.mark_extent_at(pos)
    }

    /// Direct read access to the annotation layer
    pub fn annotations(&self) -> &Annotations {
        &self.anns
    }

    /// Drop the covered part of the dirty range
    fn consume_dirty(&mut self, covered: Region) {
        let Some(d) = self.dirty else {
            return;
        };
        self.dirty = if covered.begin <= d.begin && covered.end >= d.end {
            None
        } else if covered.begin <= d.begin && covered.end > d.begin {
            Some(Region::new(covered.end, d.end.max(covered.end)))
        } else if covered.end >= d.end && covered.begin < d.end {
            Some(Region::new(d.begin, covered.begin.max(d.begin)))
        } else {
            Some(d)
        };
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("compiled", &self.compiled.as_ref().map(|c| c.len()))
            .field("compile_failed", &self.compile_failed)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Map a pre-edit offset to its post-edit position
fn shift_pos(p: usize, begin: usize, end: usize, old_len: usize) -> usize {
    let new_len = end.saturating_sub(begin);
    if p <= begin {
        p
    } else if p >= begin + old_len {
        p - old_len + new_len
    } else {
        begin
    }
}
