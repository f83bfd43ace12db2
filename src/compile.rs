//! Rule compilation: normalize raw rule entries into an executable set
//!
//! Compilation happens once per engine and rule list; the result is
//! immutable, structurally comparable, and shareable across documents
//! using the same rules.

use regex::RegexBuilder;

use crate::config::AnnotationConfig;
use crate::error::{AnnotateError, Result};
use crate::rules::{
    AnchoredRule, CompiledRule, HighlightSpec, MatchHighlight, Matcher, RawHighlight, RawMatcher,
    RawRule,
};

/// An ordered, immutable set of compiled rules
#[derive(Debug, Default, PartialEq)]
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    /// The rules, in apply order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Number of rules in the set
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check whether the set has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compile a raw rule list into an executable rule set
///
/// Fails with [`AnnotateError::InvalidRule`] on a malformed pattern or a
/// highlight referencing a capture group the pattern cannot produce.
/// Compiling the same list twice yields structurally equal sets.
pub fn compile(rules: &[RawRule], config: &AnnotationConfig) -> Result<CompiledRuleSet> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        compiled.push(compile_rule(rule, config)?);
    }
    Ok(CompiledRuleSet { rules: compiled })
}

fn compile_rule(rule: &RawRule, config: &AnnotationConfig) -> Result<CompiledRule> {
    let (raw_matcher, highlights) = match rule {
        // Bare matcher: whole match, default face
        RawRule::Matcher(m) => (
            m,
            vec![RawHighlight::simple(0, config.default_face)],
        ),
        // Single numbered group, default face
        RawRule::Group(m, group) => (
            m,
            vec![RawHighlight::simple(*group, config.default_face)],
        ),
        // Single face value for the whole match
        RawRule::Face(m, face) => (m, vec![RawHighlight::simple(0, *face)]),
        // A single highlight tuple, used directly
        RawRule::Highlight(m, h) => (m, vec![h.clone()]),
        // A highlight list, used verbatim
        RawRule::Highlights(m, hs) => (m, hs.clone()),
    };
    let matcher = compile_matcher(raw_matcher, config)?;
    let highlights = compile_highlights(&matcher, &highlights, config)?;
    Ok(CompiledRule {
        matcher,
        highlights,
    })
}

fn compile_matcher(raw: &RawMatcher, config: &AnnotationConfig) -> Result<Matcher> {
    match raw {
        RawMatcher::Pattern(pattern) => {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(config.case_insensitive)
                .build()
                .map_err(|e| AnnotateError::InvalidRule(format!("pattern {pattern:?}: {e}")))?;
            Ok(Matcher::Pattern(re))
        }
        RawMatcher::Func(f) => Ok(Matcher::Func(f.clone())),
    }
}

fn compile_highlights(
    matcher: &Matcher,
    raw: &[RawHighlight],
    config: &AnnotationConfig,
) -> Result<Vec<HighlightSpec>> {
    raw.iter()
        .map(|h| compile_highlight(matcher, h, config))
        .collect()
}

fn compile_highlight(
    matcher: &Matcher,
    raw: &RawHighlight,
    config: &AnnotationConfig,
) -> Result<HighlightSpec> {
    match raw {
        RawHighlight::Match {
            group,
            face,
            policy,
            optional,
        } => {
            check_group(matcher, *group)?;
            Ok(HighlightSpec::Match(MatchHighlight {
                group: *group,
                face: face.clone(),
                policy: *policy,
                optional: *optional,
            }))
        }
        RawHighlight::Anchored {
            matcher: sub,
            pre,
            post,
            highlights,
        } => {
            let sub = compile_matcher(sub, config)?;
            let highlights = compile_highlights(&sub, highlights, config)?;
            Ok(HighlightSpec::Anchored(AnchoredRule {
                matcher: sub,
                pre: pre.clone(),
                post: post.clone(),
                highlights,
            }))
        }
    }
}

/// Validate a group reference against what the matcher can produce
///
/// Only pattern matchers expose a static capture count; function matchers
/// are checked at match time instead.
fn check_group(matcher: &Matcher, group: usize) -> Result<()> {
    if let Matcher::Pattern(re) = matcher {
        if group >= re.captures_len() {
            return Err(AnnotateError::InvalidRule(format!(
                "pattern {:?} has no capture group {group}",
                re.as_str()
            )));
        }
    }
    Ok(())
}
