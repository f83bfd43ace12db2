//! Keyword pass: rule-driven face application over a region
//!
//! Rules run in list order; a later rule paints over an earlier one only
//! when its own merge policy allows. Anchored sub-rules are walked with an
//! explicit work stack, so rule nesting never grows the call stack.

use log::{trace, warn};

use crate::compile::CompiledRuleSet;
use crate::error::{AnnotateError, Result};
use crate::props::{Annotations, PropKey, PropValue};
use crate::region::{ceil_char_boundary, line_end, Region};
use crate::rules::{AnchoredRule, CompiledRule, HighlightSpec, MatchContext, MatchHighlight, MatchSpans};
use crate::syntactic::mark_if_multiline;

/// What a keyword pass actually did
#[derive(Debug)]
pub(crate) struct PassReport {
    /// Furthest position painted, at least the requested end
    pub end: usize,
    /// First contained error; already reported via the log
    pub error: Option<AnnotateError>,
}

/// Run every rule of `rules` over `region`
///
/// A `NoMatchGroup` raised by one rule aborts that rule's remaining
/// search but leaves its earlier applications and all other rules
/// untouched; the first such error lands in the report.
pub(crate) fn annotate_keywords(
    text: &str,
    region: Region,
    rules: &CompiledRuleSet,
    anns: &mut Annotations,
) -> PassReport {
    let mut max_end = region.end;
    let mut first_error = None;
    for (idx, rule) in rules.rules().iter().enumerate() {
        if let Err(e) = run_rule(text, region, rule, anns, &mut max_end) {
            warn!("keyword rule {idx} aborted: {e}");
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    PassReport {
        end: max_end,
        error: first_error,
    }
}

fn run_rule(
    text: &str,
    region: Region,
    rule: &CompiledRule,
    anns: &mut Annotations,
    max_end: &mut usize,
) -> Result<()> {
    let limit = ceil_char_boundary(text, region.end.min(text.len()));
    let mut pos = region.begin;
    while pos < limit {
        let Some(m) = rule.matcher.search(text, pos, limit) else {
            break;
        };
        let Some((m_start, m_end)) = m.whole() else {
            break;
        };
        mark_if_multiline(text, anns, Region::new(m_start, m_end));
        let resume = apply_highlights(text, &m, &rule.highlights, anns, max_end)?;
        // Post hooks may reposition the parent search, never before the
        // match end; an empty match still advances at least one char
        let next = resume.unwrap_or(m_end).max(m_end);
        pos = if next > pos { next } else { bump(text, pos) };
    }
    Ok(())
}

/// Next char boundary strictly after `pos`
fn bump(text: &str, pos: usize) -> usize {
    ceil_char_boundary(text, pos + 1).max(pos + 1)
}

/// One unit of pending work while walking a highlight tree
enum Entry<'r> {
    /// Paint highlights `list[next..]` using `spans`
    Specs {
        list: &'r [HighlightSpec],
        next: usize,
        spans: MatchSpans,
    },
    /// An anchored sub-search in progress
    Search {
        rule: &'r AnchoredRule,
        cursor: usize,
        limit: usize,
        anchor_end: usize,
    },
}

enum Action<'r> {
    None,
    Pop,
    StartAnchor(&'r AnchoredRule, usize),
    SubMatch(&'r AnchoredRule, MatchSpans),
    FinishAnchor(&'r AnchoredRule, usize),
}

/// Apply a match's highlight tree, returning a resume position when a
/// post hook repositioned the top-level search
fn apply_highlights<'r>(
    text: &str,
    top: &MatchSpans,
    highlights: &'r [HighlightSpec],
    anns: &mut Annotations,
    max_end: &mut usize,
) -> Result<Option<usize>> {
    let mut resume = None;
    let mut stack: Vec<Entry<'r>> = vec![Entry::Specs {
        list: highlights,
        next: 0,
        spans: top.clone(),
    }];

    while let Some(entry) = stack.last_mut() {
        let action = {
            match entry {
                Entry::Specs { list, next, spans } => {
                    // Copy the shared slice ref out so extracted sub-rule
                    // refs outlive this borrow of the stack
                    let list: &'r [HighlightSpec] = *list;
                    if *next >= list.len() {
                        Action::Pop
                    } else {
                        let spec: &'r HighlightSpec = &list[*next];
                        *next += 1;
                        match spec {
                            HighlightSpec::Match(h) => {
                                paint(text, anns, h, spans, max_end)?;
                                Action::None
                            }
                            HighlightSpec::Anchored(a) => match spans.whole() {
                                Some((_, point)) => Action::StartAnchor(a, point),
                                None => Action::None,
                            },
                        }
                    }
                }
                Entry::Search {
                    rule,
                    cursor,
                    limit,
                    anchor_end,
                } => {
                    let rule: &'r AnchoredRule = *rule;
                    match rule.matcher.search(text, *cursor, *limit) {
                        Some(m) => match m.whole() {
                            Some((_, me)) => {
                                *cursor = if me > *cursor { me } else { bump(text, *cursor) };
                                Action::SubMatch(rule, m)
                            }
                            None => Action::FinishAnchor(rule, *anchor_end),
                        },
                        None => Action::FinishAnchor(rule, *anchor_end),
                    }
                }
            }
        };

        match action {
            Action::None => {}
            Action::Pop => {
                stack.pop();
            }
            Action::StartAnchor(rule, point) => {
                let limit = anchor_limit(text, rule, point);
                // A limit reaching into later lines makes the whole
                // anchor range multi-line-sensitive
                mark_if_multiline(text, anns, Region::new(point, limit));
                stack.push(Entry::Search {
                    rule,
                    cursor: point,
                    limit,
                    anchor_end: point,
                });
            }
            Action::SubMatch(rule, m) => {
                if let Some((ms, me)) = m.whole() {
                    mark_if_multiline(text, anns, Region::new(ms, me));
                }
                stack.push(Entry::Specs {
                    list: &rule.highlights,
                    next: 0,
                    spans: m,
                });
            }
            Action::FinishAnchor(rule, anchor_end) => {
                stack.pop();
                if let Some(post) = &rule.post {
                    if let Some(p) = post(text, anchor_end) {
                        let p = p.max(anchor_end).min(text.len());
                        let outer = stack.iter_mut().rev().find_map(|e| match e {
                            Entry::Search {
                                cursor, anchor_end, ..
                            } => Some((cursor, *anchor_end)),
                            _ => None,
                        });
                        match outer {
                            Some((cursor, outer_anchor)) => *cursor = p.max(outer_anchor),
                            None => resume = Some(p),
                        }
                    }
                }
            }
        }
    }

    Ok(resume)
}

/// Search limit for an anchored sub-rule: the pre hook's value when it
/// points past the anchor, otherwise the end of the anchor's line
fn anchor_limit(text: &str, rule: &AnchoredRule, point: usize) -> usize {
    let default = line_end(text, point);
    match &rule.pre {
        Some(pre) => match pre(text, point) {
            Some(p) if p > point => ceil_char_boundary(text, p.min(text.len())),
            _ => default,
        },
        None => default,
    }
}

/// Paint one highlight from the current match
fn paint(
    text: &str,
    anns: &mut Annotations,
    h: &MatchHighlight,
    spans: &MatchSpans,
    max_end: &mut usize,
) -> Result<()> {
    let Some((s, e)) = spans.group(h.group) else {
        if h.optional {
            return Ok(());
        }
        return Err(AnnotateError::NoMatchGroup { group: h.group });
    };
    let region = Region::new(s, e);
    let ctx = MatchContext { text, spans };
    match h.face.resolve(&ctx) {
        Some(binding) => {
            trace!("face {} over {s}..{e}", binding.face.name());
            anns.apply(
                region,
                PropKey::Face,
                Some(PropValue::Face(binding.face)),
                h.policy,
            );
            for (key, value) in binding.extras {
                anns.apply(region, PropKey::Aux(key), Some(PropValue::Text(value)), h.policy);
            }
            *max_end = (*max_end).max(e);
        }
        None => {
            // An absent computed value preserves the gap; the merge
            // engine encodes that rule
            anns.apply(region, PropKey::Face, None, h.policy);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::compile::compile;
    use crate::config::AnnotationConfig;
    use crate::face::Face;
    use crate::props::OverridePolicy;
    use crate::rules::{FaceExpr, MatchFn, RawHighlight, RawMatcher, RawRule};

    fn compiled(rules: Vec<RawRule>) -> CompiledRuleSet {
        compile(&rules, &AnnotationConfig::default()).unwrap()
    }

    fn face_at(anns: &Annotations, pos: usize) -> Option<Face> {
        match anns.face_at(pos) {
            Some(PropValue::Face(f)) => Some(*f),
            _ => None,
        }
    }

    fn run(text: &str, rules: Vec<RawRule>) -> (Annotations, PassReport) {
        let set = compiled(rules);
        let mut anns = Annotations::new();
        let report = annotate_keywords(text, Region::new(0, text.len()), &set, &mut anns);
        (anns, report)
    }

    #[test]
    fn test_simple_rule_both_occurrences() {
        let text = "foo bar foo";
        let (anns, report) = run(text, vec![RawRule::faced(r"\bfoo\b", Face::Keyword)]);
        assert!(report.error.is_none());
        for pos in 0..3 {
            assert_eq!(face_at(&anns, pos), Some(Face::Keyword));
        }
        for pos in 3..8 {
            assert_eq!(face_at(&anns, pos), None);
        }
        for pos in 8..11 {
            assert_eq!(face_at(&anns, pos), Some(Face::Keyword));
        }
    }

    #[test]
    fn test_empty_match_terminates() {
        let text = "abc";
        // Matches zero-width at every position
        let (_, report) = run(text, vec![RawRule::faced(r"x*", Face::Warning)]);
        assert!(report.error.is_none());
        assert_eq!(report.end, text.len());
    }

    #[test]
    fn test_rule_order_and_policies() {
        let text = "target";
        // First rule paints with NoOverride, second forces over it
        let (anns, _) = run(
            text,
            vec![
                RawRule::faced(r"target", Face::Variable),
                RawRule::Highlight(
                    RawMatcher::Pattern(r"target".into()),
                    RawHighlight::Match {
                        group: 0,
                        face: FaceExpr::Const(Face::Warning),
                        policy: OverridePolicy::Force,
                        optional: false,
                    },
                ),
            ],
        );
        assert_eq!(face_at(&anns, 0), Some(Face::Warning));

        // With NoOverride the second rule loses
        let (anns, _) = run(
            text,
            vec![
                RawRule::faced(r"target", Face::Variable),
                RawRule::faced(r"target", Face::Warning),
            ],
        );
        assert_eq!(face_at(&anns, 0), Some(Face::Variable));
    }

    #[test]
    fn test_missing_group_not_optional_is_error() {
        let text = "aaa b aaa";
        let rule = RawRule::Highlights(
            RawMatcher::Pattern(r"(a+)|(b)".into()),
            vec![RawHighlight::Match {
                group: 2,
                face: FaceExpr::Const(Face::Constant),
                policy: OverridePolicy::NoOverride,
                optional: false,
            }],
        );
        let (anns, report) = run(text, vec![rule]);
        // The first match has no group 2: the rule aborts right there
        assert!(matches!(
            report.error,
            Some(AnnotateError::NoMatchGroup { group: 2 })
        ));
        assert!(anns.is_empty());
    }

    #[test]
    fn test_missing_group_optional_skipped() {
        let text = "aaa b aaa";
        let rule = RawRule::Highlights(
            RawMatcher::Pattern(r"(a+)|(b)".into()),
            vec![
                RawHighlight::Match {
                    group: 1,
                    face: FaceExpr::Const(Face::Variable),
                    policy: OverridePolicy::NoOverride,
                    optional: true,
                },
                RawHighlight::Match {
                    group: 2,
                    face: FaceExpr::Const(Face::Constant),
                    policy: OverridePolicy::NoOverride,
                    optional: true,
                },
            ],
        );
        let (anns, report) = run(text, vec![rule]);
        assert!(report.error.is_none());
        assert_eq!(face_at(&anns, 0), Some(Face::Variable));
        assert_eq!(face_at(&anns, 4), Some(Face::Constant));
        assert_eq!(face_at(&anns, 6), Some(Face::Variable));
    }

    #[test]
    fn test_anchored_items_until_line_end() {
        let text = "anchor item item\nanchor item";
        let rule = RawRule::Highlights(
            RawMatcher::Pattern(r"\banchor\b".into()),
            vec![
                RawHighlight::simple(0, Face::Keyword),
                RawHighlight::Anchored {
                    matcher: RawMatcher::Pattern(r"\bitem\b".into()),
                    pre: None,
                    post: None,
                    highlights: vec![RawHighlight::simple(0, Face::Variable)],
                },
            ],
        );
        let (anns, report) = run(text, vec![rule]);
        assert!(report.error.is_none());
        // Both anchors
        assert_eq!(face_at(&anns, 0), Some(Face::Keyword));
        assert_eq!(face_at(&anns, 17), Some(Face::Keyword));
        // Items on line one
        assert_eq!(face_at(&anns, 7), Some(Face::Variable));
        assert_eq!(face_at(&anns, 12), Some(Face::Variable));
        // Item on line two
        assert_eq!(face_at(&anns, 24), Some(Face::Variable));
        // Nothing bleeds onto the space between
        assert_eq!(face_at(&anns, 6), None);
    }

    #[test]
    fn test_anchored_pre_extends_limit_and_marks() {
        let text = "head one\ntwo three";
        let pre: crate::rules::AnchorHook = Rc::new(|text: &str, _point: usize| Some(text.len()));
        let rule = RawRule::Highlights(
            RawMatcher::Pattern(r"\bhead\b".into()),
            vec![RawHighlight::Anchored {
                matcher: RawMatcher::Pattern(r"\b\w+\b".into()),
                pre: Some(pre),
                post: None,
                highlights: vec![RawHighlight::simple(0, Face::Constant)],
            }],
        );
        let (anns, report) = run(text, vec![rule]);
        assert!(report.error.is_none());
        // The extended limit lets the sub-rule reach line two
        assert_eq!(face_at(&anns, 10), Some(Face::Constant));
        assert_eq!(face_at(&anns, 14), Some(Face::Constant));
        // And the anchor range is marked multi-line-sensitive
        assert!(anns.mark_extent_at(5).is_some());
    }

    #[test]
    fn test_computed_face_and_absent_value() {
        let text = "ok BAD ok";
        let face_fn = FaceExpr::Eval(Rc::new(|ctx: &MatchContext| {
            let (s, e) = ctx.spans.whole()?;
            if ctx.text[s..e].chars().all(|c| c.is_uppercase()) {
                Some(crate::rules::FaceBinding::face(Face::Warning))
            } else {
                None
            }
        }));
        let rule = RawRule::Highlight(
            RawMatcher::Pattern(r"\b\w+\b".into()),
            RawHighlight::Match {
                group: 0,
                face: face_fn,
                policy: OverridePolicy::NoOverride,
                optional: false,
            },
        );
        let (anns, report) = run(text, vec![rule]);
        assert!(report.error.is_none());
        assert_eq!(face_at(&anns, 0), None);
        assert_eq!(face_at(&anns, 3), Some(Face::Warning));
        assert_eq!(face_at(&anns, 7), None);
    }

    #[test]
    fn test_function_matcher_rule() {
        let text = "one TWO three";
        let finder: MatchFn = Rc::new(|text: &str, start: usize, limit: usize| {
            let hay = &text[start..limit];
            let rel = hay.find(|c: char| c.is_uppercase())?;
            let s = start + rel;
            let e = text[s..limit]
                .find(|c: char| !c.is_uppercase())
                .map(|i| s + i)
                .unwrap_or(limit);
            Some(MatchSpans {
                groups: vec![Some((s, e))],
            })
        });
        let rule = RawRule::Face(RawMatcher::Func(finder), Face::Constant);
        let (anns, report) = run(text, vec![rule]);
        assert!(report.error.is_none());
        assert_eq!(face_at(&anns, 4), Some(Face::Constant));
        assert_eq!(face_at(&anns, 6), Some(Face::Constant));
        assert_eq!(face_at(&anns, 8), None);
    }

    #[test]
    fn test_multiline_match_sets_mark() {
        let text = "begin\nend";
        let rule = RawRule::faced(r"(?s)begin.end", Face::Type);
        let (anns, _) = run(text, vec![rule]);
        assert_eq!(anns.mark_extent_at(2), Some(Region::new(0, 9)));
    }

    #[test]
    fn test_search_respects_region_begin() {
        let text = "foo foo";
        let set = compiled(vec![RawRule::faced(r"foo", Face::Keyword)]);
        let mut anns = Annotations::new();
        annotate_keywords(text, Region::new(4, text.len()), &set, &mut anns);
        assert_eq!(face_at(&anns, 0), None);
        assert_eq!(face_at(&anns, 4), Some(Face::Keyword));
    }
}
