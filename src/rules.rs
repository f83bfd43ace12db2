//! Rule types: matchers, highlights, and the raw forms handed to the compiler
//!
//! A rule pairs a matcher (a compiled regex or a search callable) with one
//! or more highlights saying which match group gets which face, under which
//! merge policy. Anchored sub-rules nest: their highlight lists may contain
//! further anchored rules, each re-searching within a limit derived from
//! the level above.

use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::face::Face;
use crate::props::OverridePolicy;

/// Absolute byte spans for one match, indexed by capture group
///
/// Index 0 is the whole match; groups that did not participate are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchSpans {
    /// Per-group `(start, end)` byte spans
    pub groups: Vec<Option<(usize, usize)>>,
}

impl MatchSpans {
    /// Build from regex captures (spans are already absolute, since the
    /// search runs over a prefix slice of the document)
    pub fn from_captures(caps: &regex::Captures) -> Self {
        Self {
            groups: caps
                .iter()
                .map(|m| m.map(|m| (m.start(), m.end())))
                .collect(),
        }
    }

    /// The whole-match span
    pub fn whole(&self) -> Option<(usize, usize)> {
        self.groups.first().copied().flatten()
    }

    /// The span of group `idx`, if it participated
    pub fn group(&self, idx: usize) -> Option<(usize, usize)> {
        self.groups.get(idx).copied().flatten()
    }
}

/// Context handed to computed face expressions at match time
pub struct MatchContext<'a> {
    /// The document text
    pub text: &'a str,
    /// Group spans of the current match
    pub spans: &'a MatchSpans,
}

/// A face plus optional auxiliary key/value properties
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBinding {
    /// The face to apply
    pub face: Face,
    /// Extra properties applied over the same span
    pub extras: Vec<(String, String)>,
}

impl FaceBinding {
    /// Binding of a bare face with no extras
    pub fn face(face: Face) -> Self {
        Self {
            face,
            extras: Vec::new(),
        }
    }
}

/// Signature for computed face expressions
pub type FaceFn = Rc<dyn Fn(&MatchContext) -> Option<FaceBinding>>;

/// A face given literally, or computed at match time
///
/// Computed expressions run when a match is being highlighted, never at
/// compile time, and may return nothing to leave the range untouched.
#[derive(Clone)]
pub enum FaceExpr {
    /// A literal face
    Const(Face),
    /// A value computed per match (may read the text)
    Eval(FaceFn),
}

impl FaceExpr {
    /// Resolve to a binding for the current match
    pub fn resolve(&self, ctx: &MatchContext) -> Option<FaceBinding> {
        match self {
            FaceExpr::Const(face) => Some(FaceBinding::face(*face)),
            FaceExpr::Eval(f) => f(ctx),
        }
    }
}

impl fmt::Debug for FaceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceExpr::Const(face) => write!(f, "Const({})", face.name()),
            FaceExpr::Eval(_) => write!(f, "Eval(..)"),
        }
    }
}

impl PartialEq for FaceExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FaceExpr::Const(a), FaceExpr::Const(b)) => a == b,
            (FaceExpr::Eval(a), FaceExpr::Eval(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Signature for function matchers: given `(text, start, limit)`, report
/// the next match ending at or before `limit`, with regex group semantics
pub type MatchFn = Rc<dyn Fn(&str, usize, usize) -> Option<MatchSpans>>;

/// Either a compiled regular expression or a search callable
#[derive(Clone)]
pub enum Matcher {
    /// A compiled regex
    Pattern(Regex),
    /// A custom search function
    Func(MatchFn),
}

impl Matcher {
    /// Search `text` from `start`; the match must end at or before `limit`
    ///
    /// `limit` must lie on a char boundary. Bounding works by searching a
    /// prefix slice, so lookbehind-style context before `start` is kept.
    pub fn search(&self, text: &str, start: usize, limit: usize) -> Option<MatchSpans> {
        let limit = limit.min(text.len());
        if start > limit {
            return None;
        }
        match self {
            Matcher::Pattern(re) => re
                .captures_at(&text[..limit], start)
                .map(|caps| MatchSpans::from_captures(&caps)),
            Matcher::Func(f) => f(text, start, limit),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Pattern(re) => write!(f, "Pattern({:?})", re.as_str()),
            Matcher::Func(_) => write!(f, "Func(..)"),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Matcher::Pattern(a), Matcher::Pattern(b)) => a.as_str() == b.as_str(),
            (Matcher::Func(a), Matcher::Func(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Paint `group`'s span with `face` under `policy`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchHighlight {
    /// Capture group to paint (0 = whole match)
    pub group: usize,
    /// Face to apply, literal or computed
    pub face: FaceExpr,
    /// How the face combines with whatever is already there
    pub policy: OverridePolicy,
    /// Silently skip when the group did not participate
    pub optional: bool,
}

impl MatchHighlight {
    /// Highlight `group` with a literal face under `NoOverride`
    pub fn new(group: usize, face: Face) -> Self {
        Self {
            group,
            face: FaceExpr::Const(face),
            policy: OverridePolicy::NoOverride,
            optional: false,
        }
    }
}

/// Hook run before or after an anchored sub-search
///
/// Receives `(text, anchor_end)`; a `pre` hook may return a search limit,
/// a `post` hook may return a position to resume the parent search from.
pub type AnchorHook = Rc<dyn Fn(&str, usize) -> Option<usize>>;

/// A sub-rule searched repeatedly within a limit derived from its anchor
#[derive(Clone)]
pub struct AnchoredRule {
    /// The nested matcher
    pub matcher: Matcher,
    /// Runs once before the nested loop; its value can extend the limit
    pub pre: Option<AnchorHook>,
    /// Runs once after the nested loop exits
    pub post: Option<AnchorHook>,
    /// Highlights for each nested match (may nest further anchored rules)
    pub highlights: Vec<HighlightSpec>,
}

impl fmt::Debug for AnchoredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchoredRule")
            .field("matcher", &self.matcher)
            .field("pre", &self.pre.as_ref().map(|_| ".."))
            .field("post", &self.post.as_ref().map(|_| ".."))
            .field("highlights", &self.highlights)
            .finish()
    }
}

impl PartialEq for AnchoredRule {
    fn eq(&self, other: &Self) -> bool {
        self.matcher == other.matcher
            && hook_eq(&self.pre, &other.pre)
            && hook_eq(&self.post, &other.post)
            && self.highlights == other.highlights
    }
}

fn hook_eq(a: &Option<AnchorHook>, b: &Option<AnchorHook>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// A highlight slot: paint one group, or run an anchored sub-rule
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightSpec {
    /// Paint a match group
    Match(MatchHighlight),
    /// Run an anchored sub-search
    Anchored(AnchoredRule),
}

/// One compiled rule: a matcher plus what to paint for each match
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// The matcher searched over the pass range
    pub matcher: Matcher,
    /// What each match highlights
    pub highlights: Vec<HighlightSpec>,
}

/// A matcher as supplied by the user, before compilation
#[derive(Clone)]
pub enum RawMatcher {
    /// A regex pattern source string
    Pattern(String),
    /// A custom search function, used as-is
    Func(MatchFn),
}

impl fmt::Debug for RawMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawMatcher::Pattern(p) => write!(f, "Pattern({p:?})"),
            RawMatcher::Func(_) => write!(f, "Func(..)"),
        }
    }
}

/// A user-level highlight, before compilation
#[derive(Clone)]
pub enum RawHighlight {
    /// Paint a match group
    Match {
        /// Capture group to paint
        group: usize,
        /// Face to apply
        face: FaceExpr,
        /// Merge policy
        policy: OverridePolicy,
        /// Skip silently when the group is absent from a match
        optional: bool,
    },
    /// An anchored sub-rule
    Anchored {
        /// The nested matcher
        matcher: RawMatcher,
        /// Pre-search hook
        pre: Option<AnchorHook>,
        /// Post-search hook
        post: Option<AnchorHook>,
        /// Nested highlights
        highlights: Vec<RawHighlight>,
    },
}

impl fmt::Debug for RawHighlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawHighlight::Match {
                group,
                face,
                policy,
                optional,
            } => f
                .debug_struct("Match")
                .field("group", group)
                .field("face", face)
                .field("policy", policy)
                .field("optional", optional)
                .finish(),
            RawHighlight::Anchored {
                matcher,
                pre,
                post,
                highlights,
            } => f
                .debug_struct("Anchored")
                .field("matcher", matcher)
                .field("pre", &pre.as_ref().map(|_| ".."))
                .field("post", &post.as_ref().map(|_| ".."))
                .field("highlights", highlights)
                .finish(),
        }
    }
}

impl RawHighlight {
    /// Highlight `group` with a literal face under `NoOverride`
    pub fn simple(group: usize, face: Face) -> Self {
        RawHighlight::Match {
            group,
            face: FaceExpr::Const(face),
            policy: OverridePolicy::NoOverride,
            optional: false,
        }
    }
}

/// A user-level rule entry
///
/// The compiler normalizes all five forms into [`CompiledRule`]s with a
/// uniform matcher-plus-highlights shape.
#[derive(Debug, Clone)]
pub enum RawRule {
    /// Bare matcher: whole match, default face
    Matcher(RawMatcher),
    /// Matcher plus a single numbered group, default face
    Group(RawMatcher, usize),
    /// Matcher plus a face for the whole match
    Face(RawMatcher, Face),
    /// Matcher plus a single highlight, used directly
    Highlight(RawMatcher, RawHighlight),
    /// Matcher plus a highlight list, used verbatim
    Highlights(RawMatcher, Vec<RawHighlight>),
}

impl RawRule {
    /// Bare pattern rule: whole match, default face
    pub fn pattern(pattern: &str) -> Self {
        RawRule::Matcher(RawMatcher::Pattern(pattern.to_string()))
    }

    /// Pattern rule with a face for the whole match
    pub fn faced(pattern: &str, face: Face) -> Self {
        RawRule::Face(RawMatcher::Pattern(pattern.to_string()), face)
    }
}

/// Where rules come from: a static list, or a deferred expression
///
/// A deferred source is evaluated at most once per engine, lazily, the
/// first time the rules are needed.
pub enum RuleSource {
    /// A static rule list
    List(Vec<RawRule>),
    /// A rule list produced on first use (named/lazy reference)
    Deferred(Box<dyn Fn() -> Vec<RawRule>>),
}

impl fmt::Debug for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::List(rules) => f.debug_tuple("List").field(&rules.len()).finish(),
            RuleSource::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_search_bounded() {
        let re = Regex::new(r"\bfoo\b").unwrap();
        let m = Matcher::Pattern(re);
        let text = "foo bar foo";
        let spans = m.search(text, 0, text.len()).unwrap();
        assert_eq!(spans.whole(), Some((0, 3)));
        let spans = m.search(text, 1, text.len()).unwrap();
        assert_eq!(spans.whole(), Some((8, 11)));
        // A limit before the second occurrence hides it
        assert!(m.search(text, 1, 9).is_none());
    }

    #[test]
    fn test_optional_groups_absent() {
        let re = Regex::new(r"(a)(b)?").unwrap();
        let m = Matcher::Pattern(re);
        let spans = m.search("ac", 0, 2).unwrap();
        assert_eq!(spans.group(1), Some((0, 1)));
        assert_eq!(spans.group(2), None);
        assert_eq!(spans.group(9), None);
    }

    #[test]
    fn test_func_matcher() {
        let f: MatchFn = Rc::new(|text: &str, start: usize, limit: usize| {
            let i = text[start..limit].find('x')? + start;
            Some(MatchSpans {
                groups: vec![Some((i, i + 1))],
            })
        });
        let m = Matcher::Func(f);
        let spans = m.search("aaxbb", 0, 5).unwrap();
        assert_eq!(spans.whole(), Some((2, 3)));
        assert!(m.search("aaxbb", 0, 2).is_none());
    }

    #[test]
    fn test_matcher_equality_by_source() {
        let a = Matcher::Pattern(Regex::new(r"\d+").unwrap());
        let b = Matcher::Pattern(Regex::new(r"\d+").unwrap());
        let c = Matcher::Pattern(Regex::new(r"\w+").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_face_expr_resolve() {
        let spans = MatchSpans {
            groups: vec![Some((0, 3))],
        };
        let ctx = MatchContext {
            text: "foo",
            spans: &spans,
        };
        let constant = FaceExpr::Const(Face::Keyword);
        assert_eq!(constant.resolve(&ctx), Some(FaceBinding::face(Face::Keyword)));

        let computed = FaceExpr::Eval(Rc::new(|ctx: &MatchContext| {
            let (s, e) = ctx.spans.whole()?;
            if &ctx.text[s..e] == "foo" {
                Some(FaceBinding::face(Face::Warning))
            } else {
                None
            }
        }));
        assert_eq!(computed.resolve(&ctx), Some(FaceBinding::face(Face::Warning)));
    }
}
