//! faceted - an incremental face-annotation engine
//!
//! Given an evolving document and a declarative rule list, this crate
//! maintains a mapping from byte ranges to display attributes ("faces")
//! that stays correct, and minimally disturbed, as the document is
//! edited. It provides:
//! - A rule compiler normalizing user-level rule forms into one shape
//! - A two-pass annotator: syntactic (strings/comments) then keywords
//! - A merge engine combining new faces with existing ones per policy
//! - A widening policy so multi-line constructs never get half-annotated
//! - An incremental controller turning edits into minimal re-annotation
//!
//! The document itself stays outside: its text is passed to `annotate`
//! calls, and edits arrive through [`Engine::notify_edit`]. Rendering,
//! concrete colors, and scheduling of on-screen work are likewise the
//! caller's business.

mod compile;
mod config;
mod engine;
mod error;
mod face;
mod keywords;
mod props;
mod region;
mod rulefile;
mod rules;
mod scan;
mod syntactic;

pub use compile::{compile, CompiledRuleSet};
pub use config::AnnotationConfig;
pub use engine::Engine;
pub use error::{AnnotateError, Result};
pub use face::Face;
pub use props::{Annotations, OverridePolicy, PropKey, PropSpan, PropValue};
pub use region::{extend_region, line_begin, line_end, next_line_begin, Region};
pub use rulefile::{load_rules, parse_rules};
pub use rules::{
    AnchorHook, AnchoredRule, CompiledRule, FaceBinding, FaceExpr, FaceFn, HighlightSpec,
    MatchContext, MatchFn, MatchHighlight, MatchSpans, Matcher, RawHighlight, RawMatcher, RawRule,
    RuleSource,
};
pub use scan::{Classification, DelimiterScanner, SpanKind, SyntaxSpec, Tokenize};
