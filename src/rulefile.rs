//! Rule tables in TOML
//!
//! A rule list can live in a TOML file and load once per session:
//!
//! ```text
//! [[rule]]
//! pattern = '\b(let|fn|match)\b'
//! face = "Keyword"
//!
//! [[rule]]
//! pattern = 'fn\s+(\w+)'
//! group = 1
//!
//! [[rule]]
//! pattern = '\bTODO\b'
//!
//! [[rule.highlight]]
//! group = 0
//! face = "Warning"
//! override = "force"
//! ```
//!
//! Pre/post hooks and function matchers are code, not data; rule lists
//! needing them are built with [`RawRule`] values directly.

use std::fs;
use std::path::Path;

use toml::Value;

use crate::error::{AnnotateError, Result};
use crate::face::Face;
use crate::props::OverridePolicy;
use crate::rules::{FaceExpr, RawHighlight, RawMatcher, RawRule};

/// Load a rule table from a TOML file
pub fn load_rules(path: &Path) -> Result<Vec<RawRule>> {
    let contents = fs::read_to_string(path)?;
    parse_rules(&contents)
}

/// Parse a rule table from TOML text
pub fn parse_rules(source: &str) -> Result<Vec<RawRule>> {
    let table: toml::Table = source
        .parse()
        .map_err(|e| AnnotateError::InvalidRule(format!("rule file: {e}")))?;
    let Some(rules) = table.get("rule") else {
        return Ok(Vec::new());
    };
    as_array(rules, "rule")?.iter().map(parse_rule).collect()
}

fn parse_rule(value: &Value) -> Result<RawRule> {
    let table = value
        .as_table()
        .ok_or_else(|| invalid("rule entry must be a table"))?;
    let pattern =
        str_field(table, "pattern")?.ok_or_else(|| invalid("rule without a pattern"))?;
    let matcher = RawMatcher::Pattern(pattern.to_string());

    let mut highlights = Vec::new();
    if let Some(list) = table.get("highlight") {
        for h in as_array(list, "highlight")? {
            highlights.push(parse_highlight(h)?);
        }
    }
    if let Some(list) = table.get("anchored") {
        for a in as_array(list, "anchored")? {
            highlights.push(parse_anchored(a)?);
        }
    }
    if !highlights.is_empty() {
        return Ok(RawRule::Highlights(matcher, highlights));
    }

    let group = int_field(table, "group")?;
    let face = match str_field(table, "face")? {
        Some(name) => Some(parse_face(name)?),
        None => None,
    };
    let policy = match str_field(table, "override")? {
        Some(token) => Some(parse_policy(token)?),
        None => None,
    };
    let optional = bool_field(table, "optional")?;

    match (group, face, policy, optional) {
        (None, None, None, None) => Ok(RawRule::Matcher(matcher)),
        (Some(g), None, None, None) => Ok(RawRule::Group(matcher, g)),
        (None, Some(f), None, None) => Ok(RawRule::Face(matcher, f)),
        (g, Some(f), p, o) => Ok(RawRule::Highlight(
            matcher,
            RawHighlight::Match {
                group: g.unwrap_or(0),
                face: FaceExpr::Const(f),
                policy: p.unwrap_or_default(),
                optional: o.unwrap_or(false),
            },
        )),
        _ => Err(invalid("rule with \"override\" or \"optional\" must name a face")),
    }
}

fn parse_highlight(value: &Value) -> Result<RawHighlight> {
    let table = value
        .as_table()
        .ok_or_else(|| invalid("highlight entry must be a table"))?;
    let face = str_field(table, "face")?
        .ok_or_else(|| invalid("highlight without a face"))
        .and_then(parse_face)?;
    let policy = match str_field(table, "override")? {
        Some(token) => parse_policy(token)?,
        None => OverridePolicy::default(),
    };
    Ok(RawHighlight::Match {
        group: int_field(table, "group")?.unwrap_or(0),
        face: FaceExpr::Const(face),
        policy,
        optional: bool_field(table, "optional")?.unwrap_or(false),
    })
}

fn parse_anchored(value: &Value) -> Result<RawHighlight> {
    let table = value
        .as_table()
        .ok_or_else(|| invalid("anchored entry must be a table"))?;
    let pattern =
        str_field(table, "pattern")?.ok_or_else(|| invalid("anchored rule without a pattern"))?;
    let mut highlights = Vec::new();
    if let Some(list) = table.get("highlight") {
        for h in as_array(list, "highlight")? {
            highlights.push(parse_highlight(h)?);
        }
    }
    if let Some(list) = table.get("anchored") {
        for a in as_array(list, "anchored")? {
            highlights.push(parse_anchored(a)?);
        }
    }
    Ok(RawHighlight::Anchored {
        matcher: RawMatcher::Pattern(pattern.to_string()),
        pre: None,
        post: None,
        highlights,
    })
}

fn parse_face(name: &str) -> Result<Face> {
    Face::from_name(name).ok_or_else(|| invalid(&format!("unknown face {name:?}")))
}

fn parse_policy(token: &str) -> Result<OverridePolicy> {
    match token {
        "none" => Ok(OverridePolicy::NoOverride),
        "force" => Ok(OverridePolicy::Force),
        "keep" => Ok(OverridePolicy::Keep),
        "prepend" => Ok(OverridePolicy::Prepend),
        "append" => Ok(OverridePolicy::Append),
        _ => Err(invalid(&format!("unknown override token {token:?}"))),
    }
}

fn invalid(msg: &str) -> AnnotateError {
    AnnotateError::InvalidRule(msg.to_string())
}

fn as_array<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| invalid(&format!("\"{key}\" must be an array of tables")))
}

fn str_field<'a>(table: &'a toml::Table, key: &str) -> Result<Option<&'a str>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| invalid(&format!("\"{key}\" must be a string"))),
    }
}

fn int_field(table: &toml::Table, key: &str) -> Result<Option<usize>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => match v.as_integer() {
            Some(n) if n >= 0 => Ok(Some(n as usize)),
            _ => Err(invalid(&format!("\"{key}\" must be a non-negative integer"))),
        },
    }
}

fn bool_field(table: &toml::Table, key: &str) -> Result<Option<bool>> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| invalid(&format!("\"{key}\" must be a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_forms() {
        let rules = parse_rules(
            r#"
[[rule]]
pattern = '\bTODO\b'

[[rule]]
pattern = 'fn\s+(\w+)'
group = 1

[[rule]]
pattern = '\b\d+\b'
face = "Number"
"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 3);
        assert!(matches!(rules[0], RawRule::Matcher(_)));
        assert!(matches!(rules[1], RawRule::Group(_, 1)));
        assert!(matches!(rules[2], RawRule::Face(_, Face::Number)));
    }

    #[test]
    fn test_parse_full_highlight() {
        let rules = parse_rules(
            r#"
[[rule]]
pattern = '(\w+):'
group = 1
face = "Constant"
override = "keep"
optional = true
"#,
        )
        .unwrap();
        let RawRule::Highlight(_, RawHighlight::Match { group, policy, optional, .. }) = &rules[0]
        else {
            panic!("expected a single-highlight rule");
        };
        assert_eq!(*group, 1);
        assert_eq!(*policy, OverridePolicy::Keep);
        assert!(*optional);
    }

    #[test]
    fn test_parse_highlight_list() {
        let rules = parse_rules(
            r#"
[[rule]]
pattern = '(\w+)=(\w+)'

[[rule.highlight]]
group = 1
face = "Variable"

[[rule.highlight]]
group = 2
face = "Constant"
override = "append"
"#,
        )
        .unwrap();
        let RawRule::Highlights(_, highlights) = &rules[0] else {
            panic!("expected a highlight list");
        };
        assert_eq!(highlights.len(), 2);
    }

    #[test]
    fn test_parse_anchored_rules() {
        let rules = parse_rules(
            r#"
[[rule]]
pattern = '\bimport\b'

[[rule.highlight]]
group = 0
face = "Keyword"

[[rule.anchored]]
pattern = '\b\w+\b'

[[rule.anchored.highlight]]
group = 0
face = "Type"
"#,
        )
        .unwrap();
        let RawRule::Highlights(_, highlights) = &rules[0] else {
            panic!("expected a highlight list");
        };
        assert_eq!(highlights.len(), 2);
        assert!(matches!(highlights[1], RawHighlight::Anchored { .. }));
    }

    #[test]
    fn test_empty_table_is_empty_list() {
        assert!(parse_rules("").unwrap().is_empty());
    }

    #[test]
    fn test_bad_override_token() {
        let err = parse_rules(
            r#"
[[rule]]
pattern = 'x'
face = "Keyword"
override = "maybe"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidRule(_)));
    }

    #[test]
    fn test_unknown_face_name() {
        let err = parse_rules(
            r#"
[[rule]]
pattern = 'x'
face = "Sparkle"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidRule(_)));
    }

    #[test]
    fn test_missing_pattern() {
        let err = parse_rules(
            r#"
[[rule]]
face = "Keyword"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidRule(_)));
    }

    #[test]
    fn test_negative_group_rejected() {
        let err = parse_rules(
            r#"
[[rule]]
pattern = 'x'
group = -1
"#,
        )
        .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidRule(_)));
    }

    #[test]
    fn test_loaded_rules_compile() {
        use crate::compile::compile;
        use crate::config::AnnotationConfig;
        let rules = parse_rules(
            r#"
[[rule]]
pattern = '\b(if|else|while)\b'
face = "Keyword"

[[rule]]
pattern = '"[^"]*"'
face = "String"
override = "keep"
"#,
        )
        .unwrap();
        assert!(compile(&rules, &AnnotationConfig::default()).is_ok());
    }
}
