//! Pipe-separated text form of filter rules.
//!
//! Each fragment is `[prefix:]name[:count]` where the prefix is `o`
//! (operator) or `p` (property) and the count is `min,max` or a single value
//! used for both bounds. Property names may list the operators allowed on
//! them in brackets: `name/givenName[eq,startswith]:1,2`.

use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use super::count::NodeCount;
use crate::error::RuleFormatError;

/// Names treated as operators when a fragment has no prefix.
pub const OPERATOR_VOCABULARY: [&str; 17] = [
    "not",
    "and",
    "or",
    "eq",
    "ne",
    "gt",
    "ge",
    "lt",
    "le",
    "in",
    "has",
    "startswith",
    "endswith",
    "contains",
    "substringof",
    "any",
    "all",
];

fn count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]*,?[0-9]*$").expect("count pattern is valid"))
}

/// Whitespace inside a count is ignored, so `1 , 2` reads as `1,2`.
fn looks_like_count(text: &str) -> bool {
    let compact: String = text.split_whitespace().collect();
    count_pattern().is_match(&compact)
}

/// What a rule fragment constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    /// Operator or function name.
    Operator,
    /// Property path.
    Property,
}

/// One parsed fragment of rule text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRule {
    /// Operator or property.
    pub kind: RuleKind,
    /// Operator name or property path, without any bracket list.
    pub name: String,
    /// Declared bounds; unconstrained when the fragment has no count.
    pub count: NodeCount,
    /// Operators listed in brackets after a property name.
    pub operators: Vec<String>,
}

/// Splits rule text on `|` and parses every non-blank fragment.
pub fn parse_text(input: &str) -> Result<Vec<TextRule>, RuleFormatError> {
    input
        .split('|')
        .filter(|fragment| !fragment.trim().is_empty())
        .map(parse_fragment)
        .collect()
}

/// Parses a single `[prefix:]name[:count]` fragment.
pub fn parse_fragment(fragment: &str) -> Result<TextRule, RuleFormatError> {
    let fragment = fragment.trim();
    let parts: Vec<&str> = fragment.split(':').map(str::trim).collect();
    let (prefix, name, count) = match parts.as_slice() {
        [prefix, name, count, ..] => (Some(*prefix), *name, Some(*count)),
        [name, count] if looks_like_count(count) => (None, *name, Some(*count)),
        [prefix, name] => (Some(*prefix), *name, None),
        [name] => (None, *name, None),
        [] => (None, "", None),
    };

    let count = match count {
        Some(count) => parse_count(fragment, count)?,
        None => NodeCount::default(),
    };
    let (base, operators) = split_brackets(fragment, name)?;
    if base.is_empty() {
        return Err(RuleFormatError::EmptyName {
            fragment: fragment.to_string(),
        });
    }

    let kind = match prefix.and_then(|p| p.chars().next()) {
        Some('o' | 'O') => RuleKind::Operator,
        Some('p' | 'P') => RuleKind::Property,
        _ => detect_kind(base),
    };
    if kind == RuleKind::Operator && name.contains(['[', ']']) {
        return Err(RuleFormatError::MalformedBracket {
            fragment: fragment.to_string(),
        });
    }

    trace!(fragment, name = base, ?kind, %count, "filter.rules.fragment");
    Ok(TextRule {
        kind,
        name: base.to_string(),
        count,
        operators,
    })
}

fn detect_kind(name: &str) -> RuleKind {
    if name.contains('/') {
        return RuleKind::Property;
    }
    if OPERATOR_VOCABULARY
        .iter()
        .any(|op| op.eq_ignore_ascii_case(name))
    {
        RuleKind::Operator
    } else {
        RuleKind::Property
    }
}

fn parse_count(fragment: &str, count: &str) -> Result<NodeCount, RuleFormatError> {
    let bound = |text: &str| -> Result<u32, RuleFormatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(0);
        }
        text.parse().map_err(|source| RuleFormatError::InvalidCount {
            fragment: fragment.to_string(),
            count: count.to_string(),
            source,
        })
    };

    let bounds: Vec<&str> = count.split(',').collect();
    match bounds.as_slice() {
        [single] => {
            let n = bound(*single)?;
            Ok(NodeCount::exactly(n))
        }
        [min, max] => Ok(NodeCount::new(bound(*min)?, bound(*max)?)),
        // Extra bounds are rejected, never truncated.
        _ => Err(RuleFormatError::CountShape {
            fragment: fragment.to_string(),
            count: count.to_string(),
        }),
    }
}

fn split_brackets<'a>(
    fragment: &str,
    name: &'a str,
) -> Result<(&'a str, Vec<String>), RuleFormatError> {
    let malformed = || RuleFormatError::MalformedBracket {
        fragment: fragment.to_string(),
    };
    let Some(open) = name.find('[') else {
        if name.contains(']') {
            return Err(malformed());
        }
        return Ok((name, Vec::new()));
    };
    let close = name.rfind(']').ok_or_else(malformed)?;
    if close < open || !name[close + 1..].trim().is_empty() {
        return Err(malformed());
    }
    let inner = &name[open + 1..close];
    if inner.contains(['[', ']']) {
        return Err(malformed());
    }
    let operators = inner
        .split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .map(str::to_string)
        .collect();
    Ok((name[..open].trim(), operators))
}
