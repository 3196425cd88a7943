#![allow(missing_docs)]

use std::fmt;
use std::num::ParseIntError;

use thiserror::Error;

use crate::syntax::ParseError;

pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised while building trees or deserializing rules.
///
/// Validation problems are never reported through this type; they accumulate
/// inside [`crate::FilterValidator`].
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("filter expression is empty")]
    EmptyFilter,
    #[error("cannot parse filter expression '{filter}': {source}")]
    Parse {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("filter tree exceeds depth {max}")]
    TooDeep { max: usize },
    #[error("cannot deserialize filter rules from '{input}': {source}")]
    RuleFormat {
        input: String,
        #[source]
        source: RuleFormatError,
    },
    #[error("operator rule '{name}' is declared more than once")]
    DuplicateRule { name: String },
}

impl FilterError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            FilterError::Schema(err) => err.code(),
            FilterError::EmptyFilter => "EmptyFilter",
            FilterError::Parse { .. } => "ParseError",
            FilterError::TooDeep { .. } => "TooDeep",
            FilterError::RuleFormat { .. } => "RuleFormatError",
            FilterError::DuplicateRule { .. } => "DuplicateRuleError",
        }
    }

    pub(crate) fn rule_format(input: &str, source: RuleFormatError) -> Self {
        FilterError::RuleFormat {
            input: input.to_owned(),
            source,
        }
    }
}

/// Failures while assembling or querying a [`crate::SchemaModel`].
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema does not contain any elements")]
    Empty,
    #[error("type '{name}' not found in schema (available: {})", AvailableTypes(.available))]
    TypeNotFound {
        name: String,
        available: Vec<String>,
    },
    #[error("schema element '{name}' is declared more than once")]
    DuplicateElement { name: String },
    #[error("property '{owner}.{property}' references unknown {expected} '{target}'")]
    UnknownTypeReference {
        owner: String,
        property: String,
        target: String,
        expected: &'static str,
    },
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Empty => "SchemaEmpty",
            SchemaError::TypeNotFound { .. } => "TypeNotFound",
            SchemaError::DuplicateElement { .. } => "DuplicateElement",
            SchemaError::UnknownTypeReference { .. } => "UnknownTypeReference",
            SchemaError::Json(_) => "SchemaJson",
        }
    }
}

struct AvailableTypes<'a>(&'a [String]);

impl fmt::Display for AvailableTypes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.0.join(", "))
    }
}

/// Structural problems in a rule document or rule text fragment.
#[derive(Debug, Error)]
pub enum RuleFormatError {
    #[error("invalid rule document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid count '{count}' in rule '{fragment}'")]
    InvalidCount {
        fragment: String,
        count: String,
        #[source]
        source: ParseIntError,
    },
    #[error("count '{count}' in rule '{fragment}' must be 'min,max' or a single value")]
    CountShape { fragment: String, count: String },
    #[error("malformed operator list in rule '{fragment}'")]
    MalformedBracket { fragment: String },
    #[error("rule '{fragment}' does not name an operator or property")]
    EmptyName { fragment: String },
}
