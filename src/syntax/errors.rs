#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// Diagnostics produced while lexing, parsing, or binding filter text.
///
/// Positions are byte offsets into the filter text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Filter text contained no tokens.
    #[error("filter expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },
    #[error("invalid {kind} literal '{text}' at position {position}")]
    InvalidLiteral {
        text: String,
        kind: &'static str,
        position: usize,
    },
    #[error("expected {expected} but found '{found}' at position {position}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        position: usize,
    },
    #[error("expected {expected} but reached the end of the expression")]
    UnexpectedEnd { expected: &'static str },
    /// Nesting exceeds the configured depth.
    #[error("filter expression exceeds depth {max}")]
    TooDeep { max: usize },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("function '{function}' expects {} arguments but got {found}", ArgRange(.min, .max))]
    ArgumentCount {
        function: String,
        min: usize,
        max: usize,
        found: usize,
    },
    #[error("argument {index} of '{function}' must be Edm.String, found {found}")]
    ArgumentType {
        function: String,
        index: usize,
        found: String,
    },
    #[error("could not find a property named '{property}' on type '{type_name}'")]
    PropertyNotFound { property: String, type_name: String },
    #[error("property name '{property}' is ambiguous on type '{type_name}'")]
    AmbiguousProperty { property: String, type_name: String },
    #[error("'{segment}' cannot be accessed on non-structured type '{type_name}'")]
    NotStructured { segment: String, type_name: String },
    #[error("'{operator}' requires a collection source but found {found}")]
    NotCollection { operator: &'static str, found: String },
    #[error("type '{name}' is not defined in the schema")]
    UnknownType { name: String },
    #[error("'{member}' is not a member of enum type '{type_name}'")]
    EnumMemberNotFound { member: String, type_name: String },
    #[error("operator '{operator}' cannot be applied to {left} and {right}")]
    IncompatibleTypes {
        operator: String,
        left: String,
        right: String,
    },
    #[error("{context} must evaluate to Edm.Boolean, found {found}")]
    NotBoolean { context: &'static str, found: String },
    #[error("right operand of 'in' must be a list or collection, found {found}")]
    InvalidInOperand { found: String },
}

struct ArgRange<'a>(&'a usize, &'a usize);

impl fmt::Display for ArgRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == self.1 {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{} to {}", self.0, self.1)
        }
    }
}

impl ParseError {
    pub(crate) fn unexpected(found: impl Into<String>, expected: &'static str, position: usize) -> Self {
        ParseError::UnexpectedToken {
            found: found.into(),
            expected,
            position,
        }
    }

    pub(crate) fn incompatible(
        operator: impl Into<String>,
        left: impl fmt::Display,
        right: impl fmt::Display,
    ) -> Self {
        ParseError::IncompatibleTypes {
            operator: operator.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Empty => "Empty",
            ParseError::UnexpectedCharacter { .. } => "SyntaxError",
            ParseError::UnterminatedString { .. } => "SyntaxError",
            ParseError::InvalidLiteral { .. } => "InvalidLiteral",
            ParseError::UnexpectedToken { .. } => "SyntaxError",
            ParseError::UnexpectedEnd { .. } => "SyntaxError",
            ParseError::TooDeep { .. } => "TooDeep",
            ParseError::UnknownFunction { .. } => "UnknownFunction",
            ParseError::ArgumentCount { .. } => "ArgumentMismatch",
            ParseError::ArgumentType { .. } => "ArgumentMismatch",
            ParseError::PropertyNotFound { .. } => "UnknownProperty",
            ParseError::AmbiguousProperty { .. } => "UnknownProperty",
            ParseError::NotStructured { .. } => "TypeMismatch",
            ParseError::NotCollection { .. } => "TypeMismatch",
            ParseError::UnknownType { .. } => "UnknownType",
            ParseError::EnumMemberNotFound { .. } => "UnknownEnumMember",
            ParseError::IncompatibleTypes { .. } => "TypeMismatch",
            ParseError::NotBoolean { .. } => "TypeMismatch",
            ParseError::InvalidInOperand { .. } => "TypeMismatch",
        }
    }
}

/// Convenience wrapper that formats parse errors with their codes.
pub struct ParseErrorWithCode<'a>(pub &'a ParseError);

impl fmt::Display for ParseErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
