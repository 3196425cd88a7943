//! OData `$filter` parsing and binding.
//!
//! Filter text flows through three stages: the lexer turns it into tokens,
//! the parser builds an unbound expression tree, and the binder resolves that
//! tree against a [`SchemaModel`] into the bound [`QueryNode`] AST that the
//! filter tree consumes.

/// Bound abstract syntax tree.
///
/// Operator kinds, literals, and member access nodes produced by binding.
pub mod ast;

/// Schema-aware binding of parsed expressions.
pub(crate) mod binder;

/// Parse and bind diagnostics.
pub mod errors;

/// Tokenizer for filter text.
pub mod lexer;

/// Precedence-climbing parser producing unbound expressions.
pub mod parser;

use tracing::debug;

use crate::options::FilterOptions;
use crate::schema::{SchemaElement, SchemaModel};

pub use ast::{BinaryOperatorKind, LambdaNode, Literal, QueryNode, UnaryOperatorKind};
pub use errors::{ParseError, ParseErrorWithCode};

/// Turns filter text into a bound AST for a given entity type.
///
/// [`crate::FilterTree`] only depends on this trait, so callers can plug in
/// an alternative front end that produces the same [`QueryNode`] shapes.
pub trait FilterParser {
    /// Parses `filter` and binds it against `entity` within `schema`.
    fn parse_filter(
        &self,
        filter: &str,
        schema: &SchemaModel,
        entity: &SchemaElement,
        options: &FilterOptions,
    ) -> Result<QueryNode, ParseError>;
}

/// Built-in parser for OData 4.01 URL filter syntax.
#[derive(Clone, Copy, Debug, Default)]
pub struct UriFilterParser;

impl FilterParser for UriFilterParser {
    fn parse_filter(
        &self,
        filter: &str,
        schema: &SchemaModel,
        entity: &SchemaElement,
        options: &FilterOptions,
    ) -> Result<QueryNode, ParseError> {
        let expr = parser::parse(filter, options.max_depth)?;
        let node = binder::bind(&expr, schema, entity, options)?;
        debug!(entity = %entity.full_name(), "syntax.filter.bound");
        Ok(node)
    }
}
