//! Filter normalization, rule language, and validation.
//!
//! A bound AST is flattened into a [`FilterTree`] whose inventories record
//! which operators and properties a filter uses. [`FilterRules`] describe
//! what is allowed and [`FilterValidator`] compares the two.

/// Occurrence bounds for rules.
pub mod count;

/// Text grammar for rules.
///
/// Parses pipe-separated fragments such as `o:ne:1,2|name/givenName[eq]`.
pub mod grammar;

/// Case-insensitive, insertion-ordered name map.
pub mod map;

/// Normalized tree nodes and property path resolution.
pub mod node;

/// Rule sets in JSON or text form.
pub mod rules;

/// Parse orchestration and usage inventories.
pub mod tree;

/// Rule checking and violation messages.
pub mod validator;

pub use count::NodeCount;
pub use map::NameMap;
pub use node::{FilterNode, NodeId, NodeKind};
pub use rules::{FilterRules, OperatorRules};
pub use tree::{FilterTree, PreOrder};
pub use validator::FilterValidator;
