//! OData `$filter` analysis and rule validation.
//!
//! Filter text is parsed and bound against a [`SchemaModel`], normalized into
//! a [`FilterTree`] that records the operators and property paths it uses,
//! and checked against [`FilterRules`] by a [`FilterValidator`].
//!
//! ```
//! use odata_filter::{FilterValidator, SchemaModel};
//! use odata_filter::schema::{EdmType, SchemaBuilder, StructuredType};
//!
//! let schema = SchemaBuilder::new("Default")
//!     .with_complex(
//!         StructuredType::new("PersonName").with_property("givenName", EdmType::string()),
//!     )
//!     .with_entity(
//!         StructuredType::new("User")
//!             .with_key("id")
//!             .with_property("id", EdmType::int32())
//!             .with_property("name", EdmType::complex("PersonName")),
//!     )
//!     .build()?;
//!
//! let validator = FilterValidator::validate_text(
//!     "startsWith(name/givenName, 'jo') and id gt 10",
//!     &schema,
//!     "User",
//!     "and:1|startswith|gt|name/givenName|id:,1",
//! )?;
//! assert!(validator.passed());
//! # Ok::<(), odata_filter::FilterError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Error types shared by every module.
pub mod error;

/// Parse and tree construction options.
pub mod options;

/// Entity, complex, and enum type descriptions.
pub mod schema;

/// Filter text parsing and binding.
pub mod syntax;

/// Normalized filter trees, rules, and validation.
pub mod filter;

pub use error::{FilterError, Result, RuleFormatError, SchemaError};
pub use filter::{
    FilterNode, FilterRules, FilterTree, FilterValidator, NameMap, NodeCount, NodeId, NodeKind,
};
pub use options::FilterOptions;
pub use schema::{Describe, SchemaModel};
pub use syntax::{FilterParser, ParseError, QueryNode, UriFilterParser};
