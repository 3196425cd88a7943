//! Bound abstract syntax tree for OData `$filter` expressions.
//!
//! Every node here has been resolved against a [`crate::SchemaModel`]: member
//! accesses know whether they reach a primitive, complex, navigation, or
//! collection property, and lambda variables are bound to their element type.

use std::fmt;

use crate::schema::{EdmType, PrimitiveKind};

/// Unary operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOperatorKind {
    /// Logical negation (`not`).
    Not,
    /// Arithmetic negation (`-`).
    Negate,
}

impl UnaryOperatorKind {
    /// Canonical lowercase name.
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperatorKind::Not => "not",
            UnaryOperatorKind::Negate => "negate",
        }
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOperatorKind {
    /// `or`
    Or,
    /// `and`
    And,
    /// `eq`
    Equal,
    /// `ne`
    NotEqual,
    /// `gt`
    GreaterThan,
    /// `ge`
    GreaterThanOrEqual,
    /// `lt`
    LessThan,
    /// `le`
    LessThanOrEqual,
    /// `add`
    Add,
    /// `sub`
    Subtract,
    /// `mul`
    Multiply,
    /// `div` and `divby`
    Divide,
    /// `mod`
    Modulo,
    /// `has`
    Has,
}

impl BinaryOperatorKind {
    /// Canonical lowercase name as written in filter text.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperatorKind::Or => "or",
            BinaryOperatorKind::And => "and",
            BinaryOperatorKind::Equal => "eq",
            BinaryOperatorKind::NotEqual => "ne",
            BinaryOperatorKind::GreaterThan => "gt",
            BinaryOperatorKind::GreaterThanOrEqual => "ge",
            BinaryOperatorKind::LessThan => "lt",
            BinaryOperatorKind::LessThanOrEqual => "le",
            BinaryOperatorKind::Add => "add",
            BinaryOperatorKind::Subtract => "sub",
            BinaryOperatorKind::Multiply => "mul",
            BinaryOperatorKind::Divide => "div",
            BinaryOperatorKind::Modulo => "mod",
            BinaryOperatorKind::Has => "has",
        }
    }

    /// Maps a comparison keyword (case-insensitive) to its operator.
    pub fn comparison(keyword: &str) -> Option<Self> {
        let op = match keyword.to_ascii_lowercase().as_str() {
            "eq" => BinaryOperatorKind::Equal,
            "ne" => BinaryOperatorKind::NotEqual,
            "gt" => BinaryOperatorKind::GreaterThan,
            "ge" => BinaryOperatorKind::GreaterThanOrEqual,
            "lt" => BinaryOperatorKind::LessThan,
            "le" => BinaryOperatorKind::LessThanOrEqual,
            "has" => BinaryOperatorKind::Has,
            _ => return None,
        };
        Some(op)
    }

    /// Maps an additive keyword to its operator.
    pub fn additive(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "add" => Some(BinaryOperatorKind::Add),
            "sub" => Some(BinaryOperatorKind::Subtract),
            _ => None,
        }
    }

    /// Maps a multiplicative keyword to its operator.
    pub fn multiplicative(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "mul" => Some(BinaryOperatorKind::Multiply),
            "div" | "divby" => Some(BinaryOperatorKind::Divide),
            "mod" => Some(BinaryOperatorKind::Modulo),
            _ => None,
        }
    }

    /// `and` / `or`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperatorKind::And | BinaryOperatorKind::Or)
    }

    /// `add`, `sub`, `mul`, `div`, `mod`.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperatorKind::Add
                | BinaryOperatorKind::Subtract
                | BinaryOperatorKind::Multiply
                | BinaryOperatorKind::Divide
                | BinaryOperatorKind::Modulo
        )
    }

    /// Relational operators that require ordered operands.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            BinaryOperatorKind::GreaterThan
                | BinaryOperatorKind::GreaterThanOrEqual
                | BinaryOperatorKind::LessThan
                | BinaryOperatorKind::LessThanOrEqual
        )
    }
}

/// Literal values. Non-integral numbers and temporal values keep their source
/// text so they render exactly as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer that fits in 32 bits.
    Int32(i32),
    /// Integer that needs 64 bits, or carries an `L` suffix.
    Int64(i64),
    /// Decimal number such as `1.5` or `2m`.
    Decimal(String),
    /// Single precision number such as `1.5f`.
    Single(String),
    /// Double precision number such as `1e3`, `INF`, or `NaN`.
    Double(String),
    /// Unescaped string content.
    String(String),
    /// `2024-01-31`
    Date(String),
    /// `12:30:00`
    TimeOfDay(String),
    /// RFC 3339 timestamp.
    DateTimeOffset(String),
    /// `01234567-89ab-cdef-0123-456789abcdef`
    Guid(String),
    /// ISO 8601 duration body of `duration'P1D'`.
    Duration(String),
    /// Member of an enumeration.
    Enum {
        /// Qualified enum type name.
        type_name: String,
        /// Declared member name.
        member: String,
    },
}

impl Literal {
    /// EDM type of the literal; `None` for `null`.
    pub fn edm_type(&self) -> Option<EdmType> {
        let kind = match self {
            Literal::Null => return None,
            Literal::Enum { type_name, .. } => return Some(EdmType::Enum(type_name.clone())),
            Literal::Boolean(_) => PrimitiveKind::Boolean,
            Literal::Int32(_) => PrimitiveKind::Int32,
            Literal::Int64(_) => PrimitiveKind::Int64,
            Literal::Decimal(_) => PrimitiveKind::Decimal,
            Literal::Single(_) => PrimitiveKind::Single,
            Literal::Double(_) => PrimitiveKind::Double,
            Literal::String(_) => PrimitiveKind::String,
            Literal::Date(_) => PrimitiveKind::Date,
            Literal::TimeOfDay(_) => PrimitiveKind::TimeOfDay,
            Literal::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
            Literal::Guid(_) => PrimitiveKind::Guid,
            Literal::Duration(_) => PrimitiveKind::Duration,
        };
        Some(EdmType::Primitive(kind))
    }

    /// Bare scalar text without any quoting or type prefix.
    pub fn scalar_text(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Boolean(v) => v.to_string(),
            Literal::Int32(v) => v.to_string(),
            Literal::Int64(v) => v.to_string(),
            Literal::Decimal(text)
            | Literal::Single(text)
            | Literal::Double(text)
            | Literal::String(text)
            | Literal::Date(text)
            | Literal::TimeOfDay(text)
            | Literal::DateTimeOffset(text)
            | Literal::Guid(text)
            | Literal::Duration(text) => text.clone(),
            Literal::Enum { member, .. } => member.clone(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Literal::Duration(v) => write!(f, "duration'{v}'"),
            Literal::Enum { type_name, member } => write!(f, "{type_name}'{member}'"),
            other => f.write_str(&other.scalar_text()),
        }
    }
}

/// Body of an `any` / `all` quantifier.
#[derive(Clone, Debug, PartialEq)]
pub struct LambdaNode {
    /// Collection being iterated.
    pub source: Box<QueryNode>,
    /// Name of the bound range variable; `None` for an empty `any()`.
    pub variable: Option<String>,
    /// Predicate evaluated per element.
    pub body: Box<QueryNode>,
}

/// Bound expression node.
///
/// Member accesses carry an optional `source`; the binder always sets it (to
/// the implicit `$it` range variable at the root), hand-built trees may omit it.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryNode {
    /// Literal value.
    Constant(Literal),
    /// Implicit type promotion inserted by the binder.
    Convert {
        /// Converted expression.
        source: Box<QueryNode>,
        /// Target primitive type.
        target: PrimitiveKind,
    },
    /// `not x`, `-x`.
    UnaryOperator {
        /// Operator.
        op: UnaryOperatorKind,
        /// Operand.
        operand: Box<QueryNode>,
    },
    /// `x op y`.
    BinaryOperator {
        /// Operator.
        op: BinaryOperatorKind,
        /// Left operand.
        left: Box<QueryNode>,
        /// Right operand.
        right: Box<QueryNode>,
    },
    /// Built-in function call; `name` is canonical lowercase.
    FunctionCall {
        /// Function name.
        name: String,
        /// Arguments in call order.
        parameters: Vec<QueryNode>,
    },
    /// `x in (a, b)` or `x in collection`.
    In {
        /// Tested value.
        left: Box<QueryNode>,
        /// Candidate collection.
        right: Box<QueryNode>,
    },
    /// `source/any(v: body)`.
    Any(LambdaNode),
    /// `source/all(v: body)`.
    All(LambdaNode),
    /// Primitive or enum property.
    PropertyAccess {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Declared property name.
        property: String,
    },
    /// Undeclared property of an open type.
    OpenPropertyAccess {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Property name as written.
        name: String,
    },
    /// Single-valued complex property.
    SingleComplex {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Declared property name.
        property: String,
    },
    /// Single-valued navigation property.
    SingleNavigation {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Declared property name.
        property: String,
    },
    /// Collection of primitive or enum values.
    CollectionPropertyAccess {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Declared property name.
        property: String,
    },
    /// Collection of complex values.
    CollectionComplex {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Declared property name.
        property: String,
    },
    /// Collection-valued navigation property.
    CollectionNavigation {
        /// Owning instance.
        source: Option<Box<QueryNode>>,
        /// Declared property name.
        property: String,
    },
    /// Parenthesized literal list on the right of `in`.
    CollectionConstant(Vec<QueryNode>),
    /// Reference to `$it` or to a lambda variable.
    RangeVariable {
        /// Variable name.
        name: String,
        /// Type the variable ranges over.
        element: EdmType,
    },
}

impl QueryNode {
    /// Literal constant.
    pub fn constant(value: Literal) -> Self {
        QueryNode::Constant(value)
    }

    /// Binary operation.
    pub fn binary(op: BinaryOperatorKind, left: QueryNode, right: QueryNode) -> Self {
        QueryNode::BinaryOperator {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Strips any number of `Convert` wrappers.
    pub fn unwrap_convert(&self) -> &QueryNode {
        let mut node = self;
        while let QueryNode::Convert { source, .. } = node {
            node = source;
        }
        node
    }

    /// Owning instance of a member access.
    pub fn source(&self) -> Option<&QueryNode> {
        match self {
            QueryNode::PropertyAccess { source, .. }
            | QueryNode::OpenPropertyAccess { source, .. }
            | QueryNode::SingleComplex { source, .. }
            | QueryNode::SingleNavigation { source, .. }
            | QueryNode::CollectionPropertyAccess { source, .. }
            | QueryNode::CollectionComplex { source, .. }
            | QueryNode::CollectionNavigation { source, .. } => source.as_deref(),
            _ => None,
        }
    }

    /// Member name of a member access.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            QueryNode::PropertyAccess { property, .. }
            | QueryNode::SingleComplex { property, .. }
            | QueryNode::SingleNavigation { property, .. }
            | QueryNode::CollectionPropertyAccess { property, .. }
            | QueryNode::CollectionComplex { property, .. }
            | QueryNode::CollectionNavigation { property, .. } => Some(property),
            QueryNode::OpenPropertyAccess { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn write_member(
    f: &mut fmt::Formatter<'_>,
    source: &Option<Box<QueryNode>>,
    name: &str,
) -> fmt::Result {
    match source.as_deref().map(QueryNode::unwrap_convert) {
        None => f.write_str(name),
        Some(QueryNode::RangeVariable { name: var, .. }) if var == "$it" => f.write_str(name),
        Some(parent) => write!(f, "{parent}/{name}"),
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &QueryNode) -> fmt::Result {
    match node.unwrap_convert() {
        inner @ QueryNode::BinaryOperator { .. } => write!(f, "({inner})"),
        inner => write!(f, "{inner}"),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[QueryNode]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_lambda(f: &mut fmt::Formatter<'_>, keyword: &str, lambda: &LambdaNode) -> fmt::Result {
    write!(f, "{}/{keyword}(", lambda.source)?;
    if let Some(var) = &lambda.variable {
        write!(f, "{var}: {}", lambda.body)?;
    }
    f.write_str(")")
}

/// Writes a binary operator, walking its left-associated chain in a loop.
fn write_chain(
    f: &mut fmt::Formatter<'_>,
    op: BinaryOperatorKind,
    left: &QueryNode,
    right: &QueryNode,
) -> fmt::Result {
    let mut steps = vec![(op, right)];
    let mut leftmost = left.unwrap_convert();
    while let QueryNode::BinaryOperator { op, left, right } = leftmost {
        steps.push((*op, right.as_ref()));
        leftmost = left.unwrap_convert();
    }

    for _ in 1..steps.len() {
        f.write_str("(")?;
    }
    write_operand(f, leftmost)?;
    let last = steps.len() - 1;
    for (idx, (op, right)) in steps.into_iter().rev().enumerate() {
        write!(f, " {} ", op.symbol())?;
        write_operand(f, right)?;
        if idx < last {
            f.write_str(")")?;
        }
    }
    Ok(())
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Constant(value) => write!(f, "{value}"),
            QueryNode::Convert { source, .. } => write!(f, "{source}"),
            QueryNode::UnaryOperator { op, operand } => match op {
                UnaryOperatorKind::Not => {
                    f.write_str("not ")?;
                    write_operand(f, operand)
                }
                UnaryOperatorKind::Negate => {
                    f.write_str("-")?;
                    write_operand(f, operand)
                }
            },
            QueryNode::BinaryOperator { op, left, right } => write_chain(f, *op, left, right),
            QueryNode::FunctionCall { name, parameters } => {
                write!(f, "{name}(")?;
                write_list(f, parameters)?;
                f.write_str(")")
            }
            QueryNode::In { left, right } => write!(f, "{left} in {right}"),
            QueryNode::Any(lambda) => write_lambda(f, "any", lambda),
            QueryNode::All(lambda) => write_lambda(f, "all", lambda),
            QueryNode::PropertyAccess { source, property }
            | QueryNode::SingleComplex { source, property }
            | QueryNode::SingleNavigation { source, property }
            | QueryNode::CollectionPropertyAccess { source, property }
            | QueryNode::CollectionComplex { source, property }
            | QueryNode::CollectionNavigation { source, property } => {
                write_member(f, source, property)
            }
            QueryNode::OpenPropertyAccess { source, name } => write_member(f, source, name),
            QueryNode::CollectionConstant(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            QueryNode::RangeVariable { name, .. } => f.write_str(name),
        }
    }
}
