//! Semantic binding of parsed expressions against a schema.
//!
//! Identifiers resolve to lambda variables first and to properties of the
//! implicit `$it` instance otherwise. Operand types are checked loosely:
//! numeric operands are promoted through `Convert` nodes, string literals
//! compared with enum properties become enum constants, and logical operands
//! must be boolean.

use tracing::trace;

use super::ast::{BinaryOperatorKind, LambdaNode, Literal, QueryNode, UnaryOperatorKind};
use super::errors::ParseError;
use super::parser::{Expr, LambdaKind};
use crate::options::FilterOptions;
use crate::schema::{EdmType, PrimitiveKind, PropertyMatch, SchemaElement, SchemaModel};

/// Name of the implicit range variable bound to the filtered entity.
pub const IMPLICIT_VARIABLE: &str = "$it";

#[derive(Clone, Copy, Debug)]
enum Returns {
    Fixed(PrimitiveKind),
    SameAsFirst,
}

#[derive(Clone, Copy, Debug)]
struct FunctionSignature {
    name: &'static str,
    min_args: usize,
    max_args: usize,
    /// Leading arguments that must be strings.
    string_args: usize,
    returns: Returns,
}

const fn sig(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    string_args: usize,
    returns: Returns,
) -> FunctionSignature {
    FunctionSignature {
        name,
        min_args,
        max_args,
        string_args,
        returns,
    }
}

const BOOL: Returns = Returns::Fixed(PrimitiveKind::Boolean);
const INT: Returns = Returns::Fixed(PrimitiveKind::Int32);
const STRING: Returns = Returns::Fixed(PrimitiveKind::String);
const TIMESTAMP: Returns = Returns::Fixed(PrimitiveKind::DateTimeOffset);

const FUNCTIONS: &[FunctionSignature] = &[
    sig("contains", 2, 2, 2, BOOL),
    sig("startswith", 2, 2, 2, BOOL),
    sig("endswith", 2, 2, 2, BOOL),
    sig("substringof", 2, 2, 2, BOOL),
    sig("matchespattern", 2, 2, 2, BOOL),
    sig("length", 1, 1, 1, INT),
    sig("indexof", 2, 2, 2, INT),
    sig("substring", 2, 3, 1, STRING),
    sig("tolower", 1, 1, 1, STRING),
    sig("toupper", 1, 1, 1, STRING),
    sig("trim", 1, 1, 1, STRING),
    sig("concat", 2, 2, 2, STRING),
    sig("year", 1, 1, 0, INT),
    sig("month", 1, 1, 0, INT),
    sig("day", 1, 1, 0, INT),
    sig("hour", 1, 1, 0, INT),
    sig("minute", 1, 1, 0, INT),
    sig("second", 1, 1, 0, INT),
    sig("fractionalseconds", 1, 1, 0, Returns::Fixed(PrimitiveKind::Decimal)),
    sig("totaloffsetminutes", 1, 1, 0, INT),
    sig("date", 1, 1, 0, Returns::Fixed(PrimitiveKind::Date)),
    sig("time", 1, 1, 0, Returns::Fixed(PrimitiveKind::TimeOfDay)),
    sig("now", 0, 0, 0, TIMESTAMP),
    sig("mindatetime", 0, 0, 0, TIMESTAMP),
    sig("maxdatetime", 0, 0, 0, TIMESTAMP),
    sig("round", 1, 1, 0, Returns::SameAsFirst),
    sig("floor", 1, 1, 0, Returns::SameAsFirst),
    sig("ceiling", 1, 1, 0, Returns::SameAsFirst),
];

/// Bound node with its static type; `None` for `null` and open properties.
struct Bound {
    node: QueryNode,
    ty: Option<EdmType>,
}

impl Bound {
    fn new(node: QueryNode, ty: Option<EdmType>) -> Self {
        Self { node, ty }
    }

    fn boolean(node: QueryNode) -> Self {
        Self::new(node, Some(EdmType::boolean()))
    }
}

fn describe(ty: &Option<EdmType>) -> String {
    match ty {
        Some(ty) => ty.to_string(),
        None => "null".to_string(),
    }
}

fn convert(node: QueryNode, target: PrimitiveKind) -> QueryNode {
    QueryNode::Convert {
        source: Box::new(node),
        target,
    }
}

/// Resolves `expr` against `root` and returns the bound boolean expression.
pub fn bind(
    expr: &Expr,
    schema: &SchemaModel,
    root: &SchemaElement,
    options: &FilterOptions,
) -> Result<QueryNode, ParseError> {
    let mut binder = Binder {
        schema,
        root_type: EdmType::Entity(root.full_name()),
        options,
        scopes: Vec::new(),
        depth: 0,
    };
    let bound = binder.bind(expr)?;
    require_boolean(&bound, "filter expression")?;
    Ok(bound.node)
}

fn require_boolean(bound: &Bound, context: &'static str) -> Result<(), ParseError> {
    match &bound.ty {
        None => Ok(()),
        Some(ty) if ty.is_boolean() => Ok(()),
        other => Err(ParseError::NotBoolean {
            context,
            found: describe(other),
        }),
    }
}

struct Binder<'s> {
    schema: &'s SchemaModel,
    root_type: EdmType,
    options: &'s FilterOptions,
    scopes: Vec<(String, EdmType)>,
    depth: usize,
}

impl<'s> Binder<'s> {
    fn bind(&mut self, expr: &Expr) -> Result<Bound, ParseError> {
        if self.depth >= self.options.max_depth {
            return Err(ParseError::TooDeep {
                max: self.options.max_depth,
            });
        }
        self.depth += 1;
        let result = self.bind_expr(expr);
        self.depth -= 1;
        result
    }

    fn bind_expr(&mut self, expr: &Expr) -> Result<Bound, ParseError> {
        match expr {
            Expr::Literal(value) => self.literal(value),
            Expr::List(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                let mut element = None;
                for item in items {
                    let bound = self.bind(item)?;
                    element = element.or(bound.ty);
                    nodes.push(bound.node);
                }
                let ty = element.map(EdmType::collection);
                Ok(Bound::new(QueryNode::CollectionConstant(nodes), ty))
            }
            Expr::Member { parent, name } => self.member(parent.as_deref(), name),
            Expr::Lambda {
                kind,
                source,
                variable,
                body,
            } => self.lambda(*kind, source, variable.as_deref(), body.as_deref()),
            Expr::Call { name, args } => self.call(name, args),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::In { left, right } => self.in_list(left, right),
        }
    }

    fn literal(&self, value: &Literal) -> Result<Bound, ParseError> {
        if let Literal::Enum { type_name, member } = value {
            let element = self
                .schema
                .enum_type(type_name)
                .ok_or_else(|| ParseError::UnknownType {
                    name: type_name.clone(),
                })?;
            let value = self.enum_constant(element, member)?;
            let ty = value.edm_type();
            return Ok(Bound::new(QueryNode::Constant(value), ty));
        }
        Ok(Bound::new(QueryNode::Constant(value.clone()), value.edm_type()))
    }

    fn enum_constant(&self, element: &SchemaElement, member: &str) -> Result<Literal, ParseError> {
        let declared = element
            .find_member(member, self.options.case_insensitive)
            .ok_or_else(|| ParseError::EnumMemberNotFound {
                member: member.to_string(),
                type_name: element.full_name(),
            })?;
        Ok(Literal::Enum {
            type_name: element.full_name(),
            member: declared.to_string(),
        })
    }

    fn implicit_variable(&self) -> QueryNode {
        QueryNode::RangeVariable {
            name: IMPLICIT_VARIABLE.to_string(),
            element: self.root_type.clone(),
        }
    }

    fn member(&mut self, parent: Option<&Expr>, name: &str) -> Result<Bound, ParseError> {
        let Some(parent) = parent else {
            if name == IMPLICIT_VARIABLE {
                return Ok(Bound::new(
                    self.implicit_variable(),
                    Some(self.root_type.clone()),
                ));
            }
            if let Some((var, ty)) = self.scopes.iter().rev().find(|(var, _)| var == name) {
                let node = QueryNode::RangeVariable {
                    name: var.clone(),
                    element: ty.clone(),
                };
                return Ok(Bound::new(node, Some(ty.clone())));
            }
            let root = self.root_type.clone();
            return self.property(self.implicit_variable(), &root, name);
        };

        let owner = self.bind(parent)?;
        match owner.ty {
            Some(ty) if ty.is_structured() => self.property(owner.node, &ty, name),
            other => Err(ParseError::NotStructured {
                segment: name.to_string(),
                type_name: describe(&other),
            }),
        }
    }

    fn property(&self, source: QueryNode, owner: &EdmType, name: &str) -> Result<Bound, ParseError> {
        let type_name = match owner {
            EdmType::Complex(type_name) | EdmType::Entity(type_name) => type_name,
            other => {
                return Err(ParseError::NotStructured {
                    segment: name.to_string(),
                    type_name: other.to_string(),
                })
            }
        };
        let element = self
            .schema
            .structured_type(type_name)
            .ok_or_else(|| ParseError::UnknownType {
                name: type_name.clone(),
            })?;
        let source = Some(Box::new(source));

        let def = match element.find_property(name, self.options.case_insensitive) {
            PropertyMatch::Found(def) => def,
            PropertyMatch::Missing if element.open => {
                let node = QueryNode::OpenPropertyAccess {
                    source,
                    name: name.to_string(),
                };
                return Ok(Bound::new(node, None));
            }
            PropertyMatch::Missing => {
                return Err(ParseError::PropertyNotFound {
                    property: name.to_string(),
                    type_name: element.full_name(),
                })
            }
            PropertyMatch::Ambiguous => {
                return Err(ParseError::AmbiguousProperty {
                    property: name.to_string(),
                    type_name: element.full_name(),
                })
            }
        };
        trace!(owner = %type_name, property = %def.name, ty = %def.ty, "syntax.bind.property");

        let property = def.name.clone();
        let node = match &def.ty {
            EdmType::Primitive(_) | EdmType::Enum(_) => QueryNode::PropertyAccess { source, property },
            EdmType::Complex(_) => QueryNode::SingleComplex { source, property },
            EdmType::Entity(_) => QueryNode::SingleNavigation { source, property },
            EdmType::Collection(inner) => match inner.as_ref() {
                EdmType::Complex(_) => QueryNode::CollectionComplex { source, property },
                EdmType::Entity(_) => QueryNode::CollectionNavigation { source, property },
                _ => QueryNode::CollectionPropertyAccess { source, property },
            },
        };
        Ok(Bound::new(node, Some(def.ty.clone())))
    }

    fn lambda(
        &mut self,
        kind: LambdaKind,
        source: &Expr,
        variable: Option<&str>,
        body: Option<&Expr>,
    ) -> Result<Bound, ParseError> {
        let source = self.bind(source)?;
        let element = match &source.ty {
            Some(EdmType::Collection(inner)) => inner.as_ref().clone(),
            other => {
                return Err(ParseError::NotCollection {
                    operator: kind.keyword(),
                    found: describe(other),
                })
            }
        };

        let body = match (variable, body) {
            (Some(variable), Some(body)) => {
                self.scopes.push((variable.to_string(), element));
                let bound = self.bind(body);
                self.scopes.pop();
                let bound = bound?;
                require_boolean(&bound, "lambda body")?;
                bound.node
            }
            _ => QueryNode::Constant(Literal::Boolean(true)),
        };

        let lambda = LambdaNode {
            source: Box::new(source.node),
            variable: variable.map(str::to_string),
            body: Box::new(body),
        };
        let node = match kind {
            LambdaKind::Any => QueryNode::Any(lambda),
            LambdaKind::All => QueryNode::All(lambda),
        };
        Ok(Bound::boolean(node))
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Bound, ParseError> {
        let lowered = name.to_ascii_lowercase();
        let signature = FUNCTIONS
            .iter()
            .find(|f| f.name == lowered)
            .ok_or_else(|| ParseError::UnknownFunction {
                name: name.to_string(),
            })?;
        if args.len() < signature.min_args || args.len() > signature.max_args {
            return Err(ParseError::ArgumentCount {
                function: signature.name.to_string(),
                min: signature.min_args,
                max: signature.max_args,
                found: args.len(),
            });
        }

        let mut parameters = Vec::with_capacity(args.len());
        let mut first_type = None;
        for (idx, arg) in args.iter().enumerate() {
            let bound = self.bind(arg)?;
            if idx < signature.string_args {
                match &bound.ty {
                    None | Some(EdmType::Primitive(PrimitiveKind::String)) => {}
                    other => {
                        return Err(ParseError::ArgumentType {
                            function: signature.name.to_string(),
                            index: idx + 1,
                            found: describe(other),
                        })
                    }
                }
            }
            if idx == 0 {
                first_type = bound.ty.clone();
            }
            parameters.push(bound.node);
        }

        let ty = match signature.returns {
            Returns::Fixed(kind) => Some(EdmType::Primitive(kind)),
            Returns::SameAsFirst => first_type,
        };
        let node = QueryNode::FunctionCall {
            name: signature.name.to_string(),
            parameters,
        };
        Ok(Bound::new(node, ty))
    }

    fn unary(&mut self, op: UnaryOperatorKind, operand: &Expr) -> Result<Bound, ParseError> {
        let operand = self.bind(operand)?;
        let ty = match op {
            UnaryOperatorKind::Not => {
                require_boolean(&operand, "operand of 'not'")?;
                Some(EdmType::boolean())
            }
            UnaryOperatorKind::Negate => match &operand.ty {
                None => None,
                Some(EdmType::Primitive(kind))
                    if kind.is_numeric() || *kind == PrimitiveKind::Duration =>
                {
                    operand.ty.clone()
                }
                other => {
                    return Err(ParseError::incompatible(
                        op.symbol(),
                        describe(other),
                        "a numeric operand",
                    ))
                }
            },
        };
        let node = QueryNode::UnaryOperator {
            op,
            operand: Box::new(operand.node),
        };
        Ok(Bound::new(node, ty))
    }

    fn binary(
        &mut self,
        op: BinaryOperatorKind,
        left: &Expr,
        right: &Expr,
    ) -> Result<Bound, ParseError> {
        // Left-associated chains (`a or b or c`) are folded in a loop so their
        // length does not count as nesting.
        let mut steps = vec![(op, right)];
        let mut leftmost = left;
        while let Expr::Binary { op, left, right } = leftmost {
            steps.push((*op, right.as_ref()));
            leftmost = left.as_ref();
        }

        let mut bound = self.bind(leftmost)?;
        for (op, right) in steps.into_iter().rev() {
            let right = self.bind(right)?;
            bound = self.combine(op, bound, right)?;
        }
        Ok(bound)
    }

    fn combine(&self, op: BinaryOperatorKind, left: Bound, right: Bound) -> Result<Bound, ParseError> {
        if op.is_logical() {
            require_boolean(&left, "operand of a logical operator")?;
            require_boolean(&right, "operand of a logical operator")?;
            return Ok(Bound::boolean(QueryNode::binary(op, left.node, right.node)));
        }

        if op == BinaryOperatorKind::Has {
            let enum_name = match &left.ty {
                Some(EdmType::Enum(name)) => name.clone(),
                other => {
                    return Err(ParseError::incompatible(
                        op.symbol(),
                        describe(other),
                        describe(&right.ty),
                    ))
                }
            };
            let right = self.coerce_to_enum(right, &enum_name, op.symbol())?;
            return Ok(Bound::boolean(QueryNode::binary(op, left.node, right)));
        }

        if op.is_arithmetic() {
            return self.arithmetic(op, left, right);
        }

        let (left, right) = self.unify(op.symbol(), left, right)?;
        Ok(Bound::boolean(QueryNode::binary(op, left, right)))
    }

    /// Makes two comparison operands type-compatible.
    fn unify(
        &self,
        operator: &str,
        left: Bound,
        right: Bound,
    ) -> Result<(QueryNode, QueryNode), ParseError> {
        let (lt, rt) = match (&left.ty, &right.ty) {
            (None, _) | (_, None) => return Ok((left.node, right.node)),
            (Some(lt), Some(rt)) => (lt.clone(), rt.clone()),
        };
        match (&lt, &rt) {
            (EdmType::Enum(name), EdmType::Primitive(PrimitiveKind::String)) => {
                let right = self.coerce_to_enum(right, name, operator)?;
                Ok((left.node, right))
            }
            (EdmType::Primitive(PrimitiveKind::String), EdmType::Enum(name)) => {
                let left = self.coerce_to_enum(left, name, operator)?;
                Ok((left, right.node))
            }
            (EdmType::Enum(a), EdmType::Enum(b)) if a == b => Ok((left.node, right.node)),
            (EdmType::Primitive(a), EdmType::Primitive(b)) if a == b => Ok((left.node, right.node)),
            (EdmType::Primitive(a), EdmType::Primitive(b)) => match (a.numeric_rank(), b.numeric_rank()) {
                (Some(ra), Some(rb)) if ra < rb => Ok((convert(left.node, *b), right.node)),
                (Some(_), Some(_)) => Ok((left.node, convert(right.node, *a))),
                _ => Err(ParseError::incompatible(operator, lt, rt)),
            },
            _ => Err(ParseError::incompatible(operator, lt, rt)),
        }
    }

    fn arithmetic(
        &self,
        op: BinaryOperatorKind,
        left: Bound,
        right: Bound,
    ) -> Result<Bound, ParseError> {
        use PrimitiveKind::{Date, DateTimeOffset, Duration};

        let additive = matches!(op, BinaryOperatorKind::Add | BinaryOperatorKind::Subtract);
        let incompatible = || ParseError::incompatible(op.symbol(), describe(&left.ty), describe(&right.ty));
        let (lk, rk) = match (left.ty.as_ref(), right.ty.as_ref()) {
            (None, None) => return Ok(Bound::new(QueryNode::binary(op, left.node, right.node), None)),
            (None, Some(ty)) | (Some(ty), None) => {
                let ty = ty.clone();
                if !ty.primitive().map_or(false, |k| k.is_numeric() || k == Duration) {
                    return Err(incompatible());
                }
                return Ok(Bound::new(QueryNode::binary(op, left.node, right.node), Some(ty)));
            }
            (Some(lt), Some(rt)) => match (lt.primitive(), rt.primitive()) {
                (Some(lk), Some(rk)) => (lk, rk),
                _ => return Err(incompatible()),
            },
        };

        let result = match (lk.numeric_rank(), rk.numeric_rank()) {
            (Some(ra), Some(rb)) if ra < rb => {
                let node = QueryNode::binary(op, convert(left.node, rk), right.node);
                return Ok(Bound::new(node, Some(EdmType::Primitive(rk))));
            }
            (Some(ra), Some(rb)) if ra > rb => {
                let node = QueryNode::binary(op, left.node, convert(right.node, lk));
                return Ok(Bound::new(node, Some(EdmType::Primitive(lk))));
            }
            (Some(_), Some(_)) => lk,
            _ => match (lk, rk) {
                (DateTimeOffset | Date, Duration) if additive => lk,
                (Duration, Duration) if additive => Duration,
                (DateTimeOffset, DateTimeOffset) if op == BinaryOperatorKind::Subtract => Duration,
                _ => return Err(incompatible()),
            },
        };
        let node = QueryNode::binary(op, left.node, right.node);
        Ok(Bound::new(node, Some(EdmType::Primitive(result))))
    }

    fn coerce_to_enum(
        &self,
        bound: Bound,
        enum_name: &str,
        operator: &str,
    ) -> Result<QueryNode, ParseError> {
        if let QueryNode::Constant(Literal::String(member)) = bound.node.unwrap_convert() {
            let element = self
                .schema
                .enum_type(enum_name)
                .ok_or_else(|| ParseError::UnknownType {
                    name: enum_name.to_string(),
                })?;
            return self.enum_constant(element, member).map(QueryNode::Constant);
        }
        match &bound.ty {
            None => Ok(bound.node),
            Some(EdmType::Enum(name)) if name == enum_name => Ok(bound.node),
            other => Err(ParseError::incompatible(operator, enum_name, describe(other))),
        }
    }

    fn in_list(&mut self, left: &Expr, right: &Expr) -> Result<Bound, ParseError> {
        let subject = self.bind(left)?;
        if let Some(ty @ EdmType::Collection(_)) = &subject.ty {
            return Err(ParseError::incompatible("in", ty, "a collection"));
        }

        let items = match right {
            Expr::List(items) => items.as_slice(),
            Expr::Literal(_) => std::slice::from_ref(right),
            other => {
                let candidates = self.bind(other)?;
                return match candidates.ty {
                    Some(EdmType::Collection(_)) => Ok(Bound::boolean(QueryNode::In {
                        left: Box::new(subject.node),
                        right: Box::new(candidates.node),
                    })),
                    ty => Err(ParseError::InvalidInOperand {
                        found: describe(&ty),
                    }),
                };
            }
        };

        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            let bound = self.bind(item)?;
            nodes.push(self.coerce_item(&subject.ty, bound)?);
        }
        Ok(Bound::boolean(QueryNode::In {
            left: Box::new(subject.node),
            right: Box::new(QueryNode::CollectionConstant(nodes)),
        }))
    }

    fn coerce_item(&self, subject: &Option<EdmType>, item: Bound) -> Result<QueryNode, ParseError> {
        match (subject, &item.ty) {
            (None, _) | (_, None) => Ok(item.node),
            (Some(EdmType::Enum(name)), _) => self.coerce_to_enum(item, name, "in"),
            (Some(EdmType::Primitive(a)), Some(EdmType::Primitive(b))) if a == b => Ok(item.node),
            (Some(EdmType::Primitive(a)), Some(EdmType::Primitive(b)))
                if a.is_numeric() && b.is_numeric() =>
            {
                Ok(convert(item.node, *a))
            }
            (Some(lt), Some(rt)) => Err(ParseError::incompatible("in", lt, rt)),
        }
    }
}
