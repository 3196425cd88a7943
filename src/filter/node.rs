use std::fmt;

use crate::error::{FilterError, Result};
use crate::syntax::{BinaryOperatorKind, Literal, QueryNode, UnaryOperatorKind};

/// Index of a node in its tree's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of the node.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification of a normalized node, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// `not` or arithmetic negation.
    UnaryOperator(UnaryOperatorKind),
    /// Logical, comparison, arithmetic, or `has` operator.
    BinaryOperator(BinaryOperatorKind),
    /// Built-in function call (canonical lowercase name).
    FunctionCall(String),
    /// `in`
    In,
    /// `any` quantifier.
    Any,
    /// `all` quantifier.
    All,
    /// Literal value.
    Constant,
    /// Primitive or enum property.
    PropertyAccess,
    /// Dynamic property of an open type.
    OpenPropertyAccess,
    /// Single complex property.
    ComplexAccess,
    /// Single navigation property.
    NavigationAccess,
    /// Collection-valued property.
    CollectionAccess,
    /// `$it` or a lambda variable.
    RangeVariable,
    /// Argument list of a function call.
    Parameters,
    /// Literal list on the right of `in`.
    ConstantList,
}

impl NodeKind {
    fn of(node: &QueryNode) -> Self {
        match node {
            QueryNode::Constant(_) => NodeKind::Constant,
            QueryNode::Convert { source, .. } => NodeKind::of(source),
            QueryNode::UnaryOperator { op, .. } => NodeKind::UnaryOperator(*op),
            QueryNode::BinaryOperator { op, .. } => NodeKind::BinaryOperator(*op),
            QueryNode::FunctionCall { name, .. } => NodeKind::FunctionCall(name.to_ascii_lowercase()),
            QueryNode::In { .. } => NodeKind::In,
            QueryNode::Any(_) => NodeKind::Any,
            QueryNode::All(_) => NodeKind::All,
            QueryNode::PropertyAccess { .. } => NodeKind::PropertyAccess,
            QueryNode::OpenPropertyAccess { .. } => NodeKind::OpenPropertyAccess,
            QueryNode::SingleComplex { .. } => NodeKind::ComplexAccess,
            QueryNode::SingleNavigation { .. } => NodeKind::NavigationAccess,
            QueryNode::CollectionPropertyAccess { .. }
            | QueryNode::CollectionComplex { .. }
            | QueryNode::CollectionNavigation { .. } => NodeKind::CollectionAccess,
            QueryNode::CollectionConstant(_) => NodeKind::ConstantList,
            QueryNode::RangeVariable { .. } => NodeKind::RangeVariable,
        }
    }

    /// Returns true for operators, function calls, `in`, and quantifiers.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            NodeKind::UnaryOperator(_)
                | NodeKind::BinaryOperator(_)
                | NodeKind::FunctionCall(_)
                | NodeKind::In
                | NodeKind::Any
                | NodeKind::All
        )
    }

    /// Name reported in operator inventories; `None` for operands.
    pub fn operator_name(&self) -> Option<String> {
        let name = match self {
            NodeKind::UnaryOperator(op) => op.symbol(),
            NodeKind::BinaryOperator(op) => op.symbol(),
            NodeKind::FunctionCall(name) => return Some(name.clone()),
            NodeKind::In => "in",
            NodeKind::Any => "any",
            NodeKind::All => "all",
            _ => return None,
        };
        Some(name.to_string())
    }

    fn names_property(&self) -> bool {
        matches!(
            self,
            NodeKind::PropertyAccess
                | NodeKind::OpenPropertyAccess
                | NodeKind::ComplexAccess
                | NodeKind::RangeVariable
        )
    }
}

/// One position of a normalized filter tree.
///
/// Nodes are owned by [`crate::FilterTree`]; `parent`, `left`, and `right`
/// are arena handles resolved through the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterNode {
    id: NodeId,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    level: usize,
    kind: NodeKind,
    path_prefix: Option<String>,
    operator_name: Option<String>,
    operands: Option<Vec<String>>,
    property: Option<String>,
    text: String,
}

impl FilterNode {
    /// Arena handle of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Enclosing node; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// First child.
    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    /// Second child of binary operators and `in`.
    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    /// Distance from the root, which is level 0.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Node classification.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Collection path inherited from the enclosing `any`/`all`.
    pub fn path_prefix(&self) -> Option<&str> {
        self.path_prefix.as_deref()
    }

    /// Canonical operator name, for operator nodes.
    pub fn operator_name(&self) -> Option<&str> {
        self.operator_name.as_deref()
    }

    /// Rendered operand values, for operand nodes.
    pub fn operands(&self) -> Option<&[String]> {
        self.operands.as_deref()
    }

    /// Property path referenced by this node.
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Text form of the underlying expression.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// See [`NodeKind::is_operator`].
    pub fn is_operator(&self) -> bool {
        self.kind.is_operator()
    }

    /// Returns true for every non-operator node.
    pub fn is_operand(&self) -> bool {
        !self.is_operator()
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Resolves the slash-separated property path of a member access or range
/// variable, prepending `prefix` when one is set.
///
/// Returns `None` for nodes that do not reference a property.
pub fn resolve_path(node: &QueryNode, prefix: Option<&str>) -> Option<String> {
    let prefix = prefix.filter(|p| !p.is_empty());
    let node = node.unwrap_convert();
    if let QueryNode::RangeVariable { name, .. } = node {
        return Some(prefix.unwrap_or(name).to_string());
    }

    let mut segments = vec![node.member_name()?];
    let mut current = node.source();
    while let Some(source) = current.map(QueryNode::unwrap_convert) {
        match source {
            QueryNode::SingleComplex { property, .. } | QueryNode::SingleNavigation { property, .. }
                if !property.is_empty() =>
            {
                segments.push(property);
                current = source.source();
            }
            _ => break,
        }
    }
    segments.reverse();
    let path = segments.join("/");

    Some(match prefix {
        Some(prefix) => format!("{prefix}/{path}"),
        None => path,
    })
}

/// Renders a leaf the way it is reported in operand lists.
pub fn render_operand(node: &QueryNode, prefix: Option<&str>) -> String {
    let node = node.unwrap_convert();
    match node {
        QueryNode::Constant(Literal::Null) => "null".to_string(),
        QueryNode::Constant(Literal::String(value)) => format!("\"{value}\""),
        QueryNode::Constant(Literal::Enum { member, .. }) => format!("'{member}'"),
        QueryNode::Constant(value) => value.scalar_text(),
        other => resolve_path(other, prefix).unwrap_or_else(|| other.to_string()),
    }
}

enum Source<'a> {
    Node(&'a QueryNode),
    Parameters(&'a [QueryNode]),
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Node waiting to be added to the arena.
struct Pending<'a> {
    source: Source<'a>,
    parent: Option<(NodeId, Side)>,
    prefix: Option<String>,
    /// Nesting of the node; runs of left-associated binary operators share one level.
    nesting: usize,
}

/// Flattens a bound AST into an arena of [`FilterNode`]s.
///
/// Nodes are produced from an explicit work stack, so long operator chains
/// cost heap space rather than call stack.
pub(crate) struct NodeBuilder {
    nodes: Vec<FilterNode>,
    max_depth: usize,
}

impl NodeBuilder {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_depth,
        }
    }

    /// Builds the arena in pre-order; the root is always `NodeId` 0.
    pub(crate) fn build(mut self, root: &QueryNode) -> Result<Vec<FilterNode>> {
        let mut pending = vec![Pending {
            source: Source::Node(root),
            parent: None,
            prefix: None,
            nesting: 0,
        }];
        while let Some(item) = pending.pop() {
            if item.nesting >= self.max_depth {
                return Err(FilterError::TooDeep {
                    max: self.max_depth,
                });
            }
            let parent = item.parent;
            let (id, children) = self.push(item);
            if let Some((parent, side)) = parent {
                let entry = &mut self.nodes[parent.0];
                match side {
                    Side::Left => entry.left = Some(id),
                    Side::Right => entry.right = Some(id),
                }
            }
            // Right first so the left subtree is numbered before it.
            pending.extend(children.into_iter().rev());
        }
        Ok(self.nodes)
    }

    fn push<'a>(&mut self, item: Pending<'a>) -> (NodeId, Vec<Pending<'a>>) {
        let Pending {
            source,
            parent,
            prefix,
            nesting,
        } = item;
        let id = NodeId(self.nodes.len());
        let level = parent.map_or(0, |(p, _)| self.nodes[p.0].level + 1);
        let prefix_ref = prefix.as_deref();

        let node = match source {
            Source::Parameters(params) => {
                let operands: Vec<String> =
                    params.iter().map(|p| render_operand(p, prefix_ref)).collect();
                let property = params
                    .first()
                    .and_then(|first| resolve_path(first, prefix_ref))
                    .filter(|p| !p.is_empty());
                let text = params
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                self.nodes.push(FilterNode {
                    id,
                    parent: parent.map(|(p, _)| p),
                    left: None,
                    right: None,
                    level,
                    kind: NodeKind::Parameters,
                    path_prefix: prefix,
                    operator_name: None,
                    operands: Some(operands),
                    property,
                    text,
                });
                return (id, Vec::new());
            }
            Source::Node(node) => node.unwrap_convert(),
        };

        let kind = NodeKind::of(node);
        let operands = if kind.is_operator() {
            None
        } else if let QueryNode::CollectionConstant(items) = node {
            Some(items.iter().map(|item| render_operand(item, prefix_ref)).collect())
        } else {
            Some(vec![render_operand(node, prefix_ref)])
        };
        let property = if kind.names_property() {
            operands
                .as_ref()
                .and_then(|ops| ops.first())
                .filter(|p| !p.is_empty())
                .cloned()
        } else {
            None
        };

        let child =
            |source: Source<'a>, side: Side, prefix: Option<String>, nesting: usize| Pending {
                source,
                parent: Some((id, side)),
                prefix,
                nesting,
            };
        let children = match node {
            QueryNode::UnaryOperator { operand, .. } => {
                vec![child(Source::Node(operand), Side::Left, prefix.clone(), nesting + 1)]
            }
            QueryNode::BinaryOperator { left, right, .. } => {
                let chained = matches!(left.unwrap_convert(), QueryNode::BinaryOperator { .. });
                let left_nesting = if chained { nesting } else { nesting + 1 };
                vec![
                    child(Source::Node(left), Side::Left, prefix.clone(), left_nesting),
                    child(Source::Node(right), Side::Right, prefix.clone(), nesting + 1),
                ]
            }
            QueryNode::In { left, right } => vec![
                child(Source::Node(left), Side::Left, prefix.clone(), nesting + 1),
                child(Source::Node(right), Side::Right, prefix.clone(), nesting + 1),
            ],
            QueryNode::FunctionCall { parameters, .. } => vec![child(
                Source::Parameters(parameters),
                Side::Left,
                prefix.clone(),
                nesting + 1,
            )],
            QueryNode::Any(lambda) | QueryNode::All(lambda) => {
                let scoped = resolve_path(&lambda.source, prefix_ref).or_else(|| prefix.clone());
                vec![child(Source::Node(&lambda.body), Side::Left, scoped, nesting + 1)]
            }
            _ => Vec::new(),
        };

        self.nodes.push(FilterNode {
            id,
            parent: parent.map(|(p, _)| p),
            left: None,
            right: None,
            level,
            operator_name: kind.operator_name(),
            kind,
            path_prefix: prefix,
            operands,
            property,
            text: node.to_string(),
        });
        (id, children)
    }
}
