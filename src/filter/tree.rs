use tracing::debug;

use super::map::NameMap;
use super::node::{FilterNode, NodeBuilder, NodeId};
use crate::error::{FilterError, Result};
use crate::options::FilterOptions;
use crate::schema::{Describe, SchemaElement, SchemaModel};
use crate::syntax::{FilterParser, QueryNode, UriFilterParser};

/// Parsed filter expression with the operators and properties it uses.
///
/// The inventories are computed once at construction by pre-order walks of
/// the node arena; duplicates are retained so callers can count usage.
///
/// ```
/// use odata_filter::{FilterTree, SchemaModel};
/// use odata_filter::schema::{EdmType, SchemaBuilder, StructuredType};
///
/// let schema = SchemaBuilder::new("Default")
///     .with_entity(
///         StructuredType::new("User")
///             .with_key("id")
///             .with_property("id", EdmType::int32())
///             .with_property("email", EdmType::string()),
///     )
///     .build()?;
/// let tree = FilterTree::parse("email eq 'a@b.com' and id gt 5", &schema, "User")?;
/// assert_eq!(tree.operators(), ["and", "eq", "gt"]);
/// assert_eq!(tree.properties(), ["email", "id"]);
/// # Ok::<(), odata_filter::FilterError>(())
/// ```
#[derive(Clone, Debug)]
pub struct FilterTree {
    expression: String,
    ast: QueryNode,
    nodes: Vec<FilterNode>,
    schema_elements: Vec<SchemaElement>,
    operators: Vec<String>,
    properties: Vec<String>,
    property_operators: NameMap<Vec<String>>,
}

impl FilterTree {
    /// Parses `filter` against `type_name` with the built-in parser and
    /// default options.
    pub fn parse(filter: &str, schema: &SchemaModel, type_name: &str) -> Result<Self> {
        Self::parse_with(
            filter,
            schema,
            type_name,
            &UriFilterParser,
            &FilterOptions::default(),
        )
    }

    /// Parses `filter` with a caller-supplied parser and options.
    pub fn parse_with(
        filter: &str,
        schema: &SchemaModel,
        type_name: &str,
        parser: &dyn FilterParser,
        options: &FilterOptions,
    ) -> Result<Self> {
        let entity = schema.require_type(type_name)?;
        if filter.trim().is_empty() {
            return Err(FilterError::EmptyFilter);
        }
        let ast = parser
            .parse_filter(filter, schema, entity, options)
            .map_err(|source| FilterError::Parse {
                filter: filter.to_string(),
                source,
            })?;
        Self::from_ast(filter, ast, schema, options)
    }

    /// Describes `T` and parses `filter` against its entity type.
    pub fn of<T: Describe>(filter: &str) -> Result<Self> {
        let schema = SchemaModel::describe::<T>()?;
        Self::parse(filter, &schema, T::TYPE_NAME)
    }

    /// Builds a tree from an already bound AST.
    pub fn from_ast(
        filter: impl Into<String>,
        ast: QueryNode,
        schema: &SchemaModel,
        options: &FilterOptions,
    ) -> Result<Self> {
        let nodes = NodeBuilder::new(options.max_depth).build(&ast)?;
        let mut tree = FilterTree {
            expression: filter.into(),
            ast,
            nodes,
            schema_elements: schema.elements().to_vec(),
            operators: Vec::new(),
            properties: Vec::new(),
            property_operators: NameMap::new(),
        };
        tree.collect_inventories();
        debug!(
            nodes = tree.nodes.len(),
            operators = tree.operators.len(),
            properties = tree.properties.len(),
            "filter.tree.built"
        );
        Ok(tree)
    }

    fn collect_inventories(&mut self) {
        let mut operators = Vec::new();
        let mut properties = Vec::new();
        let mut property_operators: NameMap<Vec<String>> = NameMap::new();

        for node in self.pre_order() {
            if let Some(name) = node.operator_name() {
                operators.push(name.to_string());
                continue;
            }
            let Some(property) = node.property() else {
                continue;
            };
            properties.push(property.to_string());
            let used = property_operators.get_or_insert_with(property, Vec::new);
            for ancestor in self.ancestors(node.id()) {
                match ancestor.operator_name() {
                    Some(name) if ancestor.is_operator() => used.push(name.to_string()),
                    _ => break,
                }
            }
        }

        self.operators = operators;
        self.properties = properties;
        self.property_operators = property_operators;
    }

    /// Nodes in pre-order: node, then left subtree, then right subtree.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root().id()],
        }
    }

    /// Original filter text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Bound AST the tree was built from.
    pub fn ast(&self) -> &QueryNode {
        &self.ast
    }

    /// Root node.
    pub fn root(&self) -> &FilterNode {
        &self.nodes[0]
    }

    /// All nodes in construction (pre-order) order.
    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// Node by handle.
    pub fn node(&self, id: NodeId) -> Option<&FilterNode> {
        self.nodes.get(id.index())
    }

    /// First child of `node`.
    pub fn left(&self, node: &FilterNode) -> Option<&FilterNode> {
        node.left().and_then(|id| self.node(id))
    }

    /// Second child of `node`.
    pub fn right(&self, node: &FilterNode) -> Option<&FilterNode> {
        node.right().and_then(|id| self.node(id))
    }

    /// Parent of `node`.
    pub fn parent(&self, node: &FilterNode) -> Option<&FilterNode> {
        node.parent().and_then(|id| self.node(id))
    }

    /// Ancestors of `id`, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &FilterNode> + '_ {
        let mut next = self.node(id).and_then(|n| n.parent());
        std::iter::from_fn(move || {
            let node = self.node(next?)?;
            next = node.parent();
            Some(node)
        })
    }

    /// Schema elements the filter was bound against.
    pub fn schema_elements(&self) -> &[SchemaElement] {
        &self.schema_elements
    }

    /// Operator names in pre-order, duplicates retained.
    pub fn operators(&self) -> &[String] {
        &self.operators
    }

    /// Property paths in pre-order, duplicates retained.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Enclosing operators of each property, innermost first.
    pub fn property_operators(&self) -> &NameMap<Vec<String>> {
        &self.property_operators
    }

    /// Operators applied to `property` (case-insensitive); empty when unused.
    pub fn operators_for(&self, property: &str) -> &[String] {
        self.property_operators
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Pre-order iterator over a [`FilterTree`].
pub struct PreOrder<'a> {
    tree: &'a FilterTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a FilterNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.tree.node(self.stack.pop()?)?;
        if let Some(right) = node.right() {
            self.stack.push(right);
        }
        if let Some(left) = node.left() {
            self.stack.push(left);
        }
        Some(node)
    }
}
