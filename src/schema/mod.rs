//! Typed schema model that filter expressions are bound against.
//!
//! A [`SchemaModel`] is a flat list of named elements (entity types, complex
//! types, and enumerations) whose properties reference each other by qualified
//! name. Models are assembled with [`SchemaBuilder`], loaded from JSON, or
//! produced by a Rust type implementing [`Describe`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Namespace used when a [`Describe`] implementation does not pick one.
pub const DEFAULT_NAMESPACE: &str = "Default";

/// Primitive scalar kinds understood by the binder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    /// `Edm.Boolean`.
    Boolean,
    /// `Edm.Byte`.
    Byte,
    /// `Edm.Int16`.
    Int16,
    /// `Edm.Int32`.
    Int32,
    /// `Edm.Int64`.
    Int64,
    /// `Edm.Single`.
    Single,
    /// `Edm.Double`.
    Double,
    /// `Edm.Decimal`.
    Decimal,
    /// `Edm.String`.
    String,
    /// `Edm.Guid`.
    Guid,
    /// `Edm.Date`.
    Date,
    /// `Edm.TimeOfDay`.
    TimeOfDay,
    /// `Edm.DateTimeOffset`.
    DateTimeOffset,
    /// `Edm.Duration`.
    Duration,
}

impl PrimitiveKind {
    /// Qualified EDM name, e.g. `Edm.Int32`.
    pub fn edm_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::Byte => "Edm.Byte",
            PrimitiveKind::Int16 => "Edm.Int16",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Int64 => "Edm.Int64",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Decimal => "Edm.Decimal",
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::Guid => "Edm.Guid",
            PrimitiveKind::Date => "Edm.Date",
            PrimitiveKind::TimeOfDay => "Edm.TimeOfDay",
            PrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveKind::Duration => "Edm.Duration",
        }
    }

    /// Promotion rank for numeric kinds; `None` for everything else.
    pub fn numeric_rank(self) -> Option<u8> {
        match self {
            PrimitiveKind::Byte => Some(0),
            PrimitiveKind::Int16 => Some(1),
            PrimitiveKind::Int32 => Some(2),
            PrimitiveKind::Int64 => Some(3),
            PrimitiveKind::Decimal => Some(4),
            PrimitiveKind::Single => Some(5),
            PrimitiveKind::Double => Some(6),
            _ => None,
        }
    }

    /// Returns true for integral and floating point kinds.
    pub fn is_numeric(self) -> bool {
        self.numeric_rank().is_some()
    }
}

/// Type reference attached to a property.
///
/// Enum, complex, and entity references carry the element name. After
/// [`SchemaBuilder::build`] every name is namespace-qualified.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdmType {
    /// Scalar value.
    Primitive(PrimitiveKind),
    /// Enumeration declared in the schema.
    Enum(String),
    /// Complex (keyless, structured) type.
    Complex(String),
    /// Entity type; a property of this type is a navigation property.
    Entity(String),
    /// Collection of the inner type.
    Collection(Box<EdmType>),
}

impl EdmType {
    /// `Edm.String`.
    pub fn string() -> Self {
        EdmType::Primitive(PrimitiveKind::String)
    }

    /// `Edm.Boolean`.
    pub fn boolean() -> Self {
        EdmType::Primitive(PrimitiveKind::Boolean)
    }

    /// `Edm.Int32`.
    pub fn int32() -> Self {
        EdmType::Primitive(PrimitiveKind::Int32)
    }

    /// `Edm.Int64`.
    pub fn int64() -> Self {
        EdmType::Primitive(PrimitiveKind::Int64)
    }

    /// `Edm.Double`.
    pub fn double() -> Self {
        EdmType::Primitive(PrimitiveKind::Double)
    }

    /// `Edm.Decimal`.
    pub fn decimal() -> Self {
        EdmType::Primitive(PrimitiveKind::Decimal)
    }

    /// `Edm.DateTimeOffset`.
    pub fn date_time_offset() -> Self {
        EdmType::Primitive(PrimitiveKind::DateTimeOffset)
    }

    /// Reference to an enumeration.
    pub fn enumeration(name: impl Into<String>) -> Self {
        EdmType::Enum(name.into())
    }

    /// Reference to a complex type.
    pub fn complex(name: impl Into<String>) -> Self {
        EdmType::Complex(name.into())
    }

    /// Reference to an entity type.
    pub fn entity(name: impl Into<String>) -> Self {
        EdmType::Entity(name.into())
    }

    /// Collection of `inner`.
    pub fn collection(inner: EdmType) -> Self {
        EdmType::Collection(Box::new(inner))
    }

    /// Element type of a collection, or `None` for single-valued types.
    pub fn element_type(&self) -> Option<&EdmType> {
        match self {
            EdmType::Collection(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns the primitive kind when this is a primitive type.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            EdmType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Returns true for complex and entity types.
    pub fn is_structured(&self) -> bool {
        matches!(self, EdmType::Complex(_) | EdmType::Entity(_))
    }

    /// Returns true when the type is `Edm.Boolean`.
    pub fn is_boolean(&self) -> bool {
        matches!(self, EdmType::Primitive(PrimitiveKind::Boolean))
    }
}

impl From<PrimitiveKind> for EdmType {
    fn from(kind: PrimitiveKind) -> Self {
        EdmType::Primitive(kind)
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdmType::Primitive(kind) => f.write_str(kind.edm_name()),
            EdmType::Enum(name) | EdmType::Complex(name) | EdmType::Entity(name) => {
                f.write_str(name)
            }
            EdmType::Collection(inner) => write!(f, "Collection({inner})"),
        }
    }
}

/// Declared member of a structured type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Queryable property name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: EdmType,
}

/// Kind of a top-level schema element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    /// Keyed structured type.
    EntityType,
    /// Keyless structured type.
    ComplexType,
    /// Enumeration.
    EnumType,
}

impl ElementKind {
    fn describe(self) -> &'static str {
        match self {
            ElementKind::EntityType => "entity type",
            ElementKind::ComplexType => "complex type",
            ElementKind::EnumType => "enum type",
        }
    }
}

/// Outcome of a property lookup on a structured element.
#[derive(Debug, PartialEq, Eq)]
pub enum PropertyMatch<'a> {
    /// Exactly one property matched.
    Found(&'a PropertyDef),
    /// No property matched.
    Missing,
    /// Several properties differ only by case.
    Ambiguous,
}

/// Named element of a schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaElement {
    /// Namespace the element belongs to.
    pub namespace: String,
    /// Unqualified element name.
    pub name: String,
    /// Element kind.
    pub kind: ElementKind,
    /// Key property names (entity types only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key: Vec<String>,
    /// Declared properties (structured types only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDef>,
    /// Member names (enum types only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    /// Open types accept undeclared (dynamic) properties.
    #[serde(default)]
    pub open: bool,
}

impl SchemaElement {
    /// Namespace-qualified name, e.g. `Default.User`.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns true for entity and complex types.
    pub fn is_structured(&self) -> bool {
        matches!(self.kind, ElementKind::EntityType | ElementKind::ComplexType)
    }

    fn matches_name(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        name.strip_suffix(self.name.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .map_or(false, |ns| ns == self.namespace)
    }

    /// Looks up a declared property. An exact match always wins; otherwise,
    /// when `case_insensitive` is set, a unique case-insensitive match is used.
    pub fn find_property(&self, name: &str, case_insensitive: bool) -> PropertyMatch<'_> {
        if let Some(prop) = self.properties.iter().find(|p| p.name == name) {
            return PropertyMatch::Found(prop);
        }
        if !case_insensitive {
            return PropertyMatch::Missing;
        }
        let mut candidates = self
            .properties
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name));
        match (candidates.next(), candidates.next()) {
            (Some(prop), None) => PropertyMatch::Found(prop),
            (Some(_), Some(_)) => PropertyMatch::Ambiguous,
            (None, _) => PropertyMatch::Missing,
        }
    }

    /// Resolves an enum member name to its declared spelling.
    pub fn find_member(&self, name: &str, case_insensitive: bool) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.as_str() == name)
            .or_else(|| {
                case_insensitive
                    .then(|| self.members.iter().find(|m| m.eq_ignore_ascii_case(name)))
                    .flatten()
            })
            .map(String::as_str)
    }
}

/// Keyed or keyless structured type under construction.
#[derive(Clone, Debug, Default)]
pub struct StructuredType {
    name: String,
    key: Vec<String>,
    properties: Vec<PropertyDef>,
    open: bool,
}

impl StructuredType {
    /// Starts a new type with the given unqualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a key property name.
    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        self.key.push(name.into());
        self
    }

    /// Declares a property.
    pub fn with_property(mut self, name: impl Into<String>, ty: impl Into<EdmType>) -> Self {
        self.properties.push(PropertyDef {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Marks the type as open.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    fn into_element(self, namespace: &str, kind: ElementKind) -> SchemaElement {
        SchemaElement {
            namespace: namespace.to_owned(),
            name: self.name,
            kind,
            key: self.key,
            properties: self.properties,
            members: Vec::new(),
            open: self.open,
        }
    }
}

/// Fluent builder for [`SchemaModel`].
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    namespace: String,
    elements: Vec<SchemaElement>,
}

impl SchemaBuilder {
    /// Creates a builder that places new elements in `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            elements: Vec::new(),
        }
    }

    /// Registers an entity type.
    pub fn with_entity(mut self, ty: StructuredType) -> Self {
        self.elements
            .push(ty.into_element(&self.namespace, ElementKind::EntityType));
        self
    }

    /// Registers a complex type.
    pub fn with_complex(mut self, ty: StructuredType) -> Self {
        self.elements
            .push(ty.into_element(&self.namespace, ElementKind::ComplexType));
        self
    }

    /// Registers an enumeration with its members in declaration order.
    pub fn with_enum<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elements.push(SchemaElement {
            namespace: self.namespace.clone(),
            name: name.into(),
            kind: ElementKind::EnumType,
            key: Vec::new(),
            properties: Vec::new(),
            members: members.into_iter().map(Into::into).collect(),
            open: false,
        });
        self
    }

    /// Returns true when an element with this (short or qualified) name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.elements.iter().any(|e| e.matches_name(name))
    }

    /// Validates references and produces the model.
    pub fn build(self) -> Result<SchemaModel, SchemaError> {
        SchemaModel::from_elements(self.elements)
    }
}

/// Validated schema: every type reference points at an element of the right kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaModel {
    elements: Vec<SchemaElement>,
}

#[derive(Deserialize)]
struct SchemaDocument {
    elements: Vec<SchemaElement>,
}

impl SchemaModel {
    /// Builds the schema for a type implementing [`Describe`].
    pub fn describe<T: Describe>() -> Result<Self, SchemaError> {
        T::describe(SchemaBuilder::new(T::NAMESPACE)).build()
    }

    /// Loads a schema from a JSON document of the form `{"elements": [...]}`.
    pub fn from_json(input: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDocument = serde_json::from_str(input)?;
        Self::from_elements(doc.elements)
    }

    fn from_elements(mut elements: Vec<SchemaElement>) -> Result<Self, SchemaError> {
        if elements.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut index: HashMap<String, ElementKind> = HashMap::with_capacity(elements.len());
        for element in &elements {
            if index.insert(element.full_name(), element.kind).is_some() {
                return Err(SchemaError::DuplicateElement {
                    name: element.full_name(),
                });
            }
        }
        let catalog: Vec<(String, String, ElementKind)> = elements
            .iter()
            .map(|e| (e.full_name(), e.name.clone(), e.kind))
            .collect();

        for element in &mut elements {
            let owner = element.full_name();
            for prop in &mut element.properties {
                qualify(&mut prop.ty, &catalog).map_err(|(target, expected)| {
                    SchemaError::UnknownTypeReference {
                        owner: owner.clone(),
                        property: prop.name.clone(),
                        target,
                        expected: expected.describe(),
                    }
                })?;
            }
        }
        Ok(Self { elements })
    }

    /// All elements in registration order.
    pub fn elements(&self) -> &[SchemaElement] {
        &self.elements
    }

    /// Qualified names of all elements.
    pub fn element_names(&self) -> Vec<String> {
        self.elements.iter().map(SchemaElement::full_name).collect()
    }

    /// Finds an element by qualified name, falling back to the unqualified name.
    pub fn find_type(&self, name: &str) -> Option<&SchemaElement> {
        self.elements.iter().find(|e| e.matches_name(name))
    }

    /// Finds a structured (entity or complex) element.
    pub fn structured_type(&self, name: &str) -> Option<&SchemaElement> {
        self.find_type(name).filter(|e| e.is_structured())
    }

    /// Finds an enumeration element.
    pub fn enum_type(&self, name: &str) -> Option<&SchemaElement> {
        self.find_type(name).filter(|e| e.kind == ElementKind::EnumType)
    }

    /// Resolves `type_name` or reports the elements that were available.
    pub fn require_type(&self, type_name: &str) -> Result<&SchemaElement, SchemaError> {
        self.structured_type(type_name)
            .ok_or_else(|| SchemaError::TypeNotFound {
                name: type_name.to_owned(),
                available: self.element_names(),
            })
    }
}

fn qualify(
    ty: &mut EdmType,
    catalog: &[(String, String, ElementKind)],
) -> Result<(), (String, ElementKind)> {
    let (name, expected) = match ty {
        EdmType::Primitive(_) => return Ok(()),
        EdmType::Collection(inner) => return qualify(inner, catalog),
        EdmType::Enum(name) => (name, ElementKind::EnumType),
        EdmType::Complex(name) => (name, ElementKind::ComplexType),
        EdmType::Entity(name) => (name, ElementKind::EntityType),
    };
    let found = catalog
        .iter()
        .find(|(full, _, kind)| *kind == expected && full.as_str() == name.as_str())
        .or_else(|| {
            catalog
                .iter()
                .find(|(_, short, kind)| *kind == expected && short.as_str() == name.as_str())
        });
    match found {
        Some((full, _, _)) => {
            *name = full.clone();
            Ok(())
        }
        None => Err((name.clone(), expected)),
    }
}

/// Rust types that can describe themselves as a schema entity type.
///
/// ```
/// use odata_filter::schema::{Describe, EdmType, SchemaBuilder, StructuredType};
///
/// struct Product;
///
/// impl Describe for Product {
///     const TYPE_NAME: &'static str = "Product";
///
///     fn describe(builder: SchemaBuilder) -> SchemaBuilder {
///         builder.with_entity(
///             StructuredType::new("Product")
///                 .with_key("id")
///                 .with_property("id", EdmType::int32())
///                 .with_property("title", EdmType::string()),
///         )
///     }
/// }
/// ```
pub trait Describe {
    /// Namespace the type registers its elements under.
    const NAMESPACE: &'static str = DEFAULT_NAMESPACE;
    /// Name (short or qualified) of the entity type filters are bound against.
    const TYPE_NAME: &'static str;

    /// Registers the type, and every type reachable from it, with `builder`.
    fn describe(builder: SchemaBuilder) -> SchemaBuilder;
}
