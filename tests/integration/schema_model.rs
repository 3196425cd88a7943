//! Schema assembly, JSON loading, and lookups as seen by filter binding.

#![allow(missing_docs)]

#[path = "../support/mod.rs"]
mod support;

use odata_filter::schema::{EdmType, ElementKind, PrimitiveKind, SchemaBuilder, StructuredType};
use odata_filter::{FilterTree, FilterValidator, SchemaError, SchemaModel};
use support::{user_schema, User};

const SHOP: &str = r#"{
    "elements": [
        {"namespace": "Shop", "name": "Tier", "kind": "enumType", "members": ["Basic", "Gold"]},
        {"namespace": "Shop", "name": "Address", "kind": "complexType",
         "properties": [{"name": "city", "type": {"primitive": "string"}}]},
        {"namespace": "Shop", "name": "Item", "kind": "entityType", "key": ["id"], "open": true,
         "properties": [
            {"name": "id", "type": {"primitive": "int64"}},
            {"name": "price", "type": {"primitive": "decimal"}},
            {"name": "tier", "type": {"enum": "Tier"}},
            {"name": "shipTo", "type": {"complex": "Address"}},
            {"name": "tags", "type": {"collection": {"primitive": "string"}}}
         ]}
    ]
}"#;

#[test]
fn loads_and_qualifies_json_documents() {
    let schema = SchemaModel::from_json(SHOP).expect("shop schema loads");
    assert_eq!(
        schema.element_names(),
        ["Shop.Tier", "Shop.Address", "Shop.Item"]
    );

    let item = schema.structured_type("Item").expect("item");
    assert_eq!(item.kind, ElementKind::EntityType);
    assert!(item.open);
    assert_eq!(item.key, ["id"]);
    let tier = item.properties.iter().find(|p| p.name == "tier").expect("tier");
    assert_eq!(tier.ty, EdmType::enumeration("Shop.Tier"));

    let enumeration = schema.enum_type("Shop.Tier").expect("tier enum");
    assert_eq!(enumeration.find_member("gold", true), Some("Gold"));
    assert_eq!(enumeration.find_member("gold", false), None);
    assert!(schema.structured_type("Tier").is_none());
}

#[test]
fn json_schemas_bind_filters() {
    let schema = SchemaModel::from_json(SHOP).expect("shop schema loads");
    let tree = FilterTree::parse(
        "tier eq 'gold' and shipTo/city eq 'Oslo' and tags/any(t: t eq 'sale') and price gt 10",
        &schema,
        "Shop.Item",
    )
    .expect("filter binds");
    assert_eq!(
        tree.properties(),
        ["tier", "shipTo/city", "tags", "price"]
    );
}

#[test]
fn open_types_accept_dynamic_properties() {
    let schema = SchemaModel::from_json(SHOP).expect("shop schema loads");
    let tree = FilterTree::parse("color eq 'red'", &schema, "Item").expect("dynamic property");
    assert_eq!(tree.properties(), ["color"]);

    let validator =
        FilterValidator::validate_text("color eq 'red'", &schema, "Item", "eq|tier").expect("validates");
    assert_eq!(validator.details().as_deref(), Some("Property 'color' is not allowed."));

    let closed = user_schema();
    assert!(FilterTree::parse("color eq 'red'", &closed, "User").is_err());
}

#[test]
fn malformed_documents_are_rejected() {
    let cases = [
        ("not json", "SchemaJson"),
        (r#"{"elements": []}"#, "SchemaEmpty"),
        (
            r#"{"elements": [{"namespace": "A", "name": "X", "kind": "entityType",
                "properties": [{"name": "y", "type": {"complex": "Missing"}}]}]}"#,
            "UnknownTypeReference",
        ),
        (
            r#"{"elements": [
                {"namespace": "A", "name": "X", "kind": "complexType"},
                {"namespace": "A", "name": "X", "kind": "enumType", "members": ["m"]}]}"#,
            "DuplicateElement",
        ),
    ];
    for (input, code) in cases {
        let err = SchemaModel::from_json(input).expect_err(input);
        assert_eq!(err.code(), code, "{input}: {err}");
    }
}

#[test]
fn described_types_build_their_graph() {
    let schema = SchemaModel::describe::<User>().expect("user schema");
    assert_eq!(schema, user_schema());
    let user = schema.require_type("Default.User").expect("user");
    let sponsor = user.properties.iter().find(|p| p.name == "sponsor").expect("sponsor");
    assert_eq!(sponsor.ty, EdmType::entity("Default.User"));
    let logins = user
        .properties
        .iter()
        .find(|p| p.name == "socialLogins")
        .expect("socialLogins");
    assert_eq!(
        logins.ty.element_type(),
        Some(&EdmType::complex("Default.SocialLogin"))
    );
}

#[test]
fn enum_types_are_not_filter_roots() {
    let schema = user_schema();
    let err = schema.require_type("UserType").expect_err("enum is not structured");
    assert!(matches!(err, SchemaError::TypeNotFound { ref name, .. } if name == "UserType"));
}

#[test]
fn builder_reports_membership() {
    let builder = SchemaBuilder::new("Lab")
        .with_entity(StructuredType::new("Sample").with_property("mass", PrimitiveKind::Double));
    assert!(builder.contains("Sample"));
    assert!(builder.contains("Lab.Sample"));
    assert!(!builder.contains("Other.Sample"));
    let schema = builder.build().expect("lab schema");
    let tree = FilterTree::parse("mass ge 1.5", &schema, "Sample").expect("binds");
    assert_eq!(tree.operators(), ["ge"]);
}
