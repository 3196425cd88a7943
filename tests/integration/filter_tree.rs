//! Tree construction and inventory extraction over the sample `User` model.

#![allow(missing_docs)]

#[path = "../support/mod.rs"]
mod support;

use odata_filter::filter::NodeKind;
use odata_filter::schema::SchemaBuilder;
use odata_filter::syntax::{BinaryOperatorKind, Literal};
use odata_filter::{FilterError, FilterOptions, FilterTree, QueryNode, Result, UriFilterParser};
use support::{init_tracing, user_schema, User};

fn contains_all(haystack: &[String], needles: &[&str]) -> bool {
    needles
        .iter()
        .all(|needle| haystack.iter().any(|h| h.eq_ignore_ascii_case(needle)))
}

#[test]
fn extracts_operators_and_properties() -> Result<()> {
    init_tracing();
    let cases: &[(&str, &[&str], &[&str])] = &[
        ("not(null)", &["not"], &[]),
        ("not(true)", &["not"], &[]),
        ("not(enabled)", &["not"], &["enabled"]),
        ("not(sponsor/enabled)", &["not"], &["sponsor/enabled"]),
        ("not(sponsor/sponsor/enabled)", &["not"], &["sponsor/sponsor/enabled"]),
        ("email eq null", &["eq"], &["email"]),
        ("email ne 'john''s@mail.com'", &["ne"], &["email"]),
        ("email eq displayName", &["eq"], &["email", "displayName"]),
        ("contains(email, '@mail')", &["contains"], &["email"]),
        ("not contains(email, '@mail')", &["not", "contains"], &["email"]),
        ("not startsWith(email, 'john')", &["not", "startsWith"], &["email"]),
        ("endsWith(email, '.com')", &["endsWith"], &["email"]),
        ("email in ('john@mail.com', 'mary@mail.com')", &["in"], &["email"]),
        ("not (email in ('john@mail.com', 'mary@mail.com'))", &["not", "in"], &["email"]),
        ("id eq 0", &["eq"], &["id"]),
        ("id gt 1.5", &["gt"], &["id"]),
        ("id le 2000", &["le"], &["id"]),
        ("name eq null", &["eq"], &["name"]),
        ("name/givenName eq null", &["eq"], &["name/givenName"]),
        ("sponsor/name/givenName eq null", &["eq"], &["sponsor/name/givenName"]),
        ("name/surname ne sponsor/name/surname", &["ne"], &["name/surname", "sponsor/name/surname"]),
        ("name/givenName in ('John', 'Mary')", &["in"], &["name/givenName"]),
        ("type eq 'Employee'", &["eq"], &["type"]),
        ("type has 'Employee'", &["has"], &["type"]),
        ("createDate gt 2021-01-02T12:00:00Z", &["gt"], &["createDate"]),
        ("type eq 'Guest' and name/Surname eq 'Johnson'", &["eq", "and"], &["type", "name/Surname"]),
        (
            "enabled eq false and type in ('Employee', 'Contractor')",
            &["eq", "and", "in"],
            &["enabled", "type"],
        ),
        (
            "((enabled eq true) and (type eq 'Employee')) or ((email ne null) and ((type eq 'Guest') or (endsWith(email, '@mail.com'))))",
            &["eq", "and", "or", "ne", "endsWith"],
            &["enabled", "type", "email"],
        ),
        ("phoneNumbers/any(p: p eq '123-456-7890')", &["any", "eq"], &["phoneNumbers"]),
        (
            "phoneNumbers/all(p: p eq '123-456-7890' or p eq '321-456-7890')",
            &["all", "eq", "or"],
            &["phoneNumbers"],
        ),
        ("socialLogins/any(s: s/name eq 'Facebook')", &["any", "eq"], &["socialLogins/name"]),
        (
            "socialLogins/any(s: s/name eq 'Facebook' or endsWith(s/url, 'google.com'))",
            &["any", "eq", "or", "endsWith"],
            &["socialLogins/name", "socialLogins/url"],
        ),
        ("sponsor/phoneNumbers/all(p: p eq '123')", &["all", "eq"], &["sponsor/phoneNumbers"]),
        (
            "sponsor/socialLogins/any(s: s/name eq 'Facebook')",
            &["any", "eq"],
            &["sponsor/socialLogins/name"],
        ),
    ];

    for (filter, operators, properties) in cases {
        let tree = FilterTree::of::<User>(filter)?;
        assert_eq!(tree.expression(), *filter);
        assert!(
            contains_all(tree.operators(), operators),
            "{filter}: operators {:?}",
            tree.operators()
        );
        assert!(
            contains_all(tree.properties(), properties),
            "{filter}: properties {:?}",
            tree.properties()
        );
    }
    Ok(())
}

#[test]
fn inventories_keep_duplicates_in_pre_order() -> Result<()> {
    let tree = FilterTree::of::<User>(
        "type eq 'Employee' and startsWith(name/givenName, 'john') and name/givenName ne 'Johnson'",
    )?;
    assert_eq!(tree.operators(), ["and", "and", "eq", "startswith", "ne"]);
    assert_eq!(tree.properties(), ["type", "name/givenName", "name/givenName"]);
    assert_eq!(tree.operators_for("type"), ["eq", "and", "and"]);
    assert_eq!(
        tree.operators_for("NAME/GIVENNAME"),
        ["startswith", "and", "and", "ne", "and"]
    );
    assert!(tree.operators_for("email").is_empty());
    Ok(())
}

#[test]
fn only_first_function_argument_is_a_property() -> Result<()> {
    let tree = FilterTree::of::<User>("contains(name/givenName, displayName)")?;
    assert_eq!(tree.properties(), ["name/givenName"]);

    let tree = FilterTree::of::<User>("contains('abc', displayName)")?;
    assert!(tree.properties().is_empty());
    assert!(tree.property_operators().is_empty());
    Ok(())
}

#[test]
fn property_operators_stop_at_first_operand() -> Result<()> {
    let tree = FilterTree::of::<User>("not(enabled) or id eq 1")?;
    assert_eq!(tree.operators_for("enabled"), ["not", "or"]);
    assert_eq!(tree.operators_for("id"), ["eq", "or"]);
    Ok(())
}

#[test]
fn nodes_link_parents_children_and_levels() -> Result<()> {
    let tree = FilterTree::of::<User>("email eq 'a' and not(enabled)")?;
    let root = tree.root();
    assert_eq!(root.level(), 0);
    assert_eq!(root.parent(), None);
    assert_eq!(root.kind(), &NodeKind::BinaryOperator(BinaryOperatorKind::And));

    let left = tree.left(root).expect("left child");
    let right = tree.right(root).expect("right child");
    assert_eq!(left.operator_name(), Some("eq"));
    assert_eq!(right.operator_name(), Some("not"));
    assert_eq!(tree.parent(right).map(|n| n.id()), Some(root.id()));

    let enabled = tree.left(right).expect("operand");
    assert_eq!(enabled.level(), 2);
    assert!(enabled.is_operand());
    assert_eq!(enabled.property(), Some("enabled"));
    let chain: Vec<_> = tree
        .ancestors(enabled.id())
        .filter_map(|n| n.operator_name())
        .collect();
    assert_eq!(chain, ["not", "and"]);

    for node in tree.nodes() {
        if !node.is_operator() {
            assert!(node.left().is_none() && node.right().is_none(), "{node}");
        }
    }
    Ok(())
}

#[test]
fn operand_rendering() -> Result<()> {
    let tree = FilterTree::of::<User>("type in ('Guest', 'Employee') and email eq null")?;
    let list = tree
        .nodes()
        .iter()
        .find(|n| n.kind() == &NodeKind::ConstantList)
        .expect("list node");
    assert_eq!(
        list.operands(),
        Some(&["'Guest'".to_string(), "'Employee'".to_string()][..])
    );

    let tree = FilterTree::of::<User>("startsWith(email, 'jo')")?;
    let params = tree.left(tree.root()).expect("parameters");
    assert_eq!(params.kind(), &NodeKind::Parameters);
    assert_eq!(
        params.operands(),
        Some(&["email".to_string(), "\"jo\"".to_string()][..])
    );
    Ok(())
}

#[test]
fn lambda_bodies_carry_prefix() -> Result<()> {
    let tree = FilterTree::of::<User>("sponsor/socialLogins/any(s: s/name eq 'Facebook')")?;
    let body = tree.left(tree.root()).expect("body");
    assert_eq!(body.path_prefix(), Some("sponsor/socialLogins"));
    assert_eq!(tree.properties(), ["sponsor/socialLogins/name"]);
    assert_eq!(tree.operators_for("sponsor/socialLogins/name"), ["eq", "any"]);
    Ok(())
}

#[test]
fn keeps_schema_and_ast() -> Result<()> {
    let tree = FilterTree::of::<User>("enabled eq true")?;
    assert!(tree
        .schema_elements()
        .iter()
        .any(|e| e.full_name() == "Default.SocialLogin"));
    assert!(matches!(
        tree.ast(),
        QueryNode::BinaryOperator { right, .. } if **right == QueryNode::Constant(Literal::Boolean(true))
    ));
    Ok(())
}

#[test]
fn rejects_blank_filters() {
    for filter in ["", "   ", "\t\n"] {
        assert!(matches!(
            FilterTree::of::<User>(filter),
            Err(FilterError::EmptyFilter)
        ));
    }
}

#[test]
fn reports_unknown_types_with_available_names() {
    let schema = user_schema();
    let err = FilterTree::parse("id eq 1", &schema, "Account").unwrap_err();
    assert_eq!(err.code(), "TypeNotFound");
    let message = err.to_string();
    assert!(message.contains("Account"), "{message}");
    assert!(message.contains("Default.User"), "{message}");

    assert!(SchemaBuilder::new("Default").build().is_err());
}

#[test]
fn wraps_parse_failures() {
    let err = FilterTree::of::<User>("email eq").unwrap_err();
    match err {
        FilterError::Parse { filter, source } => {
            assert_eq!(filter, "email eq");
            assert_eq!(source.code(), "SyntaxError");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = FilterTree::of::<User>("nickname eq 'x'").unwrap_err();
    assert!(matches!(err, FilterError::Parse { ref source, .. } if source.code() == "UnknownProperty"));
}

#[test]
fn honors_depth_limits() -> Result<()> {
    let schema = user_schema();
    let filter = format!("{}enabled{}", "not(".repeat(40), ")".repeat(40));
    let options = FilterOptions::default().with_max_depth(16);
    let err = FilterTree::parse_with(&filter, &schema, "User", &UriFilterParser, &options).unwrap_err();
    assert_eq!(err.code(), "ParseError");

    let tree = FilterTree::parse(&filter, &schema, "User")?;
    assert_eq!(tree.operators().len(), 40);
    Ok(())
}

#[test]
fn long_or_chains_are_not_nesting() -> Result<()> {
    let filter = (0..1000)
        .map(|i| format!("id eq {i}"))
        .collect::<Vec<_>>()
        .join(" or ");
    let tree = FilterTree::of::<User>(&filter)?;
    assert_eq!(tree.operators().len(), 1999);
    assert_eq!(tree.properties().len(), 1000);
    assert_eq!(tree.root().operator_name(), Some("or"));
    let applied = tree.operators_for("id");
    assert_eq!(applied.iter().filter(|op| op.as_str() == "eq").count(), 1000);
    assert_eq!(&applied[..2], ["eq", "or"]);
    assert_eq!(tree.pre_order().count(), tree.nodes().len());

    let schema = user_schema();
    let options = FilterOptions::default().with_max_depth(8);
    let tree = FilterTree::parse_with(&filter, &schema, "User", &UriFilterParser, &options)?;
    assert_eq!(tree.operators().len(), 1999);
    Ok(())
}

#[test]
fn hand_built_trees_are_accepted() -> Result<()> {
    let schema = user_schema();
    let ast = QueryNode::binary(
        BinaryOperatorKind::Equal,
        QueryNode::PropertyAccess {
            source: None,
            property: "email".into(),
        },
        QueryNode::constant(Literal::Null),
    );
    let tree = FilterTree::from_ast("email eq null", ast, &schema, &FilterOptions::default())?;
    assert_eq!(tree.properties(), ["email"]);

    let deep = (0..8).fold(QueryNode::constant(Literal::Boolean(true)), |inner, _| {
        QueryNode::UnaryOperator {
            op: odata_filter::syntax::UnaryOperatorKind::Not,
            operand: Box::new(inner),
        }
    });
    let options = FilterOptions::default().with_max_depth(4);
    let err = FilterTree::from_ast("deep", deep, &schema, &options).unwrap_err();
    assert!(matches!(err, FilterError::TooDeep { max: 4 }));
    Ok(())
}
