//! Rule validation over the sample `User` model.

#![allow(missing_docs)]

#[path = "../support/mod.rs"]
mod support;

use odata_filter::{FilterRules, FilterTree, FilterValidator, NodeCount, Result};
use support::{init_tracing, user_schema, User};

const FILTER: &str =
    "Type eq 'Employee' and startsWith(name/givenName, 'john') and name/givenName ne 'Johnson'";

fn validate(filter: &str, rules: &str) -> Result<FilterValidator> {
    FilterValidator::for_type_text::<User>(filter, rules)
}

#[test]
fn accepts_matching_rule_sets() -> Result<()> {
    init_tracing();
    let passing = [
        r#"{"Operators":{"eq":null,"and":null,"ne":null,"startsWith":null},"Properties":{"type":null,"name/givenName":null}}"#,
        r#"{"Operators":{"eq":{"min":1},"and":null,"ne":null,"startsWith":null},"Properties":{"type":{"min":1},"name/givenName":{"min":1}}}"#,
        "eq|and|ne|startsWith|type|name/givenName",
        "eq|and|ne|startsWith|type:,5|name/givenName",
        "eq|and:2|o:ne:1,2|startsWith:1|type:,5|p:name/givenName:2,",
        "eq|and:2,0|o:ne:1,2|startsWith:1,0|type:,5|p:name/givenName:2,0",
        "lt|eq|and|ne|startsWith|type:,5|name/givenName",
        "type[eq,and]|name/givenName[ne,startsWith,and]",
        "type[eq,and]:1,2|name/givenName[ne,startsWith,and]:1,3",
        "type[eq]|type[and]|name/givenName[ne]|name/givenName[startsWith]|name/givenName[and]",
    ];
    for rules in passing {
        let validator = validate(FILTER, rules)?;
        assert!(validator.passed(), "{rules}: {:?}", validator.errors());
        assert_eq!(validator.errors(), None);
        assert_eq!(validator.details(), None);
    }
    Ok(())
}

#[test]
fn reports_disallowed_function() -> Result<()> {
    let rules = r#"{"Operators":{"eq":null,"and":null,"ne":null,"endsWith":null},"Properties":{"type":null,"name/givenName":null}}"#;
    let validator = validate(FILTER, rules)?;
    assert!(validator.failed());
    assert_eq!(
        validator.errors(),
        Some(&["Operator 'startswith' is not allowed.".to_string()][..])
    );
    Ok(())
}

#[test]
fn reports_disallowed_operation_on_property() -> Result<()> {
    let validator = validate(FILTER, "type[eq]|name/givenName[ne,startsWith,and]")?;
    assert!(validator.failed());
    assert_eq!(
        validator.details().as_deref(),
        Some("Operation 'and' applied to property 'type' is not allowed.")
    );
    Ok(())
}

#[test]
fn enumerates_every_violation() -> Result<()> {
    let validator = validate(
        "email eq 'a@b.com' and startsWith(email, name/givenName)",
        "email[eq]",
    )?;
    assert_eq!(
        validator.errors().map(<[String]>::to_vec),
        Some(vec![
            "Operation 'and' applied to property 'email' is not allowed.".to_string(),
            "Operation 'startswith' applied to property 'email' is not allowed.".to_string(),
        ])
    );
    assert_eq!(
        validator.details().as_deref(),
        Some(
            "Operation 'and' applied to property 'email' is not allowed. \
             Operation 'startswith' applied to property 'email' is not allowed."
        )
    );
    Ok(())
}

#[test]
fn reports_count_violations() -> Result<()> {
    let validator = validate(FILTER, "and:1|eq:2,|ne:,0|type:3|o:or:1|p:email:1")?;
    let errors = validator.errors().expect("violations");
    assert_eq!(
        errors,
        [
            "Operator 'startswith' is not allowed.",
            "Operator 'and' must be used exactly 1 time, but it is used 2 times.",
            "Operator 'eq' must be used at least 2 times, but it is used 1 time.",
            "Missing required operator 'or'.",
            "Property 'name/givenName' is not allowed.",
            "Property 'type' must be used exactly 3 times, but it is used 1 time.",
            "Missing required property 'email'.",
        ]
    );
    Ok(())
}

#[test]
fn reports_property_operator_counts() -> Result<()> {
    let validator = validate(FILTER, "name/givenName[and]:,1|type[eq,or]:1,")?;
    let errors = validator.errors().expect("violations");
    assert_eq!(
        errors,
        [
            "Property 'name/givenName' can be used at most 1 time, but it is used 2 times.",
            "Operation 'and' applied to property 'type' is not allowed.",
            "Operation 'startswith' applied to property 'name/givenName' is not allowed.",
            "Operation 'ne' applied to property 'name/givenName' is not allowed.",
            "Operation 'and' applied to property 'name/givenName' can be used at most 1 time, but it is used 3 times.",
            "Missing required operation 'or' applied to property 'type'.",
        ]
    );
    Ok(())
}

#[test]
fn unused_declared_pairs_count_as_zero() -> Result<()> {
    let validator = validate("id eq 1", "id|email[eq]:1")?;
    assert_eq!(
        validator.errors().map(<[String]>::to_vec),
        Some(vec![
            "Missing required property 'email'.".to_string(),
            "Property 'id' is not allowed.".to_string(),
            "Missing required operation 'eq' applied to property 'email'.".to_string(),
        ])
    );
    Ok(())
}

#[test]
fn null_allow_map_permits_any_operator() -> Result<()> {
    let rules = FilterRules::new().with_any_property_operator("email");
    let validator =
        FilterValidator::for_type::<User>("email eq 'x' or endsWith(email, 'y')", Some(&rules))?;
    assert!(validator.passed());
    Ok(())
}

#[test]
fn json_and_text_rules_agree() -> Result<()> {
    let json = r#"{"Operators":{"eq":null},"Properties":{"id":null}}"#;
    for filter in ["id eq 1", "id eq 1 and id eq 2", "email eq 'x'", "id gt 1"] {
        let from_json = validate(filter, json)?;
        let from_text = validate(filter, "eq|id")?;
        assert_eq!(from_json, from_text, "{filter}");
    }
    Ok(())
}

#[test]
fn absent_or_empty_rules_pass() -> Result<()> {
    let schema = user_schema();
    for filter in [FILTER, "not(enabled)", "socialLogins/any(s: s/name eq 'x')"] {
        assert!(FilterValidator::validate(filter, &schema, "User", None)?.passed());
        assert!(FilterValidator::validate_text(filter, &schema, "User", "  ")?.passed());
        let empty = FilterRules::new();
        assert!(FilterValidator::validate(filter, &schema, "User", Some(&empty))?.passed());
    }
    Ok(())
}

#[test]
fn validation_is_idempotent() -> Result<()> {
    let tree = FilterTree::of::<User>(FILTER)?;
    let rules = FilterRules::new()
        .with_operator("eq", NodeCount::exactly(2))
        .with_property("email", None);
    let first = FilterValidator::new(&tree, Some(&rules));
    let second = FilterValidator::new(&tree, Some(&rules));
    assert!(first.failed());
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn duplicate_messages_are_suppressed() -> Result<()> {
    let validator = validate("id eq 1 or id eq 2 or id eq 3", "ne")?;
    assert_eq!(
        validator.errors().map(<[String]>::to_vec),
        Some(vec![
            "Operator 'or' is not allowed.".to_string(),
            "Operator 'eq' is not allowed.".to_string(),
        ])
    );
    Ok(())
}

#[test]
fn construction_errors_propagate() {
    assert_eq!(validate("", "eq").unwrap_err().code(), "EmptyFilter");
    assert_eq!(validate("bogus eq 1", "eq").unwrap_err().code(), "ParseError");
    assert_eq!(validate("id eq 1", "eq|EQ").unwrap_err().code(), "DuplicateRuleError");
    assert_eq!(validate("id eq 1", "{").unwrap_err().code(), "RuleFormatError");
}
