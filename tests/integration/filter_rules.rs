//! Rule documents and rule text through the public API.

#![allow(missing_docs)]

use odata_filter::filter::grammar::{self, RuleKind};
use odata_filter::{FilterError, FilterRules, NodeCount, RuleFormatError};

fn rules(input: &str) -> FilterRules {
    FilterRules::deserialize(input).unwrap_or_else(|err| panic!("{input}: {err}"))
}

#[test]
fn text_fragments_decode_counts() {
    let parsed = rules("eq|and:2|o:ne:1,2|startsWith:1,0|type:,5|p:name/givenName:2,|any:0");
    let ops = parsed.operators();
    assert_eq!(ops.get("EQ"), Some(&Some(NodeCount::default())));
    assert_eq!(ops.get("and"), Some(&Some(NodeCount::exactly(2))));
    assert_eq!(ops.get("ne"), Some(&Some(NodeCount::new(1, 2))));
    assert_eq!(ops.get("startswith"), Some(&Some(NodeCount::at_least(1))));
    assert!(ops.get("any").and_then(|c| *c).is_some_and(|c| c.is_unconstrained()));

    let props = parsed.properties();
    assert_eq!(props.get("Type"), Some(&Some(NodeCount::at_most(5))));
    assert_eq!(props.get("name/givenName"), Some(&Some(NodeCount::at_least(2))));
    assert_eq!(props.keys().collect::<Vec<_>>(), ["type", "name/givenName"]);
}

#[test]
fn property_fragments_merge_through_combine() {
    let parsed = rules("a:1,|a:0,2");
    assert_eq!(parsed.properties().len(), 1);
    assert_eq!(parsed.properties().get("a"), Some(&Some(NodeCount::new(0, 2))));

    let parsed = rules("email[eq]:1|email[eq]:2|email[ne]");
    assert_eq!(parsed.properties().get("email"), Some(&Some(NodeCount::new(0, 3))));
    let allowed = parsed
        .property_operators()
        .get("email")
        .and_then(Option::as_ref)
        .expect("email operators");
    assert_eq!(allowed.get("eq"), Some(&Some(NodeCount::new(1, 3))));
    assert_eq!(allowed.get("ne"), Some(&Some(NodeCount::default())));
}

#[test]
fn duplicate_operator_fragments_fail() {
    for input in ["eq|eq", "and:1|o:AND:2", "o:startsWith|startswith"] {
        let err = FilterRules::deserialize(input).expect_err(input);
        assert_eq!(err.code(), "DuplicateRuleError", "{input}");
    }
}

#[test]
fn structural_text_errors() {
    let cases: &[(&str, fn(&RuleFormatError) -> bool)] = &[
        ("o:eq:abc", |e| matches!(e, RuleFormatError::InvalidCount { .. })),
        ("o:eq:1,2,3", |e| matches!(e, RuleFormatError::CountShape { .. })),
        ("email[eq", |e| matches!(e, RuleFormatError::MalformedBracket { .. })),
        ("email[[eq]]", |e| matches!(e, RuleFormatError::MalformedBracket { .. })),
        ("eq[ne]", |e| matches!(e, RuleFormatError::MalformedBracket { .. })),
        ("p::1", |e| matches!(e, RuleFormatError::EmptyName { .. })),
    ];
    for (input, check) in cases {
        match FilterRules::deserialize(input) {
            Err(FilterError::RuleFormat { input: echoed, source }) => {
                assert_eq!(echoed, *input);
                assert!(check(&source), "{input}: {source}");
            }
            other => panic!("{input}: unexpected {other:?}"),
        }
    }
}

#[test]
fn json_documents_ignore_case_and_unknown_keys() {
    let parsed = rules(
        r#"{
            "OPERATORS": {"Eq": {"Min": 1, "extra": true}, "and": null},
            "Properties": {"name/givenName": {"max": 2}},
            "PropertyOperators": {"name/givenName": {"startsWith": {"min": 1, "max": 1}}, "id": null},
            "comment": "ignored"
        }"#,
    );
    assert_eq!(parsed.operators().get("eq"), Some(&Some(NodeCount::at_least(1))));
    assert_eq!(parsed.operators().get("AND"), Some(&None));
    assert_eq!(
        parsed.properties().get("NAME/GIVENNAME"),
        Some(&Some(NodeCount::at_most(2)))
    );
    assert_eq!(parsed.property_operators().get("id"), Some(&None));
    let expected = FilterRules::new()
        .with_operator("eq", NodeCount::at_least(1))
        .with_operator("and", None)
        .with_property("name/givenName", NodeCount::at_most(2))
        .with_property_operator("name/givenName", "startsWith", NodeCount::exactly(1))
        .with_any_property_operator("id");
    assert_eq!(parsed, expected);
}

#[test]
fn json_errors_carry_the_document() {
    let err = FilterRules::deserialize(r#"{"operators": {"eq": {"min": "one"}}}"#).unwrap_err();
    assert_eq!(err.code(), "RuleFormatError");
    assert!(err.to_string().contains("\"min\""), "{err}");
}

#[test]
fn serialized_rules_reload_identically() {
    let original = rules("eq:1|and:2,|type[eq,and]:,3|o:not");
    let json = original.to_json().expect("serializes");
    assert!(json.starts_with(r#"{"operators":"#), "{json}");
    assert_eq!(rules(&json), original);
    assert_eq!(json.parse::<FilterRules>().expect("from_str"), original);
}

#[test]
fn grammar_reports_fragment_kinds() {
    let parsed = grammar::parse_text("o:email|p:eq|tolower|Contains:3").expect("grammar");
    let kinds: Vec<_> = parsed.iter().map(|r| (r.name.as_str(), r.kind)).collect();
    assert_eq!(
        kinds,
        [
            ("email", RuleKind::Operator),
            ("eq", RuleKind::Property),
            ("tolower", RuleKind::Property),
            ("Contains", RuleKind::Operator),
        ]
    );
    assert_eq!(parsed[3].count, NodeCount::exactly(3));
    assert!(grammar::OPERATOR_VOCABULARY.contains(&"substringof"));
}
