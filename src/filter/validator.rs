use indexmap::IndexSet;
use tracing::debug;

use super::count::NodeCount;
use super::map::NameMap;
use super::rules::FilterRules;
use super::tree::FilterTree;
use crate::error::Result;
use crate::schema::{Describe, SchemaModel};

/// Checks a filter tree against [`FilterRules`] and collects violations.
///
/// Validation never fails with an error: tree construction errors surface
/// from the constructors, rule violations are collected as messages.
///
/// ```
/// use odata_filter::{FilterRules, FilterValidator, SchemaModel};
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
/// let rules: FilterRules = "eq|email".parse()?;
/// let validator = FilterValidator::validate("id eq 1", &schema, "User", Some(&rules))?;
/// assert!(validator.failed());
/// assert_eq!(validator.details().as_deref(), Some("Property 'id' is not allowed."));
/// # Ok::<(), odata_filter::FilterError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterValidator {
    errors: Vec<String>,
}

impl FilterValidator {
    /// Validates `tree`; no rules means the filter passes.
    pub fn new(tree: &FilterTree, rules: Option<&FilterRules>) -> Self {
        let Some(rules) = rules else {
            debug!(errors = 0usize, "filter.validator.completed");
            return Self::default();
        };

        let mut errors = IndexSet::new();
        if !rules.operators().is_empty() {
            check_allowed(&mut errors, tree.operators(), rules.operators(), Subject::Operator);
        }
        if !rules.properties().is_empty() {
            check_allowed(&mut errors, tree.properties(), rules.properties(), Subject::Property);
        }
        if !rules.property_operators().is_empty() {
            check_property_operators(&mut errors, tree, rules);
        }

        let errors: Vec<String> = errors.into_iter().collect();
        debug!(
            filter = tree.expression(),
            errors = errors.len(),
            "filter.validator.completed"
        );
        Self { errors }
    }

    /// Parses `filter` against `type_name` and validates it.
    pub fn validate(
        filter: &str,
        schema: &SchemaModel,
        type_name: &str,
        rules: Option<&FilterRules>,
    ) -> Result<Self> {
        let tree = FilterTree::parse(filter, schema, type_name)?;
        Ok(Self::new(&tree, rules))
    }

    /// Like [`FilterValidator::validate`] with rules in JSON or text form;
    /// blank rule text means no rules.
    pub fn validate_text(
        filter: &str,
        schema: &SchemaModel,
        type_name: &str,
        rules: &str,
    ) -> Result<Self> {
        let rules = parse_rules(rules)?;
        Self::validate(filter, schema, type_name, rules.as_ref())
    }

    /// Validates a filter over the entity described by `T`.
    pub fn for_type<T: Describe>(filter: &str, rules: Option<&FilterRules>) -> Result<Self> {
        let tree = FilterTree::of::<T>(filter)?;
        Ok(Self::new(&tree, rules))
    }

    /// Like [`FilterValidator::for_type`] with rules in JSON or text form.
    pub fn for_type_text<T: Describe>(filter: &str, rules: &str) -> Result<Self> {
        let rules = parse_rules(rules)?;
        Self::for_type::<T>(filter, rules.as_ref())
    }

    /// Returns true when no rule was violated.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one rule was violated.
    pub fn failed(&self) -> bool {
        !self.passed()
    }

    /// Violation messages in discovery order; `None` when validation passed.
    pub fn errors(&self) -> Option<&[String]> {
        (!self.errors.is_empty()).then_some(self.errors.as_slice())
    }

    /// All violation messages joined by a single space.
    pub fn details(&self) -> Option<String> {
        self.errors().map(|errors| errors.join(" "))
    }
}

fn parse_rules(rules: &str) -> Result<Option<FilterRules>> {
    if rules.trim().is_empty() {
        return Ok(None);
    }
    FilterRules::deserialize(rules).map(Some)
}

#[derive(Clone, Copy)]
enum Subject<'a> {
    Operator,
    Property,
    Operation { property: &'a str },
}

impl Subject<'_> {
    /// `Operator 'eq'`, `Property 'email'`, or
    /// `Operation 'eq' applied to property 'email'`.
    fn describe(self, name: &str) -> String {
        match self {
            Subject::Operator => format!("Operator '{name}'"),
            Subject::Property => format!("Property '{name}'"),
            Subject::Operation { property } => {
                format!("Operation '{name}' applied to property '{property}'")
            }
        }
    }

    fn missing(self, name: &str) -> String {
        match self {
            Subject::Operator => format!("Missing required operator '{name}'."),
            Subject::Property => format!("Missing required property '{name}'."),
            Subject::Operation { property } => {
                format!("Missing required operation '{name}' applied to property '{property}'.")
            }
        }
    }
}

fn times(n: u32) -> &'static str {
    if n == 1 {
        "time"
    } else {
        "times"
    }
}

/// Message for a usage count outside `rule`, if any.
fn count_violation(subject: Subject<'_>, name: &str, rule: NodeCount, used: u32) -> Option<String> {
    let NodeCount { min, max } = rule;
    let (phrase, bound) = if min > 0 && used == 0 {
        return Some(subject.missing(name));
    } else if min > 0 && min == max && used != max {
        ("must be used exactly", max)
    } else if min > 0 && used < min {
        ("must be used at least", min)
    } else if max > 0 && used > max {
        ("can be used at most", max)
    } else {
        return None;
    };
    Some(format!(
        "{} {phrase} {bound} {}, but it is used {used} {}.",
        subject.describe(name),
        times(bound),
        times(used)
    ))
}

fn usage(used: &[String], name: &str) -> u32 {
    let count = used.iter().filter(|u| u.eq_ignore_ascii_case(name)).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn not_allowed(subject: Subject<'_>, name: &str) -> String {
    format!("{} is not allowed.", subject.describe(name))
}

fn check_allowed(
    errors: &mut IndexSet<String>,
    used: &[String],
    rules: &NameMap<Option<NodeCount>>,
    subject: Subject<'_>,
) {
    for name in used {
        if !rules.contains_key(name) {
            errors.insert(not_allowed(subject, name));
        }
    }
    for (name, rule) in rules.iter() {
        let Some(rule) = rule else { continue };
        if let Some(message) = count_violation(subject, name, *rule, usage(used, name)) {
            errors.insert(message);
        }
    }
}

fn check_property_operators(errors: &mut IndexSet<String>, tree: &FilterTree, rules: &FilterRules) {
    let declared = rules.property_operators();
    for (property, operators) in tree.property_operators().iter() {
        match declared.get(property) {
            None => {
                errors.insert(not_allowed(Subject::Property, property));
            }
            Some(None) => {}
            Some(Some(allowed)) => {
                for operator in operators {
                    if !allowed.contains_key(operator) {
                        errors.insert(not_allowed(Subject::Operation { property }, operator));
                    }
                }
            }
        }
    }

    for (property, allowed) in declared.iter() {
        let Some(allowed) = allowed else { continue };
        let used = tree.operators_for(property);
        for (operator, rule) in allowed.iter() {
            let Some(rule) = rule else { continue };
            let subject = Subject::Operation { property };
            if let Some(message) = count_violation(subject, operator, *rule, usage(used, operator)) {
                errors.insert(message);
            }
        }
    }
}
