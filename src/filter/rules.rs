use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::count::NodeCount;
use super::grammar::{self, RuleKind};
use super::map::NameMap;
use crate::error::{FilterError, Result, RuleFormatError};

/// Allowed operators per property; `None` permits every operator.
pub type OperatorRules = Option<NameMap<Option<NodeCount>>>;

/// Allow-lists and usage bounds checked by [`crate::FilterValidator`].
///
/// All keys compare case-insensitively. A `None` count means the item is
/// allowed without bounds.
///
/// ```
/// use odata_filter::{FilterRules, NodeCount};
///
/// let text: FilterRules = "eq|and:2|p:name/givenName[ne]:1,".parse()?;
/// let built = FilterRules::new()
///     .with_operator("eq", NodeCount::default())
///     .with_operator("and", NodeCount::exactly(2))
///     .with_property("name/givenName", NodeCount::at_least(1))
///     .with_property_operator("name/givenName", "ne", NodeCount::at_least(1));
/// assert_eq!(text, built);
/// # Ok::<(), odata_filter::FilterError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRules {
    operators: NameMap<Option<NodeCount>>,
    properties: NameMap<Option<NodeCount>>,
    property_operators: NameMap<OperatorRules>,
}

impl FilterRules {
    /// Creates rules that constrain nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `name`, replacing any earlier rule for it.
    pub fn with_operator(mut self, name: &str, count: impl Into<Option<NodeCount>>) -> Self {
        self.operators.insert(name, count.into());
        self
    }

    /// Allows the property at `path`, replacing any earlier rule for it.
    pub fn with_property(mut self, path: &str, count: impl Into<Option<NodeCount>>) -> Self {
        self.properties.insert(path, count.into());
        self
    }

    /// Allows `operator` to be applied to the property at `path`.
    pub fn with_property_operator(
        mut self,
        path: &str,
        operator: &str,
        count: impl Into<Option<NodeCount>>,
    ) -> Self {
        self.property_operators
            .get_or_insert_with(path, || None)
            .get_or_insert_with(NameMap::new)
            .insert(operator, count.into());
        self
    }

    /// Lets every operator be applied to the property at `path`.
    pub fn with_any_property_operator(mut self, path: &str) -> Self {
        self.property_operators.insert(path, None);
        self
    }

    /// Operator rules.
    pub fn operators(&self) -> &NameMap<Option<NodeCount>> {
        &self.operators
    }

    /// Property rules.
    pub fn properties(&self) -> &NameMap<Option<NodeCount>> {
        &self.properties
    }

    /// Per-property operator rules.
    pub fn property_operators(&self) -> &NameMap<OperatorRules> {
        &self.property_operators
    }

    /// Returns true when no rule of any kind is declared.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty() && self.properties.is_empty() && self.property_operators.is_empty()
    }

    /// Reads rules from a JSON document or from pipe-separated rule text.
    ///
    /// Blank input yields empty rules. Input starting with `{` or `[` is
    /// treated as JSON; anything else uses the text grammar described in
    /// [`crate::filter::grammar`].
    pub fn deserialize(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let rules = if trimmed.starts_with(['{', '[']) {
            Self::from_json(trimmed)
                .map_err(|err| FilterError::rule_format(trimmed, RuleFormatError::Json(err)))?
        } else {
            Self::from_text(trimmed)?
        };
        debug!(
            operators = rules.operators.len(),
            properties = rules.properties.len(),
            property_operators = rules.property_operators.len(),
            "filter.rules.deserialized"
        );
        Ok(rules)
    }

    /// Serializes the rules as a JSON document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| FilterError::rule_format("", RuleFormatError::Json(err)))
    }

    fn from_json(input: &str) -> serde_json::Result<Self> {
        let document: Map<String, Value> = serde_json::from_str(input)?;
        let mut rules = Self::default();
        for (key, value) in document {
            if key.eq_ignore_ascii_case("operators") {
                rules.operators = serde_json::from_value::<Option<_>>(value)?.unwrap_or_default();
            } else if key.eq_ignore_ascii_case("properties") {
                rules.properties = serde_json::from_value::<Option<_>>(value)?.unwrap_or_default();
            } else if key.eq_ignore_ascii_case("propertyOperators") {
                rules.property_operators =
                    serde_json::from_value::<Option<_>>(value)?.unwrap_or_default();
            }
        }
        Ok(rules)
    }

    fn from_text(input: &str) -> Result<Self> {
        let parsed =
            grammar::parse_text(input).map_err(|source| FilterError::rule_format(input, source))?;
        let mut rules = Self::default();
        for rule in parsed {
            match rule.kind {
                RuleKind::Operator => {
                    if rules.operators.contains_key(&rule.name) {
                        return Err(FilterError::DuplicateRule { name: rule.name });
                    }
                    rules.operators.insert(rule.name, Some(rule.count));
                }
                RuleKind::Property => {
                    merge(&mut rules.properties, &rule.name, rule.count);
                    if rule.operators.is_empty() {
                        continue;
                    }
                    let allowed = rules
                        .property_operators
                        .get_or_insert_with(&rule.name, || None)
                        .get_or_insert_with(NameMap::new);
                    for operator in &rule.operators {
                        merge(allowed, operator, rule.count);
                    }
                }
            }
        }
        Ok(rules)
    }
}

fn merge(map: &mut NameMap<Option<NodeCount>>, name: &str, count: NodeCount) {
    match map.get_mut(name) {
        Some(slot) => *slot = Some(slot.map_or(count, |existing| existing.combine(count))),
        None => {
            map.insert(name, Some(count));
        }
    }
}

impl FromStr for FilterRules {
    type Err = FilterError;

    fn from_str(input: &str) -> Result<Self> {
        Self::deserialize(input)
    }
}
