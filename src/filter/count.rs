use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Allowed number of occurrences of an operator, property, or operation.
///
/// `min == 0` makes the item optional and `max == 0` leaves it unbounded, so
/// the default value places no constraint at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeCount {
    /// Minimum required occurrences.
    pub min: u32,
    /// Maximum allowed occurrences; zero means unbounded.
    pub max: u32,
}

impl NodeCount {
    /// Creates a count with explicit bounds.
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Requires exactly `n` occurrences.
    pub const fn exactly(n: u32) -> Self {
        Self::new(n, n)
    }

    /// Requires at least `n` occurrences.
    pub const fn at_least(n: u32) -> Self {
        Self::new(n, 0)
    }

    /// Allows at most `n` occurrences.
    pub const fn at_most(n: u32) -> Self {
        Self::new(0, n)
    }

    /// Returns true when neither bound is set.
    pub fn is_unconstrained(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    /// Merges two counts declared for the same item: the smaller minimum and
    /// the summed maximum.
    pub fn combine(self, other: NodeCount) -> NodeCount {
        NodeCount {
            min: self.min.min(other.min),
            max: self.max.saturating_add(other.max),
        }
    }
}

impl fmt::Display for NodeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.min, self.max)
    }
}

impl Serialize for NodeCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NodeCount", 2)?;
        state.serialize_field("min", &self.min)?;
        state.serialize_field("max", &self.max)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for NodeCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(NodeCountVisitor)
    }
}

struct NodeCountVisitor;

impl<'de> Visitor<'de> for NodeCountVisitor {
    type Value = NodeCount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object with optional 'min' and 'max' counts")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<NodeCount, A::Error> {
        let mut count = NodeCount::default();
        while let Some(key) = map.next_key::<String>()? {
            if key.eq_ignore_ascii_case("min") {
                count.min = map.next_value()?;
            } else if key.eq_ignore_ascii_case("max") {
                count.max = map.next_value()?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(count)
    }
}
