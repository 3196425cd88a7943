use serde::{Deserialize, Serialize};

/// Nesting limit applied by the parser and by tree construction.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options that control how filter text is parsed and normalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Resolve property and enum member names ignoring ASCII case.
    pub case_insensitive: bool,
    /// Maximum expression nesting before parsing fails with a depth error.
    pub max_depth: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FilterOptions {
    /// Returns options with a different depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns options with case-sensitive name resolution.
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }
}
