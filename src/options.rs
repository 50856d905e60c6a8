//! Parse options.

use serde::{Deserialize, Serialize};

/// Knobs for [`parse_with`](crate::parse_with).
///
/// Every field has a default, so a partial config section deserializes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Options {
    /// Reduce tables keyed exactly `1..=N` to sequences. When off, such
    /// tables stay integer-keyed tables. Defaults to `true`.
    pub convert_lists: bool,
    /// Maximum nesting depth of tables. `None` disables the check and lets
    /// deeply nested input overflow the stack. Defaults to `Some(128)`.
    pub recursion_limit: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            convert_lists: true,
            recursion_limit: Some(128),
        }
    }
}

impl Options {
    #[must_use]
    pub fn with_convert_lists(mut self, convert_lists: bool) -> Self {
        self.convert_lists = convert_lists;
        self
    }

    #[must_use]
    /// Set a maximum table nesting depth.
    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = Some(recursion_limit);
        self
    }

    #[must_use]
    /// Disable the nesting depth check.
    pub fn without_recursion_limit(mut self) -> Self {
        self.recursion_limit = None;
        self
    }
}
