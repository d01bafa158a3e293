//! Configuration for the max-fee selector.
//!
//! [`SelectorConfig`] carries the search budget. It is built
//! programmatically or from CLI flags; the defaults suit batches of a few
//! dozen candidates.

use crate::constants::DEFAULT_MAX_SEARCH_NODES;

/// Tuning knobs for [`MaxFeeSelector`](crate::selector::MaxFeeSelector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Maximum number of search nodes to expand before committing the best
    /// subset found so far. `None` searches exhaustively.
    pub max_search_nodes: Option<u64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_search_nodes: Some(DEFAULT_MAX_SEARCH_NODES),
        }
    }
}

impl SelectorConfig {
    /// A configuration with no search budget.
    pub fn unbounded() -> Self {
        Self {
            max_search_nodes: None,
        }
    }

    /// Replace the search budget.
    pub fn with_max_search_nodes(mut self, max: Option<u64>) -> Self {
        self.max_search_nodes = max;
        self
    }

    /// Whether `nodes` expanded nodes exceed the budget.
    pub fn budget_exceeded(&self, nodes: u64) -> bool {
        self.max_search_nodes.is_some_and(|max| nodes > max)
    }
}
