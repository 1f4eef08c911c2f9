//! Population bookkeeping for one filter-chain step.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Row and entity counts immediately before and after one filter step.
///
/// The ordered sequence of deltas of a chain run is the cohort "flow chart".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDelta {
    pub step_name: String,
    /// 0-based position of the step in the chain.
    pub step_index: usize,
    pub n_rows_before: usize,
    pub n_rows_after: usize,
    pub n_entities_before: usize,
    pub n_entities_after: usize,
}

impl StepDelta {
    /// Rows removed by this step.
    pub fn n_dropped(&self) -> usize {
        self.n_rows_before.saturating_sub(self.n_rows_after)
    }

    /// Entities that lost all their rows in this step.
    pub fn n_entities_dropped(&self) -> usize {
        self.n_entities_before.saturating_sub(self.n_entities_after)
    }

    /// True when the step left no rows at all.
    pub fn is_empty_result(&self) -> bool {
        self.n_rows_after == 0
    }

    /// True when the step never grew the table or the entity set.
    pub fn is_monotonic(&self) -> bool {
        self.n_rows_after <= self.n_rows_before && self.n_entities_after <= self.n_entities_before
    }
}

impl fmt::Display for StepDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} {}: rows {} -> {} (-{}), entities {} -> {} (-{})",
            self.step_index,
            self.step_name,
            self.n_rows_before,
            self.n_rows_after,
            self.n_dropped(),
            self.n_entities_before,
            self.n_entities_after,
            self.n_entities_dropped(),
        )
    }
}
