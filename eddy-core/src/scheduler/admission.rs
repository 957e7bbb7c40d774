//! Storage admission accounting for one dispatch pass.

use std::collections::HashMap;

use crate::swarm::{BudgetId, StorageBudget};

/// Remaining reservable bytes per storage budget, valid for a single pass.
///
/// Each budget's capacity source is queried on first reference only. A
/// `None` entry means the source reported no limit for this pass.
#[derive(Debug, Default)]
pub struct AdmissionTracker {
    remaining: HashMap<BudgetId, Option<u64>>,
}

impl AdmissionTracker {
    /// Creates a tracker with no budgets queried yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries `budget` if this pass has not referenced it yet.
    pub fn prime(&mut self, budget: &StorageBudget) {
        self.remaining
            .entry(budget.id())
            .or_insert_with(|| budget.query_remaining());
    }

    /// Reserves `piece_length` bytes against `budget` if they fit.
    ///
    /// Whole pieces are charged regardless of how many chunks end up
    /// requested. A rejected piece leaves the remaining budget unchanged.
    /// Downloads without a budget always admit.
    pub fn admit(&mut self, budget: Option<&StorageBudget>, piece_length: u64) -> bool {
        let Some(budget) = budget else {
            return true;
        };
        self.prime(budget);

        match self.remaining.get_mut(&budget.id()) {
            Some(Some(left)) => {
                if *left < piece_length {
                    return false;
                }
                *left -= piece_length;
                true
            }
            _ => true,
        }
    }

    /// Bytes still reservable against `budget` this pass.
    ///
    /// `None` if the budget is unlimited or has not been referenced yet.
    pub fn remaining(&self, budget: &StorageBudget) -> Option<u64> {
        self.remaining.get(&budget.id()).copied().flatten()
    }
}
