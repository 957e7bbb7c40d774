//! Shared storage admission budgets
//!
//! Several downloads backed by the same storage provider share one budget.
//! Sharing is expressed by cloning a [`StorageBudget`] handle; clones compare
//! equal by [`BudgetId`], never by pointer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BUDGET_ID: AtomicU64 = AtomicU64::new(1);

/// Source of the remaining storage capacity.
///
/// Queried at most once per budget per dispatch pass.
pub trait StorageCapacity: Send + Sync {
    /// Bytes that may still be reserved, or `None` for unlimited.
    fn remaining_bytes(&self) -> Option<u64>;
}

impl<F> StorageCapacity for F
where
    F: Fn() -> Option<u64> + Send + Sync,
{
    fn remaining_bytes(&self) -> Option<u64> {
        self()
    }
}

/// Identity of a storage budget, stable across clones of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BudgetId(u64);

impl BudgetId {
    /// Returns the raw identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BudgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "budget#{}", self.0)
    }
}

/// Reference-counted handle to a storage capacity source.
#[derive(Clone)]
pub struct StorageBudget {
    id: BudgetId,
    capacity: Arc<dyn StorageCapacity>,
}

impl StorageBudget {
    /// Creates a budget with a fresh identity backed by `capacity`.
    pub fn new(capacity: impl StorageCapacity + 'static) -> Self {
        Self {
            id: BudgetId(NEXT_BUDGET_ID.fetch_add(1, Ordering::Relaxed)),
            capacity: Arc::new(capacity),
        }
    }

    /// Creates a budget that reports the same capacity on every pass.
    pub fn fixed(bytes: u64) -> Self {
        Self::new(move || Some(bytes))
    }

    /// Identity shared by every clone of this handle.
    pub fn id(&self) -> BudgetId {
        self.id
    }

    /// Queries the capacity source.
    pub fn query_remaining(&self) -> Option<u64> {
        self.capacity.remaining_bytes()
    }
}

impl PartialEq for StorageBudget {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StorageBudget {}

impl fmt::Debug for StorageBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBudget").field("id", &self.id).finish()
    }
}
