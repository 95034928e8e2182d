//! Memory Entry Module
//!
//! Defines a type-erased memory-tier entry with its cost.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased cached value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

// == Memory Entry ==
/// A single memory-tier entry.
#[derive(Clone)]
pub struct MemoryEntry {
    /// The stored value
    value: AnyValue,
    /// Encoded size in bytes, counted against the cost limit
    pub cost: usize,
}

impl MemoryEntry {
    // == Constructor ==
    pub fn new<V: Any + Send + Sync>(value: V, cost: usize) -> Self {
        Self {
            value: Arc::new(value),
            cost,
        }
    }

    // == Downcast ==
    /// Returns a clone of the value if it was stored as a `V`.
    pub fn downcast<V: Any + Clone>(&self) -> Option<V> {
        self.value.downcast_ref::<V>().cloned()
    }

    /// True if the value was stored as a `V`.
    #[cfg(test)]
    pub fn is<V: Any>(&self) -> bool {
        self.value.is::<V>()
    }
}

impl fmt::Debug for MemoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEntry")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
