//! Process-wide unique identifiers for facets, providers, and fields.
//!
//! Grounded on the Design Notes' "nextID... monotonically incrementing atomic counter":
//! every [`Id`] handed out by a given [`IdAllocator`] is unique for the lifetime of that
//! allocator. The default allocator is a single process-wide static, but tests that want
//! hermetic IDs (not shared with any other test) can build their own [`IdAllocator`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A globally unique identifier for a Facet, Provider, or StateField.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Id(u64);

impl Id {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

/// A monotonic counter handing out unique [`Id`]s.
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub const fn new() -> IdAllocator {
        IdAllocator { next: AtomicU64::new(1) }
    }

    pub fn alloc(&self) -> Id {
        Id(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator::new()
    }
}

static GLOBAL_IDS: IdAllocator = IdAllocator::new();

/// Allocates a fresh [`Id`] from the process-wide allocator.
pub fn next_id() -> Id {
    GLOBAL_IDS.alloc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = next_id();
        let b = next_id();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn hermetic_allocator_is_independent() {
        let alloc = IdAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert_eq!(a.as_u64(), 1);
        assert_eq!(b.as_u64(), 2);
    }
}
