//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Acknowledgement set identifier.
///
/// Assigned once when the set is created and never derived from the set's
/// contents. Two sets with identical counters and deadlines are still
/// distinct sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckSetId(pub u64);

impl AckSetId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AckSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckSet({})", self.0)
    }
}

/// Record identity.
///
/// Every [`crate::Record`] receives a fresh id at construction, so a copy of a
/// record is never mistaken for the original even when the payloads are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

impl RecordId {
    /// Allocate the next process-unique record id.
    pub fn next() -> Self {
        RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.0)
    }
}

/// Monotonic allocator for [`AckSetId`]s.
///
/// Each acknowledgement manager owns one, so ids are unique per manager.
#[derive(Debug)]
pub struct AckSetIdAllocator {
    next: AtomicU64,
}

impl AckSetIdAllocator {
    /// Create an allocator whose first id is 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next id.
    pub fn allocate(&self) -> AckSetId {
        AckSetId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AckSetIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
