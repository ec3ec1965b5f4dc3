//! Registry of live acknowledgement sets.
//!
//! The monitor is the single authority on which sets are alive. It guards
//! membership only; each set's counter has its own lock, so acquire/release on
//! distinct sets do not serialize on the registry beyond the membership
//! lookup.
//!
//! # Locking
//!
//! ```text
//! registry mutex (fair)          per-set mutex
//! ─────────────────────          ─────────────
//! add / lookup / reap     ──►    acquire / release / status
//! ```
//!
//! The registry mutex is always released with a fair unlock, handing it to
//! the longest waiter. A reaper pass queued behind a stream of producers and
//! stages is therefore served in arrival order.

use crate::set::AcknowledgementSet;
use ackflow_core::AcknowledgementTracker;
use ackflow_types::{AckSetId, EventHandle};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

type Membership = HashMap<AckSetId, Arc<AcknowledgementSet>>;

/// Tracks live acknowledgement sets and reaps the finished ones.
///
/// Acquire and release against a set the monitor does not know about are
/// expected: an event can outlive its set when the set expired and was reaped
/// first. Those calls are logged, counted and otherwise ignored.
#[derive(Debug, Default)]
pub struct AcknowledgementSetMonitor {
    sets: Mutex<Membership>,
    invalid_acquires: AtomicU64,
    invalid_releases: AtomicU64,
}

impl AcknowledgementSetMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the membership map locked, then unlock fairly.
    fn with_sets<R>(&self, f: impl FnOnce(&mut Membership) -> R) -> R {
        let mut guard = self.sets.lock();
        let result = f(&mut guard);
        MutexGuard::unlock_fair(guard);
        result
    }

    fn lookup(&self, id: AckSetId) -> Option<Arc<AcknowledgementSet>> {
        self.with_sets(|sets| sets.get(&id).cloned())
    }

    /// Register a newly created set.
    pub fn add(&self, set: Arc<AcknowledgementSet>) {
        let id = set.id();
        self.with_sets(|sets| {
            if sets.insert(id, set).is_some() {
                warn!(set_id = %id, "acknowledgement set registered twice");
            }
        });
    }

    /// Acquire a reference on the handle's set.
    ///
    /// Returns `true` if the set is live and accepted the acquire.
    pub fn acquire(&self, handle: &EventHandle) -> bool {
        let id = handle.set_id();
        match self.lookup(id) {
            Some(set) => set.acquire(),
            None => {
                warn!(set_id = %id, "acquire on an acknowledgement set that does not exist");
                self.invalid_acquires.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Release a reference on the handle's set.
    ///
    /// Returns `true` if the set is live and accepted the release.
    pub fn release(&self, handle: &EventHandle, success: bool) -> bool {
        let id = handle.set_id();
        match self.lookup(id) {
            Some(set) => {
                let outcome = set.release(success);
                debug!(set_id = %id, success, ?outcome, "released event handle");
                !matches!(outcome, crate::ReleaseOutcome::Ignored)
            }
            None => {
                warn!(set_id = %id, "release on an acknowledgement set that does not exist");
                self.invalid_releases.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Reap every set that is complete or expired.
    ///
    /// Returns the number of sets removed. A no-op on an empty registry.
    pub fn run(&self) -> usize {
        self.run_at(Instant::now())
    }

    /// Reap against a fixed `now`, so every set in one pass is judged at the
    /// same instant.
    pub fn run_at(&self, now: Instant) -> usize {
        self.with_sets(|sets| {
            if sets.is_empty() {
                return 0;
            }
            let before = sets.len();
            sets.retain(|id, set| {
                let status = set.status_at(now);
                if status.is_terminal() {
                    debug!(set_id = %id, ?status, "reaping acknowledgement set");
                }
                !status.is_terminal()
            });
            let removed = before - sets.len();
            if removed > 0 {
                debug!(removed, remaining = sets.len(), "reaper pass finished");
            }
            removed
        })
    }

    /// Whether the set is currently registered.
    pub fn contains(&self, id: AckSetId) -> bool {
        self.with_sets(|sets| sets.contains_key(&id))
    }

    /// Number of live sets.
    pub fn len(&self) -> usize {
        self.with_sets(|sets| sets.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquires that referenced an unknown or reaped set.
    pub fn invalid_acquires(&self) -> u64 {
        self.invalid_acquires.load(Ordering::Relaxed)
    }

    /// Releases that referenced an unknown or reaped set.
    pub fn invalid_releases(&self) -> u64 {
        self.invalid_releases.load(Ordering::Relaxed)
    }
}

impl AcknowledgementTracker for AcknowledgementSetMonitor {
    fn acquire(&self, handle: &EventHandle) {
        AcknowledgementSetMonitor::acquire(self, handle);
    }

    fn release(&self, handle: &EventHandle, success: bool) {
        AcknowledgementSetMonitor::release(self, handle, success);
    }
}
