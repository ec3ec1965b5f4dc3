//! Acknowledgement set state machine.
//!
//! An acknowledgement set tracks one unit of ingested work. Every event
//! derived from that work holds an [`EventHandle`] naming the set, and the set
//! counts how many of those references are still outstanding.
//!
//! ```text
//!              release() brings outstanding to 0
//!   Active ───────────────────────────────────────► Complete
//!     │
//!     │ deadline passes while not Complete
//!     ▼
//!   Expired
//! ```
//!
//! Complete and Expired are terminal. Expiry is never stored; it is evaluated
//! from the deadline whenever the set is queried.

use ackflow_types::{AckSetId, Event, EventHandle};
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Invoked once when a set completes.
///
/// The argument is `true` when every release reported success.
pub type CompletionCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Lifecycle state of an acknowledgement set at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    /// Outstanding references remain and the deadline has not passed.
    Active,
    /// Every outstanding reference was released.
    Complete,
    /// The deadline passed before the set completed.
    Expired,
}

impl SetStatus {
    /// Whether the set can be reaped.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SetStatus::Active)
    }
}

/// Result of a release against a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The reference was accounted for; this many remain.
    Pending { outstanding: u64 },
    /// This release resolved the last reference and fired the callback.
    Completed,
    /// The set was not Active, or had nothing outstanding. Nothing changed.
    Ignored,
}

struct SetState {
    outstanding: u64,
    complete: bool,
    failed: bool,
    callback: Option<CompletionCallback>,
}

/// One tracked unit of work.
///
/// The counter and state are guarded by a mutex local to the set, so distinct
/// sets can be acquired and released in parallel without touching the
/// registry lock.
pub struct AcknowledgementSet {
    id: AckSetId,
    deadline: Instant,
    state: Mutex<SetState>,
}

impl AcknowledgementSet {
    /// Create a set with `outstanding` references and a deadline `timeout`
    /// from now.
    ///
    /// A set created with zero outstanding references can only expire; it
    /// completes only through a release.
    pub fn new(
        id: AckSetId,
        outstanding: u64,
        timeout: Duration,
        callback: CompletionCallback,
    ) -> Self {
        Self::with_deadline(id, outstanding, Instant::now() + timeout, callback)
    }

    /// Create a set with an explicit deadline.
    pub fn with_deadline(
        id: AckSetId,
        outstanding: u64,
        deadline: Instant,
        callback: CompletionCallback,
    ) -> Self {
        Self {
            id,
            deadline,
            state: Mutex::new(SetState {
                outstanding,
                complete: false,
                failed: false,
                callback: Some(callback),
            }),
        }
    }

    pub fn id(&self) -> AckSetId {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// A handle naming this set.
    pub fn handle(&self) -> EventHandle {
        EventHandle::new(self.id)
    }

    /// Bind `event` to this set without changing the outstanding count.
    ///
    /// Used by producers that created the set with the final event count.
    pub fn bind(&self, event: &mut Event) {
        event.set_handle(self.handle());
    }

    /// Current number of outstanding references.
    pub fn outstanding(&self) -> u64 {
        self.state.lock().outstanding
    }

    /// Whether any release so far reported failure.
    pub fn has_failures(&self) -> bool {
        self.state.lock().failed
    }

    /// Register one more outstanding reference.
    ///
    /// Returns `false` without changing anything if the set is already
    /// terminal.
    pub fn acquire(&self) -> bool {
        self.acquire_at(Instant::now())
    }

    pub fn acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if self.status_of(&state, now).is_terminal() {
            trace!(set_id = %self.id, "acquire on terminal set ignored");
            return false;
        }
        state.outstanding += 1;
        true
    }

    /// Resolve one outstanding reference.
    ///
    /// `success = false` marks the set failed but still counts the release.
    /// When the count reaches zero the set completes and the callback runs on
    /// the releasing thread, after the set's lock is dropped.
    pub fn release(&self, success: bool) -> ReleaseOutcome {
        self.release_at(success, Instant::now())
    }

    pub fn release_at(&self, success: bool, now: Instant) -> ReleaseOutcome {
        let (callback, all_succeeded) = {
            let mut state = self.state.lock();
            if self.status_of(&state, now).is_terminal() {
                trace!(set_id = %self.id, "release on terminal set ignored");
                return ReleaseOutcome::Ignored;
            }
            if state.outstanding == 0 {
                warn!(set_id = %self.id, "release with no outstanding references");
                return ReleaseOutcome::Ignored;
            }

            state.outstanding -= 1;
            if !success {
                state.failed = true;
            }
            if state.outstanding > 0 {
                return ReleaseOutcome::Pending {
                    outstanding: state.outstanding,
                };
            }

            state.complete = true;
            (state.callback.take(), !state.failed)
        };

        if let Some(callback) = callback {
            callback(all_succeeded);
        }
        ReleaseOutcome::Completed
    }

    /// Lifecycle state as of `now`.
    pub fn status_at(&self, now: Instant) -> SetStatus {
        let state = self.state.lock();
        self.status_of(&state, now)
    }

    pub fn status(&self) -> SetStatus {
        self.status_at(Instant::now())
    }

    /// Whether the set is complete or expired as of `now`. Side-effect free.
    pub fn is_done_at(&self, now: Instant) -> bool {
        self.status_at(now).is_terminal()
    }

    pub fn is_done(&self) -> bool {
        self.is_done_at(Instant::now())
    }

    fn status_of(&self, state: &SetState, now: Instant) -> SetStatus {
        if state.complete {
            SetStatus::Complete
        } else if now >= self.deadline {
            SetStatus::Expired
        } else {
            SetStatus::Active
        }
    }
}

impl fmt::Debug for AcknowledgementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AcknowledgementSet")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .field("outstanding", &state.outstanding)
            .field("complete", &state.complete)
            .field("failed", &state.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn counting_set(outstanding: u64, timeout: Duration) -> (AcknowledgementSet, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let set = AcknowledgementSet::new(
            AckSetId(1),
            outstanding,
            timeout,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (set, fired)
    }

    #[test]
    fn test_completes_after_last_release() {
        let (set, fired) = counting_set(3, Duration::from_secs(60));

        assert_eq!(set.release(true), ReleaseOutcome::Pending { outstanding: 2 });
        assert_eq!(set.release(true), ReleaseOutcome::Pending { outstanding: 1 });
        assert!(!set.is_done());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert_eq!(set.release(true), ReleaseOutcome::Completed);
        assert!(set.is_done());
        assert_eq!(set.status(), SetStatus::Complete);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_never_fires_twice() {
        let (set, fired) = counting_set(1, Duration::from_secs(60));

        assert_eq!(set.release(true), ReleaseOutcome::Completed);
        assert_eq!(set.release(true), ReleaseOutcome::Ignored);
        assert_eq!(set.outstanding(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_acquire_on_terminal_set_is_noop() {
        let (set, _) = counting_set(1, Duration::from_secs(60));
        set.release(true);

        assert!(!set.acquire());
        assert_eq!(set.outstanding(), 0);
        assert_eq!(set.status(), SetStatus::Complete);
    }

    #[test]
    fn test_acquire_extends_outstanding() {
        let (set, fired) = counting_set(1, Duration::from_secs(60));

        assert!(set.acquire());
        assert_eq!(set.outstanding(), 2);
        assert_eq!(set.release(true), ReleaseOutcome::Pending { outstanding: 1 });
        assert_eq!(set.release(true), ReleaseOutcome::Completed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_release_still_counts() {
        let outcome = Arc::new(parking_lot::Mutex::new(None));
        let sink = outcome.clone();
        let set = AcknowledgementSet::new(
            AckSetId(2),
            2,
            Duration::from_secs(60),
            Box::new(move |ok| *sink.lock() = Some(ok)),
        );

        assert_eq!(set.release(false), ReleaseOutcome::Pending { outstanding: 1 });
        assert!(set.has_failures());
        assert_eq!(set.release(true), ReleaseOutcome::Completed);
        assert_eq!(*outcome.lock(), Some(false));
    }

    #[test]
    fn test_expires_without_activity() {
        let (set, fired) = counting_set(3, Duration::from_secs(1));
        let start = Instant::now();

        assert!(!set.is_done_at(start));
        let later = set.deadline() + Duration::from_millis(1);
        assert!(set.is_done_at(later));
        assert_eq!(set.status_at(later), SetStatus::Expired);
        assert_eq!(set.outstanding(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_expires_after_real_deadline() {
        let (set, fired) = counting_set(3, Duration::from_millis(50));
        std::thread::sleep(Duration::from_millis(60));

        assert!(set.is_done());
        assert_eq!(set.status(), SetStatus::Expired);
        assert_eq!(set.outstanding(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_release_after_expiry_is_ignored() {
        let (set, fired) = counting_set(1, Duration::from_secs(1));
        let later = set.deadline() + Duration::from_secs(1);

        assert_eq!(set.release_at(true, later), ReleaseOutcome::Ignored);
        assert!(!set.acquire_at(later));
        assert_eq!(set.outstanding(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[traced_test]
    #[test]
    fn test_empty_set_release_is_ignored() {
        let (set, fired) = counting_set(0, Duration::from_secs(60));

        assert_eq!(set.release(true), ReleaseOutcome::Ignored);
        assert_eq!(set.status(), SetStatus::Active);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(logs_contain("release with no outstanding references"));
    }

    #[test]
    fn test_concurrent_releases_fire_once() {
        let (set, fired) = counting_set(1000, Duration::from_secs(60));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..200 {
                        set.release(true);
                    }
                });
            }
        });

        assert_eq!(set.outstanding(), 0);
        assert_eq!(set.status(), SetStatus::Complete);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_sets_handle() {
        let (set, _) = counting_set(1, Duration::from_secs(60));
        let mut event = Event::new(ackflow_types::EventKind::Log);
        set.bind(&mut event);

        assert_eq!(event.handle(), Some(&set.handle()));
        assert_eq!(set.outstanding(), 1);
    }
}
