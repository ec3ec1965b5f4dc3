//! Copy-versus-share decision at a branching point.
//!
//! When one record is routed to several destinations and one of them forwards
//! into another pipeline, the branches must not share a record: both would
//! release the same handle reference and the owning acknowledgement set would
//! be decremented twice for one unit of work. The strategy hands the original
//! to the first branch that claims a record and an independent copy, with its
//! own acquired reference, to every later branch.

use ackflow_core::{AcknowledgementTracker, CopyError, DataFlowComponent, EventFactory};
use ackflow_types::{Record, RecordId};
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a destination receives for one record.
#[derive(Debug)]
pub enum RoutedRecord {
    /// The original record, shared with the caller.
    Shared(Arc<Record>),
    /// An independent copy bound to the same acknowledgement set.
    Copied(Arc<Record>),
    /// Copying failed; the original is handed out instead.
    Fallback {
        record: Arc<Record>,
        error: CopyError,
    },
}

impl RoutedRecord {
    pub fn record(&self) -> &Arc<Record> {
        match self {
            RoutedRecord::Shared(record)
            | RoutedRecord::Copied(record)
            | RoutedRecord::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> Arc<Record> {
        match self {
            RoutedRecord::Shared(record)
            | RoutedRecord::Copied(record)
            | RoutedRecord::Fallback { record, .. } => record,
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, RoutedRecord::Copied(_))
    }
}

/// Per-distribution-point record strategy.
///
/// In pass-through mode every call returns its input. Copy mode is chosen at
/// construction when there is more than one destination and at least one of
/// them is a pipeline connector. The claim set lives as long as the strategy,
/// so "first claim wins the original" is decided once per record per
/// distribution point.
///
/// Claims are never pruned, so the claim set grows with every distinct
/// record routed. Long-running hosts should rebuild the strategy (and its
/// router) whenever the destination topology is rebuilt.
pub struct RouterCopyRecordStrategy {
    factory: Arc<dyn EventFactory>,
    tracker: Arc<dyn AcknowledgementTracker>,
    /// `None` in pass-through mode.
    claimed: Option<DashSet<RecordId>>,
    first_batch_taken: AtomicBool,
    copies: AtomicU64,
    copy_failures: AtomicU64,
}

impl RouterCopyRecordStrategy {
    /// Create a strategy for the given destinations.
    ///
    /// # Arguments
    ///
    /// * `factory` - Builds event copies
    /// * `tracker` - Acquires a reference for every copy bound to a set
    /// * `destinations` - Every destination fed from this branching point
    pub fn new<C: DataFlowComponent>(
        factory: Arc<dyn EventFactory>,
        tracker: Arc<dyn AcknowledgementTracker>,
        destinations: &[C],
    ) -> Self {
        let needs_copies = destinations.len() > 1
            && destinations.iter().any(|d| d.is_pipeline_connector());
        if needs_copies {
            debug!(
                destinations = destinations.len(),
                "fan-out includes a pipeline connector, copying repeated records"
            );
        }

        Self {
            factory,
            tracker,
            claimed: needs_copies.then(DashSet::new),
            first_batch_taken: AtomicBool::new(false),
            copies: AtomicU64::new(0),
            copy_failures: AtomicU64::new(0),
        }
    }

    /// Whether this strategy may produce copies.
    pub fn is_copy_mode(&self) -> bool {
        self.claimed.is_some()
    }

    /// Resolve one record for one destination.
    pub fn get_record(&self, record: &Arc<Record>) -> RoutedRecord {
        let Some(claimed) = &self.claimed else {
            return RoutedRecord::Shared(record.clone());
        };

        // insert() is the atomic test-and-claim: exactly one caller sees true.
        if claimed.insert(record.id()) {
            return RoutedRecord::Shared(record.clone());
        }
        self.copy_or_share(record)
    }

    /// Resolve a whole batch for one destination.
    ///
    /// While nothing has been claimed yet, the batch is claimed wholesale and
    /// returned unchanged, repeated records included. Once any record is
    /// claimed, every batch goes through [`get_record`](Self::get_record).
    pub fn get_all_records(&self, records: Vec<Arc<Record>>) -> Vec<Arc<Record>> {
        let Some(claimed) = &self.claimed else {
            return records;
        };

        // The flag admits one wholesale claim; the emptiness check rules it
        // out once get_record has claimed anything.
        if claimed.is_empty() && !self.first_batch_taken.swap(true, Ordering::AcqRel) {
            for record in &records {
                claimed.insert(record.id());
            }
            return records;
        }

        records
            .iter()
            .map(|record| self.get_record(record).into_record())
            .collect()
    }

    fn copy_or_share(&self, record: &Arc<Record>) -> RoutedRecord {
        match self.copy(record) {
            Ok(copy) => {
                self.copies.fetch_add(1, Ordering::Relaxed);
                RoutedRecord::Copied(copy)
            }
            Err(error) => {
                self.copy_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    record_id = %record.id(),
                    %error,
                    "record copy failed, sharing the original with another branch"
                );
                RoutedRecord::Fallback {
                    record: record.clone(),
                    error,
                }
            }
        }
    }

    /// Copies produced so far.
    pub fn copies(&self) -> u64 {
        self.copies.load(Ordering::Relaxed)
    }

    /// Copy attempts that fell back to sharing.
    pub fn copy_failures(&self) -> u64 {
        self.copy_failures.load(Ordering::Relaxed)
    }

    fn copy(&self, record: &Record) -> Result<Arc<Record>, CopyError> {
        let mut event = self.factory.copy_event(record.data())?;
        if let Some(handle) = record.data().handle() {
            self.tracker.acquire(handle);
            event.set_handle(*handle);
        }
        Ok(Arc::new(Record::new(event)))
    }
}

impl std::fmt::Debug for RouterCopyRecordStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterCopyRecordStrategy")
            .field("copy_mode", &self.is_copy_mode())
            .field("claimed", &self.claimed.as_ref().map(|c| c.len()))
            .field("copies", &self.copies())
            .field("copy_failures", &self.copy_failures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ackflow_acknowledgements::AcknowledgementSetManager;
    use ackflow_core::DefaultEventFactory;
    use ackflow_test_helpers::{
        bound_log_record, connector, log_record, sink, span_record, RecordingTracker,
    };
    use ackflow_types::{AckSetId, Event, EventKind};
    use std::time::Duration;
    use tracing_test::traced_test;

    fn copy_strategy(tracker: Arc<dyn AcknowledgementTracker>) -> RouterCopyRecordStrategy {
        RouterCopyRecordStrategy::new(
            Arc::new(DefaultEventFactory),
            tracker,
            &[sink("opensearch"), connector("audit-pipeline")],
        )
    }

    #[test]
    fn test_single_destination_never_copies() {
        let strategy = RouterCopyRecordStrategy::new(
            Arc::new(DefaultEventFactory),
            Arc::new(RecordingTracker::default()),
            &[connector("downstream")],
        );
        assert!(!strategy.is_copy_mode());

        let record = log_record("hello");
        for _ in 0..3 {
            let routed = strategy.get_record(&record);
            assert!(Arc::ptr_eq(routed.record(), &record));
        }
        assert_eq!(strategy.copies(), 0);
    }

    #[test]
    fn test_sinks_without_connector_share() {
        let strategy = RouterCopyRecordStrategy::new(
            Arc::new(DefaultEventFactory),
            Arc::new(RecordingTracker::default()),
            &[sink("a"), sink("b")],
        );
        assert!(!strategy.is_copy_mode());

        let batch = vec![log_record("x"), log_record("y")];
        let out = strategy.get_all_records(batch.clone());
        assert!(out.iter().zip(&batch).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn test_first_claim_gets_original() {
        let strategy = copy_strategy(Arc::new(RecordingTracker::default()));
        assert!(strategy.is_copy_mode());
        let record = log_record("hello");

        let first = strategy.get_record(&record);
        assert!(matches!(first, RoutedRecord::Shared(_)));
        assert!(Arc::ptr_eq(first.record(), &record));

        let second = strategy.get_record(&record);
        assert!(second.is_copy());
        assert!(!Arc::ptr_eq(second.record(), &record));
        assert_ne!(second.record().id(), record.id());
        assert_eq!(second.record().data().fields(), record.data().fields());
        assert_eq!(strategy.copies(), 1);
    }

    #[test]
    fn test_copy_acquires_reference_on_same_set() {
        let manager = Arc::new(AcknowledgementSetManager::default());
        let mut events = vec![Event::new(EventKind::Log).with_field("message", "m")];
        let set = manager.create(&mut events, Duration::from_secs(60), Box::new(|_| {}));
        let record = Arc::new(Record::new(events.remove(0)));

        let strategy = copy_strategy(manager.clone());
        let original = strategy.get_record(&record).into_record();
        let copy = strategy.get_record(&record).into_record();

        assert_eq!(copy.data().handle(), record.data().handle());
        assert_eq!(set.outstanding(), 2);

        manager.release_event(original.data(), true);
        assert!(!set.is_done());
        manager.release_event(copy.data(), true);
        assert!(set.is_done());
    }

    #[traced_test]
    #[test]
    fn test_copy_failure_falls_back_to_original() {
        let strategy = copy_strategy(Arc::new(RecordingTracker::default()));
        let record = span_record(&[("traceId", "t1"), ("name", "GET /")]);

        strategy.get_record(&record);
        let routed = strategy.get_record(&record);

        match &routed {
            RoutedRecord::Fallback { record: shared, error } => {
                assert!(Arc::ptr_eq(shared, &record));
                assert!(matches!(error, CopyError::MissingField { field: "spanId", .. }));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(strategy.copy_failures(), 1);
        assert_eq!(strategy.copies(), 0);
        assert!(logs_contain("record copy failed"));
    }

    #[test]
    fn test_first_batch_unchanged_then_copies() {
        let tracker = Arc::new(RecordingTracker::default());
        let strategy = copy_strategy(tracker.clone());
        let batch: Vec<Arc<Record>> = ["a", "b", "c"]
            .iter()
            .map(|m| bound_log_record(m, AckSetId(1)))
            .collect();

        let first = strategy.get_all_records(batch.clone());
        assert_eq!(first.len(), 3);
        assert!(first.iter().zip(&batch).all(|(a, b)| Arc::ptr_eq(a, b)));
        assert_eq!(strategy.copies(), 0);

        let second = strategy.get_all_records(batch.clone());
        assert_eq!(second.len(), 3);
        for (copy, original) in second.iter().zip(&batch) {
            assert!(!Arc::ptr_eq(copy, original));
            assert_eq!(copy.data().fields(), original.data().fields());
        }
        assert_eq!(strategy.copies(), 3);
        assert_eq!(tracker.acquires(), 3);
    }

    #[test]
    fn test_first_batch_keeps_repeated_records() {
        let strategy = copy_strategy(Arc::new(RecordingTracker::default()));
        let record = log_record("twice");

        let out = strategy.get_all_records(vec![record.clone(), record.clone()]);
        assert!(Arc::ptr_eq(&out[0], &record));
        assert!(Arc::ptr_eq(&out[1], &record));
        assert_eq!(strategy.copies(), 0);

        let again = strategy.get_all_records(vec![record.clone()]);
        assert!(!Arc::ptr_eq(&again[0], &record));
        assert_eq!(strategy.copies(), 1);
    }

    #[test]
    fn test_batch_after_single_claim_is_resolved_per_record() {
        let strategy = copy_strategy(Arc::new(RecordingTracker::default()));
        let claimed = log_record("claimed");
        let fresh = log_record("fresh");
        strategy.get_record(&claimed);

        let out = strategy.get_all_records(vec![claimed.clone(), fresh.clone()]);
        assert!(!Arc::ptr_eq(&out[0], &claimed));
        assert!(Arc::ptr_eq(&out[1], &fresh));
        assert_eq!(strategy.copies(), 1);

        let later = strategy.get_all_records(vec![fresh.clone()]);
        assert!(!Arc::ptr_eq(&later[0], &fresh));
        assert_eq!(strategy.copies(), 2);
    }

    #[test]
    fn test_later_batch_shares_unseen_records() {
        let strategy = copy_strategy(Arc::new(RecordingTracker::default()));
        let seen = log_record("seen");
        strategy.get_all_records(vec![seen.clone()]);

        let fresh = log_record("fresh");
        let out = strategy.get_all_records(vec![seen.clone(), fresh.clone()]);
        assert!(!Arc::ptr_eq(&out[0], &seen));
        assert!(Arc::ptr_eq(&out[1], &fresh));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let strategy = copy_strategy(Arc::new(RecordingTracker::default()));
        let record = log_record("contended");

        let originals: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let routed = strategy.get_record(&record);
                        usize::from(Arc::ptr_eq(routed.record(), &record))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(originals, 1);
        assert_eq!(strategy.copies(), 7);
    }
}
