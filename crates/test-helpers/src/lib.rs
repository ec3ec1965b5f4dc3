//! Shared fixtures for ackflow tests.

use ackflow_acknowledgements::{AcknowledgementSet, AcknowledgementSetManager};
use ackflow_core::{AcknowledgementTracker, DataFlowComponent};
use ackflow_types::{AckSetId, Event, EventHandle, EventKind, Record};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A named destination that is either a sink or a pipeline connector.
#[derive(Debug, Clone)]
pub struct TestDestination {
    name: String,
    connector: bool,
}

impl DataFlowComponent for TestDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_pipeline_connector(&self) -> bool {
        self.connector
    }
}

/// A terminal sink.
pub fn sink(name: &str) -> TestDestination {
    TestDestination {
        name: name.to_string(),
        connector: false,
    }
}

/// A connector into another pipeline.
pub fn connector(name: &str) -> TestDestination {
    TestDestination {
        name: name.to_string(),
        connector: true,
    }
}

/// An untracked log record with a `message` field.
pub fn log_record(message: &str) -> Arc<Record> {
    Arc::new(Record::new(
        Event::new(EventKind::Log).with_field("message", message),
    ))
}

/// A log record whose handle names `set`, without touching any registry.
pub fn bound_log_record(message: &str, set: AckSetId) -> Arc<Record> {
    let mut event = Event::new(EventKind::Log).with_field("message", message);
    event.set_handle(EventHandle::new(set));
    Arc::new(Record::new(event))
}

/// An untracked span record with the given string fields.
pub fn span_record(fields: &[(&str, &str)]) -> Arc<Record> {
    let mut event = Event::new(EventKind::Span);
    for (key, value) in fields {
        event.put(*key, *value);
    }
    Arc::new(Record::new(event))
}

/// Create `count` log records covered by one new acknowledgement set.
pub fn tracked_records(
    manager: &AcknowledgementSetManager,
    count: usize,
    timeout: Duration,
) -> (Arc<AcknowledgementSet>, Vec<Arc<Record>>) {
    let mut events: Vec<Event> = (0..count)
        .map(|i| Event::new(EventKind::Log).with_field("seq", i as u64))
        .collect();
    let set = manager.create(&mut events, timeout, Box::new(|_| {}));
    let records = events
        .into_iter()
        .map(|event| Arc::new(Record::new(event)))
        .collect();
    (set, records)
}

/// Tracker that only counts calls.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    acquires: AtomicU64,
    releases: AtomicU64,
    failed_releases: AtomicU64,
}

impl RecordingTracker {
    pub fn acquires(&self) -> u64 {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn failed_releases(&self) -> u64 {
        self.failed_releases.load(Ordering::SeqCst)
    }
}

impl AcknowledgementTracker for RecordingTracker {
    fn acquire(&self, _handle: &EventHandle) {
        self.acquires.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self, _handle: &EventHandle, success: bool) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if !success {
            self.failed_releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
