//! Producer- and stage-facing entry point for acknowledgement tracking.

use crate::{
    AcknowledgementConfig, AcknowledgementSet, AcknowledgementSetMonitor, CompletionCallback,
};
use ackflow_core::AcknowledgementTracker;
use ackflow_types::{AckSetIdAllocator, Event, EventHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Creates acknowledgement sets and routes stage acquire/release calls to the
/// shared monitor.
///
/// Producers create one set per unit of ingested work:
///
/// ```ignore
/// let mut events = read_batch();
/// manager.create(&mut events, Duration::from_secs(30), Box::new(|ok| {
///     if ok { source.commit_offsets() } else { source.rewind() }
/// }));
/// for event in events { pipeline.send(Record::new(event)).await; }
/// ```
#[derive(Debug)]
pub struct AcknowledgementSetManager {
    monitor: Arc<AcknowledgementSetMonitor>,
    ids: AckSetIdAllocator,
    config: AcknowledgementConfig,
}

impl AcknowledgementSetManager {
    /// Create a manager with its own monitor.
    pub fn new(config: AcknowledgementConfig) -> Self {
        Self::with_monitor(config, Arc::new(AcknowledgementSetMonitor::new()))
    }

    /// Create a manager around an existing monitor.
    pub fn with_monitor(
        config: AcknowledgementConfig,
        monitor: Arc<AcknowledgementSetMonitor>,
    ) -> Self {
        Self {
            monitor,
            ids: AckSetIdAllocator::new(),
            config,
        }
    }

    pub fn monitor(&self) -> &Arc<AcknowledgementSetMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &AcknowledgementConfig {
        &self.config
    }

    /// Create and register a set covering `events`.
    ///
    /// Every event is bound to the new set and the outstanding count starts
    /// at `events.len()`, so the set cannot complete before all of them have
    /// been handed out.
    pub fn create(
        &self,
        events: &mut [Event],
        timeout: Duration,
        callback: CompletionCallback,
    ) -> Arc<AcknowledgementSet> {
        let set = self.create_with_outstanding(events.len() as u64, timeout, callback);
        for event in events.iter_mut() {
            set.bind(event);
        }
        set
    }

    /// Like [`create`](Self::create) with the configured default timeout.
    pub fn create_with_default_timeout(
        &self,
        events: &mut [Event],
        callback: CompletionCallback,
    ) -> Arc<AcknowledgementSet> {
        self.create(events, self.config.default_timeout, callback)
    }

    /// Create and register a set with an explicit outstanding count.
    pub fn create_with_outstanding(
        &self,
        outstanding: u64,
        timeout: Duration,
        callback: CompletionCallback,
    ) -> Arc<AcknowledgementSet> {
        let id = self.ids.allocate();
        let set = Arc::new(AcknowledgementSet::new(id, outstanding, timeout, callback));
        self.monitor.add(set.clone());
        debug!(set_id = %id, outstanding, ?timeout, "created acknowledgement set");
        set
    }

    /// Acquire on behalf of `event`. Untracked events are ignored.
    pub fn acquire_event(&self, event: &Event) -> bool {
        match event.handle() {
            Some(handle) => self.monitor.acquire(handle),
            None => false,
        }
    }

    /// Release on behalf of `event`. Untracked events are ignored.
    pub fn release_event(&self, event: &Event, success: bool) -> bool {
        match event.handle() {
            Some(handle) => self.monitor.release(handle, success),
            None => false,
        }
    }

    /// Start the periodic reaper at the configured interval.
    pub fn spawn_reaper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        crate::spawn_reaper(self.monitor.clone(), self.config.reaper_interval, shutdown)
    }
}

impl Default for AcknowledgementSetManager {
    fn default() -> Self {
        Self::new(AcknowledgementConfig::default())
    }
}

impl AcknowledgementTracker for AcknowledgementSetManager {
    fn acquire(&self, handle: &EventHandle) {
        self.monitor.acquire(handle);
    }

    fn release(&self, handle: &EventHandle, success: bool) {
        self.monitor.release(handle, success);
    }
}
