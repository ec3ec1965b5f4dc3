//! Distributes a batch of records across the destinations of one branching
//! point.

use crate::RouterCopyRecordStrategy;
use ackflow_core::{AcknowledgementTracker, DataFlowComponent, EventFactory};
use ackflow_types::{EventHandle, Record, RecordId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Filter deciding whether a destination receives a record.
pub type RoutePredicate = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// A destination plus its optional route condition.
///
/// A destination without a route receives every record.
pub struct Destination<C> {
    component: C,
    route: Option<RoutePredicate>,
}

impl<C: DataFlowComponent> Destination<C> {
    /// A destination that receives every record.
    pub fn new(component: C) -> Self {
        Self {
            component,
            route: None,
        }
    }

    /// A destination that receives only records matching `route`.
    pub fn with_route(component: C, route: RoutePredicate) -> Self {
        Self {
            component,
            route: Some(route),
        }
    }

    pub fn component(&self) -> &C {
        &self.component
    }
}

impl<C: DataFlowComponent> DataFlowComponent for Destination<C> {
    fn name(&self) -> &str {
        self.component.name()
    }

    fn is_pipeline_connector(&self) -> bool {
        self.component.is_pipeline_connector()
    }
}

/// Outcome of routing one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouteSummary {
    /// Record deliveries across all destinations.
    pub deliveries: usize,
    /// Input references no destination took; they were released.
    pub unrouted: usize,
    /// Extra references acquired for originals delivered more often than
    /// they arrived.
    pub shared_acquires: usize,
}

/// Fan-out router for one branching point.
///
/// Every record reference leaving the router is owned by exactly one
/// destination. Copies already carry their own reference. When the strategy
/// shares an original with more than one destination, the router acquires
/// the extra references before delivery. Records that match no destination
/// are released as successful so their sets are not held open.
pub struct Router<C> {
    destinations: Vec<Destination<C>>,
    strategy: RouterCopyRecordStrategy,
    tracker: Arc<dyn AcknowledgementTracker>,
}

impl<C: DataFlowComponent> Router<C> {
    pub fn new(
        destinations: Vec<Destination<C>>,
        factory: Arc<dyn EventFactory>,
        tracker: Arc<dyn AcknowledgementTracker>,
    ) -> Self {
        let strategy = RouterCopyRecordStrategy::new(factory, tracker.clone(), &destinations);
        Self {
            destinations,
            strategy,
            tracker,
        }
    }

    pub fn destinations(&self) -> &[Destination<C>] {
        &self.destinations
    }

    pub fn strategy(&self) -> &RouterCopyRecordStrategy {
        &self.strategy
    }

    /// Route `records` and hand each destination its share.
    ///
    /// All acknowledgement adjustments happen before the first delivery, so a
    /// destination that processes and releases synchronously cannot complete
    /// a set while another branch is still about to receive it.
    pub fn route<F>(&self, records: Vec<Arc<Record>>, mut deliver: F) -> RouteSummary
    where
        F: FnMut(&C, Vec<Arc<Record>>),
    {
        let mut batches: Vec<Vec<Arc<Record>>> = Vec::with_capacity(self.destinations.len());
        for destination in &self.destinations {
            let batch = match &destination.route {
                None => self.strategy.get_all_records(records.clone()),
                Some(route) => records
                    .iter()
                    .filter(|record| route(record))
                    .map(|record| self.strategy.get_record(record).into_record())
                    .collect(),
            };
            trace!(
                destination = destination.name(),
                records = batch.len(),
                "routed batch"
            );
            batches.push(batch);
        }

        let mut summary = RouteSummary::default();
        let mut delivered: HashMap<RecordId, usize> = HashMap::with_capacity(records.len());
        for batch in &batches {
            summary.deliveries += batch.len();
            for record in batch {
                *delivered.entry(record.id()).or_insert(0) += 1;
            }
        }

        // Each input occurrence carries one reference. Deliveries of the same
        // record beyond that need an acquire; occurrences never delivered are
        // released.
        let mut received: HashMap<RecordId, (EventHandle, usize)> =
            HashMap::with_capacity(records.len());
        for record in &records {
            if let Some(handle) = record.data().handle() {
                received.entry(record.id()).or_insert((*handle, 0)).1 += 1;
            }
        }
        for (id, (handle, held)) in &received {
            let out = delivered.get(id).copied().unwrap_or(0);
            for _ in *held..out {
                self.tracker.acquire(handle);
                summary.shared_acquires += 1;
            }
            for _ in out..*held {
                self.tracker.release(handle, true);
                summary.unrouted += 1;
            }
        }

        for (destination, batch) in self.destinations.iter().zip(batches) {
            if !batch.is_empty() {
                deliver(&destination.component, batch);
            }
        }
        summary
    }
}
