//! Collaborator traits for acknowledgement tracking and fan-out routing.

use crate::CopyError;
use ackflow_types::{Event, EventHandle};

/// Acknowledgement bookkeeping as seen by pipeline stages.
///
/// A stage calls [`acquire`](Self::acquire) before it starts processing an
/// event and [`release`](Self::release) when it is done. Implementations must
/// tolerate handles whose set no longer exists: that is a normal race with the
/// reaper and must never panic.
///
/// # Example
///
/// ```ignore
/// if let Some(handle) = record.data().handle() {
///     tracker.acquire(handle);
///     let ok = stage.process(&record);
///     tracker.release(handle, ok);
/// }
/// ```
pub trait AcknowledgementTracker: Send + Sync {
    /// Register one more outstanding reference on the handle's set.
    fn acquire(&self, handle: &EventHandle);

    /// Resolve one outstanding reference on the handle's set.
    ///
    /// `success` reports whether this stage processed the event successfully.
    /// The reference is accounted for either way.
    fn release(&self, handle: &EventHandle, success: bool);
}

/// Builds independent copies of events for fan-out.
pub trait EventFactory: Send + Sync {
    /// Create a new event with the same kind and field values as `event`.
    ///
    /// The returned event carries no handle; binding it to an acknowledgement
    /// set is the caller's job.
    fn copy_event(&self, event: &Event) -> Result<Event, CopyError>;
}

/// A destination at a branching point of the pipeline.
pub trait DataFlowComponent {
    /// Human-readable component name, used in logs.
    fn name(&self) -> &str;

    /// Whether this destination forwards records into another, independently
    /// running pipeline.
    fn is_pipeline_connector(&self) -> bool;
}

impl<T: DataFlowComponent + ?Sized> DataFlowComponent for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_pipeline_connector(&self) -> bool {
        (**self).is_pipeline_connector()
    }
}
