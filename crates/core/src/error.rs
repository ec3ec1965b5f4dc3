//! Error types for record duplication.

use ackflow_types::EventKind;
use thiserror::Error;

/// Errors while building an independent copy of an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    /// A field the event kind requires is absent.
    #[error("Cannot copy {kind} event: missing required field `{field}`")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },

    /// The event kind cannot be duplicated by this factory.
    #[error("Event kind {0} is not copyable")]
    Unsupported(EventKind),
}
