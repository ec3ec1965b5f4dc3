//! Default event duplication.

use crate::{CopyError, EventFactory};
use ackflow_types::{Event, EventKind};

/// Fields every span must carry to be reconstructed.
pub const REQUIRED_SPAN_FIELDS: [&str; 3] = ["traceId", "spanId", "name"];

/// Field-by-field event copier.
///
/// Log and metric events are copied verbatim. Spans are rebuilt only when
/// their identifying fields are present, mirroring how a span model refuses to
/// build without a trace id, span id and name.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEventFactory;

impl DefaultEventFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EventFactory for DefaultEventFactory {
    fn copy_event(&self, event: &Event) -> Result<Event, CopyError> {
        if event.kind() == EventKind::Span {
            if let Some(&field) = REQUIRED_SPAN_FIELDS
                .iter()
                .find(|field| event.get(field).is_none())
            {
                return Err(CopyError::MissingField {
                    kind: EventKind::Span,
                    field,
                });
            }
        }

        let mut copy = Event::new(event.kind());
        for (key, value) in event.fields() {
            copy.put(key.clone(), value.clone());
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ackflow_types::{AckSetId, EventHandle};

    #[test]
    fn test_copy_log_event() {
        let mut event = Event::new(EventKind::Log)
            .with_field("message", "disk full")
            .with_field("level", "warn");
        event.set_handle(EventHandle::new(AckSetId(1)));

        let copy = DefaultEventFactory.copy_event(&event).unwrap();
        assert_eq!(copy.kind(), EventKind::Log);
        assert_eq!(copy.fields(), event.fields());
        assert!(copy.handle().is_none(), "copies start unbound");
    }

    #[test]
    fn test_copy_span_requires_identifiers() {
        let span = Event::new(EventKind::Span)
            .with_field("traceId", "abc")
            .with_field("name", "GET /");

        let err = DefaultEventFactory.copy_event(&span).unwrap_err();
        assert_eq!(
            err,
            CopyError::MissingField {
                kind: EventKind::Span,
                field: "spanId",
            }
        );

        let span = span.with_field("spanId", "def");
        let copy = DefaultEventFactory.copy_event(&span).unwrap();
        assert_eq!(copy.fields(), span.fields());
    }
}
