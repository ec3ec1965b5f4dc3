//! Identity-bearing records passed between pipeline stages.

use crate::{Event, RecordId};

/// A record flowing through the pipeline.
///
/// Records are shared between stages as `Arc<Record>`. Equality of identity is
/// by [`RecordId`], never by payload: two records holding equal events are
/// still two records. `Record` is not `Clone`: duplicates are built through
/// an event factory and receive their own identity.
#[derive(Debug)]
pub struct Record {
    id: RecordId,
    data: Event,
}

impl Record {
    /// Wrap an event in a record with a fresh identity.
    pub fn new(data: Event) -> Self {
        Self {
            id: RecordId::next(),
            data,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn data(&self) -> &Event {
        &self.data
    }

    /// Unwrap the event.
    pub fn into_data(self) -> Event {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;

    #[test]
    fn test_equal_payloads_distinct_identity() {
        let a = Record::new(Event::new(EventKind::Log).with_field("k", 1));
        let b = Record::new(Event::new(EventKind::Log).with_field("k", 1));

        assert_eq!(a.data(), b.data());
        assert_ne!(a.id(), b.id());
    }
}
