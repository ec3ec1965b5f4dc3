//! Pipeline events and the handles that tie them to acknowledgement sets.

use crate::AckSetId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of payload an event carries.
///
/// The kind decides how an event may be duplicated: spans must keep their
/// identifying fields, logs and metrics are free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Log,
    Span,
    Metric,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Log => write!(f, "log"),
            EventKind::Span => write!(f, "span"),
            EventKind::Metric => write!(f, "metric"),
        }
    }
}

/// Non-owning link from an in-flight event to its acknowledgement set.
///
/// A handle only names the set. It never keeps the set alive: the
/// acknowledgement registry owns every live set, and once the set is reaped
/// any acquire or release through the handle is reported as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHandle {
    set: AckSetId,
}

impl EventHandle {
    /// Create a handle bound to the given set.
    pub fn new(set: AckSetId) -> Self {
        Self { set }
    }

    /// The set this handle belongs to.
    pub fn set_id(&self) -> AckSetId {
        self.set
    }
}

/// A structured pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    fields: BTreeMap<String, Value>,
    #[serde(skip)]
    handle: Option<EventHandle>,
}

impl Event {
    /// Create an empty event of the given kind.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            handle: None,
        }
    }

    /// Create a log event from an existing field map.
    pub fn log(fields: BTreeMap<String, Value>) -> Self {
        Self {
            kind: EventKind::Log,
            fields,
            handle: None,
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// The acknowledgement handle, if this event is tracked.
    pub fn handle(&self) -> Option<&EventHandle> {
        self.handle.as_ref()
    }

    /// Bind this event to an acknowledgement set.
    ///
    /// Rebinding replaces the previous handle; callers bind once at creation.
    pub fn set_handle(&mut self, handle: EventHandle) {
        self.handle = Some(handle);
    }

    /// Detach the handle, returning it.
    pub fn take_handle(&mut self) -> Option<EventHandle> {
        self.handle.take()
    }
}
