//! Core types for ackflow.
//!
//! This crate holds the data the acknowledgement subsystem and the fan-out
//! router pass around:
//!
//! - [`AckSetId`] / [`RecordId`] - opaque identities assigned at creation
//! - [`Event`] - a structured payload with an optional [`EventHandle`]
//! - [`Record`] - an identity-bearing wrapper shared between stages

mod event;
mod identifiers;
mod record;

pub use event::{Event, EventHandle, EventKind};
pub use identifiers::{AckSetId, AckSetIdAllocator, RecordId};
pub use record::Record;
