//! Collaborator seams for ackflow.
//!
//! The acknowledgement subsystem and the fan-out router never talk to each
//! other directly. They meet at the traits defined here:
//!
//! - [`AcknowledgementTracker`] - acquire/release of event handles
//! - [`EventFactory`] - independent copies of events for fan-out
//! - [`DataFlowComponent`] - a destination at a branching point

mod error;
mod factory;
mod traits;

pub use error::CopyError;
pub use factory::{DefaultEventFactory, REQUIRED_SPAN_FIELDS};
pub use traits::{AcknowledgementTracker, DataFlowComponent, EventFactory};
