//! Fan-out routing for pipelines with acknowledgement tracking.
//!
//! At a branching point a record may go to several destinations. If one of
//! them is a connector into another pipeline, the branches must not share the
//! record, or one acknowledgement reference would be released twice.
//!
//! ```text
//!                      ┌──► sink        (original)
//! records ─► Router ───┤
//!                      └──► connector   (copy, own reference)
//! ```
//!
//! - [`RouterCopyRecordStrategy`] - decides share versus copy per record
//! - [`Router`] - applies the strategy across destinations and balances
//!   acknowledgement references

mod router;
mod strategy;

pub use router::{Destination, RoutePredicate, RouteSummary, Router};
pub use strategy::{RoutedRecord, RouterCopyRecordStrategy};
