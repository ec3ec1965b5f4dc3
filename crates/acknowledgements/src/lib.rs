//! Acknowledgement tracking for pipeline events.
//!
//! This crate answers one question for a pipeline engine: has every event
//! derived from a unit of ingested work been processed, or has the work timed
//! out?
//!
//! # Architecture
//!
//! ```text
//!  Producer                     Stages                       Reaper task
//!     │                            │                              │
//!     │ create(events, timeout)    │ acquire(handle)              │ run()
//!     ▼                            │ release(handle, ok)          │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ AcknowledgementSetMonitor                                           │
//! │   fair mutex ─► HashMap<AckSetId, Arc<AcknowledgementSet>>          │
//! │   invalid_acquires / invalid_releases (atomic)                      │
//! └───────────────┬─────────────────────────────────────────────────────┘
//!                 │ membership confirmed
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ AcknowledgementSet (own mutex)                                      │
//! │   outstanding ─► 0  => Complete, callback fires once                │
//! │   deadline passed   => Expired                                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`AcknowledgementSet`] - per-unit counter, deadline and callback
//! - [`AcknowledgementSetMonitor`] - registry, reaper and invalid-op counters
//! - [`AcknowledgementSetManager`] - set creation and event-level helpers
//! - [`spawn_reaper`] - tokio task driving the reaper on an interval

mod config;
mod manager;
mod monitor;
mod reaper;
mod set;

pub use config::AcknowledgementConfig;
pub use manager::AcknowledgementSetManager;
pub use monitor::AcknowledgementSetMonitor;
pub use reaper::spawn_reaper;
pub use set::{AcknowledgementSet, CompletionCallback, ReleaseOutcome, SetStatus};
