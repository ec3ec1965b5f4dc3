//! Workload generation for simulations.
//!
//! Provides event generators that feed producers.

mod events;

pub use events::EventWorkload;

use ackflow_types::Event;

/// Trait for generating event workloads.
pub trait WorkloadGenerator {
    /// Generate one batch of events. A batch becomes one acknowledgement set.
    fn generate_batch(&mut self, rng: &mut impl rand::Rng) -> Vec<Event>;

    /// Generate a single event.
    fn generate_one(&mut self, rng: &mut impl rand::Rng) -> Event;
}
