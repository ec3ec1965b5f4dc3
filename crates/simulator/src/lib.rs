//! ackflow simulator
//!
//! A long-running workload simulator for the acknowledgement subsystem and
//! the fan-out router. It drives real tokio tasks against the real
//! components, so it doubles as an end-to-end check of completion tracking
//! under concurrency.
//!
//! # Architecture
//!
//! - **Workload Generation**: log and span events, optionally malformed spans
//!   that cannot be copied
//! - **Producers**: one acknowledgement set per batch, routed through a
//!   sink and an optional pipeline connector
//! - **Stages**: acquire, process with a configurable failure rate, release
//! - **Metrics Collection**: completion, failure, copy and invalid-op counts
//!
//! # Example
//!
//! ```ignore
//! use ackflow_simulator::{Simulator, SimulatorConfig, WorkloadConfig};
//! use std::time::Duration;
//!
//! let config = SimulatorConfig::new(4)
//!     .with_workload(WorkloadConfig::default().with_batch_size(50))
//!     .with_stage_failure_rate(0.01);
//!
//! let report = Simulator::new(config).run_for(Duration::from_secs(30)).await;
//! report.print();
//! ```

pub mod config;
pub mod metrics;
pub mod runner;
pub mod workload;

pub use config::{ConfigError, SimulatorConfig, WorkloadConfig};
pub use metrics::{MetricsCollector, RoutingStats, SimulationReport};
pub use runner::{SimDestination, Simulator};
pub use workload::{EventWorkload, WorkloadGenerator};
