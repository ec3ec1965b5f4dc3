//! Metrics collected during a simulation run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared between producers, stages and completion callbacks.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    sets_created: AtomicU64,
    sets_completed: AtomicU64,
    sets_failed: AtomicU64,
    records_produced: AtomicU64,
    records_processed: AtomicU64,
    stage_failures: AtomicU64,
    unrouted: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_set_created(&self, records: usize) {
        self.sets_created.fetch_add(1, Ordering::Relaxed);
        self.records_produced
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Called from completion callbacks.
    pub fn record_set_completed(&self, all_succeeded: bool) {
        self.sets_completed.fetch_add(1, Ordering::Relaxed);
        if !all_succeeded {
            self.sets_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_processed(&self, success: bool) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.stage_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_unrouted(&self, count: usize) {
        self.unrouted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn sets_created(&self) -> u64 {
        self.sets_created.load(Ordering::Relaxed)
    }

    pub fn sets_completed(&self) -> u64 {
        self.sets_completed.load(Ordering::Relaxed)
    }

    /// Snapshot the counters into a report.
    pub fn report(&self, elapsed: Duration, routing: RoutingStats) -> SimulationReport {
        SimulationReport {
            elapsed,
            sets_created: self.sets_created.load(Ordering::Relaxed),
            sets_completed: self.sets_completed.load(Ordering::Relaxed),
            sets_failed: self.sets_failed.load(Ordering::Relaxed),
            records_produced: self.records_produced.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            stage_failures: self.stage_failures.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            routing,
        }
    }
}

/// Counters owned by the router and the acknowledgement monitor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoutingStats {
    pub copies: u64,
    pub copy_failures: u64,
    pub invalid_acquires: u64,
    pub invalid_releases: u64,
    pub live_sets: usize,
}

/// Summary of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub elapsed: Duration,
    pub sets_created: u64,
    pub sets_completed: u64,
    /// Completed sets where at least one stage reported failure.
    pub sets_failed: u64,
    pub records_produced: u64,
    pub records_processed: u64,
    pub stage_failures: u64,
    pub unrouted: u64,
    pub routing: RoutingStats,
}

impl SimulationReport {
    /// Sets that never completed: expired, or still live at shutdown.
    pub fn sets_unfinished(&self) -> u64 {
        self.sets_created.saturating_sub(self.sets_completed)
    }

    /// Completed sets per second.
    pub fn completion_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.sets_completed as f64 / secs
        }
    }

    /// Print a human-readable summary.
    pub fn print(&self) {
        println!("=== Simulation Report ===");
        println!("Elapsed:            {:?}", self.elapsed);
        println!("Sets created:       {}", self.sets_created);
        println!("Sets completed:     {}", self.sets_completed);
        println!("  with failures:    {}", self.sets_failed);
        println!("Sets unfinished:    {}", self.sets_unfinished());
        println!("Live at shutdown:   {}", self.routing.live_sets);
        println!("Completion rate:    {:.2} sets/s", self.completion_rate());
        println!("Records produced:   {}", self.records_produced);
        println!("Records processed:  {}", self.records_processed);
        println!("Stage failures:     {}", self.stage_failures);
        println!("Unrouted records:   {}", self.unrouted);
        println!("Copies:             {}", self.routing.copies);
        println!("Copy failures:      {}", self.routing.copy_failures);
        println!("Invalid acquires:   {}", self.routing.invalid_acquires);
        println!("Invalid releases:   {}", self.routing.invalid_releases);
    }
}
