//! Log and span event generator.

use crate::config::WorkloadConfig;
use crate::workload::WorkloadGenerator;
use ackflow_types::{Event, EventKind};

const SERVICES: [&str; 4] = ["checkout", "inventory", "payments", "search"];
const LEVELS: [&str; 3] = ["info", "warn", "error"];

/// Generates a mix of log events and spans.
pub struct EventWorkload {
    /// Events per batch.
    batch_size: usize,

    /// Ratio of span events (0.0 to 1.0).
    span_ratio: f64,

    /// Ratio of spans missing their span id (0.0 to 1.0).
    malformed_span_ratio: f64,

    /// Sequence number stamped on every event.
    sequence: u64,
}

impl EventWorkload {
    /// Create a new event workload generator.
    pub fn new(config: &WorkloadConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            span_ratio: config.span_ratio.clamp(0.0, 1.0),
            malformed_span_ratio: config.malformed_span_ratio.clamp(0.0, 1.0),
            sequence: 0,
        }
    }

    fn generate_log(&mut self, rng: &mut impl rand::Rng) -> Event {
        let service = SERVICES[rng.gen_range(0..SERVICES.len())];
        let level = LEVELS[rng.gen_range(0..LEVELS.len())];
        Event::new(EventKind::Log)
            .with_field("service", service)
            .with_field("level", level)
            .with_field("message", format!("{service} request {}", self.sequence))
    }

    fn generate_span(&mut self, rng: &mut impl rand::Rng) -> Event {
        let service = SERVICES[rng.gen_range(0..SERVICES.len())];
        let mut span = Event::new(EventKind::Span)
            .with_field("traceId", format!("{:032x}", rng.gen::<u128>()))
            .with_field("name", format!("{service}.handle"))
            .with_field("durationNanos", rng.gen_range(1_000u64..50_000_000));
        if !rng.gen_bool(self.malformed_span_ratio) {
            span.put("spanId", format!("{:016x}", rng.gen::<u64>()));
        }
        span
    }
}

impl WorkloadGenerator for EventWorkload {
    fn generate_batch(&mut self, rng: &mut impl rand::Rng) -> Vec<Event> {
        (0..self.batch_size).map(|_| self.generate_one(rng)).collect()
    }

    fn generate_one(&mut self, rng: &mut impl rand::Rng) -> Event {
        self.sequence += 1;
        let mut event = if rng.gen_bool(self.span_ratio) {
            self.generate_span(rng)
        } else {
            self.generate_log(rng)
        };
        event.put("sequence", self.sequence);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_batch_size_and_sequence() {
        let config = WorkloadConfig::default().with_batch_size(7);
        let mut workload = EventWorkload::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let batch = workload.generate_batch(&mut rng);
        assert_eq!(batch.len(), 7);
        let sequences: Vec<u64> = batch
            .iter()
            .map(|e| e.get("sequence").and_then(|v| v.as_u64()).unwrap())
            .collect();
        assert_eq!(sequences, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_logs_only() {
        let mut workload = EventWorkload::new(&WorkloadConfig::logs_only());
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert!(workload
            .generate_batch(&mut rng)
            .iter()
            .all(|e| e.kind() == EventKind::Log));
    }

    #[test]
    fn test_malformed_spans_lack_span_id() {
        let config = WorkloadConfig::default()
            .with_span_ratio(1.0)
            .with_malformed_span_ratio(1.0);
        let mut workload = EventWorkload::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for event in workload.generate_batch(&mut rng) {
            assert_eq!(event.kind(), EventKind::Span);
            assert!(event.get("traceId").is_some());
            assert!(event.get("spanId").is_none());
        }
    }
}
