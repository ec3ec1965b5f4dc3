//! Simulation runner.
//!
//! Wires producers, the fan-out router, stage workers and the reaper together
//! on a tokio runtime:
//!
//! ```text
//! producers ──► Router ──┬──► sink stage ───────► release
//!     │                  └──► connector stage ──► release
//!     └── create(events) ─► AcknowledgementSetManager ◄── reaper task
//! ```

use crate::config::{SimulatorConfig, WorkloadConfig};
use crate::metrics::{MetricsCollector, RoutingStats, SimulationReport};
use crate::workload::{EventWorkload, WorkloadGenerator};
use ackflow_acknowledgements::AcknowledgementSetManager;
use ackflow_core::{DataFlowComponent, DefaultEventFactory};
use ackflow_router::{Destination, Router};
use ackflow_types::{EventKind, Record};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type Batch = Vec<Arc<Record>>;

/// A simulated destination feeding one stage worker.
#[derive(Debug)]
pub struct SimDestination {
    name: String,
    connector: bool,
    tx: mpsc::UnboundedSender<Batch>,
}

impl DataFlowComponent for SimDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_pipeline_connector(&self) -> bool {
        self.connector
    }
}

/// Records the connector forwards: error logs and every span.
fn forwarded_to_connector(record: &Record) -> bool {
    let event = record.data();
    event.kind() == EventKind::Span
        || event.get("level").and_then(|l| l.as_str()) == Some("error")
}

/// Runs a simulated pipeline for a fixed wall-clock duration.
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Produce for `duration`, then drain every stage and report.
    pub async fn run_for(&self, duration: Duration) -> SimulationReport {
        let config = &self.config;
        let manager = Arc::new(AcknowledgementSetManager::new(
            config.acknowledgements.clone(),
        ));
        let metrics = Arc::new(MetricsCollector::new());
        let shutdown = CancellationToken::new();
        let reaper = manager.spawn_reaper(shutdown.clone());

        let mut destinations = Vec::new();
        let mut stages = JoinSet::new();
        let mut specs = vec![("sink", false)];
        if config.with_connector {
            specs.push(("connector", true));
        }
        for (index, (name, connector)) in specs.into_iter().enumerate() {
            let (tx, rx) = mpsc::unbounded_channel();
            let component = SimDestination {
                name: name.to_string(),
                connector,
                tx,
            };
            destinations.push(if connector {
                Destination::with_route(component, Box::new(forwarded_to_connector))
            } else {
                Destination::new(component)
            });
            stages.spawn(run_stage(
                name.to_string(),
                rx,
                manager.clone(),
                metrics.clone(),
                StageSettings {
                    delay: config.stage_delay,
                    failure_rate: probability(config.stage_failure_rate),
                    seed: config.seed.wrapping_add(1000 + index as u64),
                },
            ));
        }
        let router = Arc::new(Router::new(
            destinations,
            Arc::new(DefaultEventFactory),
            manager.clone(),
        ));

        info!(
            producers = config.producers,
            ?duration,
            connector = config.with_connector,
            "starting simulation"
        );
        let start = Instant::now();
        let stop = CancellationToken::new();
        let mut producers = JoinSet::new();
        for id in 0..config.producers {
            producers.spawn(run_producer(
                id,
                router.clone(),
                manager.clone(),
                metrics.clone(),
                config.workload.clone(),
                config.acknowledgements.default_timeout,
                config.seed.wrapping_add(id as u64),
                stop.clone(),
            ));
        }

        tokio::time::sleep(duration).await;
        stop.cancel();
        while let Some(result) = producers.join_next().await {
            if let Err(error) = result {
                warn!(%error, "producer task failed");
            }
        }

        let copies = router.strategy().copies();
        let copy_failures = router.strategy().copy_failures();
        // Dropping the last router closes every destination channel.
        drop(router);
        while let Some(result) = stages.join_next().await {
            if let Err(error) = result {
                warn!(%error, "stage task failed");
            }
        }

        shutdown.cancel();
        if let Err(error) = reaper.await {
            warn!(%error, "reaper task failed");
        }

        let monitor = manager.monitor();
        let routing = RoutingStats {
            copies,
            copy_failures,
            invalid_acquires: monitor.invalid_acquires(),
            invalid_releases: monitor.invalid_releases(),
            live_sets: monitor.len(),
        };
        let report = metrics.report(start.elapsed(), routing);
        info!(
            created = report.sets_created,
            completed = report.sets_completed,
            unfinished = report.sets_unfinished(),
            "simulation finished"
        );
        report
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_producer(
    id: usize,
    router: Arc<Router<SimDestination>>,
    manager: Arc<AcknowledgementSetManager>,
    metrics: Arc<MetricsCollector>,
    workload: WorkloadConfig,
    timeout: Duration,
    seed: u64,
    stop: CancellationToken,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut generator = EventWorkload::new(&workload);
    // interval() rejects a zero period.
    let mut ticker = tokio::time::interval(workload.batch_interval.max(Duration::from_millis(1)));

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut events = generator.generate_batch(&mut rng);
        if events.is_empty() {
            continue;
        }
        let on_complete = metrics.clone();
        let set = manager.create(
            &mut events,
            timeout,
            Box::new(move |ok| on_complete.record_set_completed(ok)),
        );
        metrics.record_set_created(events.len());

        let records = events
            .into_iter()
            .map(|event| Arc::new(Record::new(event)))
            .collect();
        let summary = router.route(records, |destination, batch| {
            if destination.tx.send(batch).is_err() {
                warn!(destination = %destination.name, "stage closed, batch dropped");
            }
        });
        metrics.record_unrouted(summary.unrouted);
        trace!(
            producer = id,
            set_id = %set.id(),
            deliveries = summary.deliveries,
            "batch routed"
        );
    }
    debug!(producer = id, "producer stopped");
}

/// Clamp a rate into a valid `gen_bool` probability. NaN counts as 0.
fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

struct StageSettings {
    delay: Duration,
    failure_rate: f64,
    seed: u64,
}

async fn run_stage(
    name: String,
    mut rx: mpsc::UnboundedReceiver<Batch>,
    manager: Arc<AcknowledgementSetManager>,
    metrics: Arc<MetricsCollector>,
    settings: StageSettings,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);

    while let Some(batch) = rx.recv().await {
        for record in batch {
            let event = record.data();
            manager.acquire_event(event);
            if !settings.delay.is_zero() {
                tokio::time::sleep(settings.delay).await;
            }
            let success = !rng.gen_bool(settings.failure_rate);
            manager.release_event(event, success);
            metrics.record_processed(success);

            // Hand back the reference the destination received with the record.
            manager.release_event(event, success);
        }
    }
    debug!(stage = %name, "stage drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ackflow_acknowledgements::AcknowledgementConfig;
    use tracing_test::traced_test;

    fn quick_config() -> SimulatorConfig {
        SimulatorConfig::new(2)
            .with_workload(
                WorkloadConfig::default()
                    .with_batch_size(5)
                    .with_batch_interval(Duration::from_millis(20)),
            )
            .with_stage_delay(Duration::ZERO)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_every_set_completes() {
        let report = Simulator::new(quick_config())
            .run_for(Duration::from_millis(200))
            .await;

        assert!(report.sets_created > 0);
        assert_eq!(report.sets_completed, report.sets_created);
        assert_eq!(report.sets_failed, 0);
        assert_eq!(report.routing.live_sets, 0);
        assert_eq!(report.routing.invalid_acquires, 0);
        assert_eq!(report.routing.invalid_releases, 0);
        assert!(report.routing.copies > 0);
        assert!(logs_contain("simulation finished"));
    }

    #[tokio::test]
    async fn test_failures_reach_completion_callback() {
        let config = quick_config().with_stage_failure_rate(1.0);
        let report = Simulator::new(config)
            .run_for(Duration::from_millis(100))
            .await;

        assert!(report.sets_completed > 0);
        assert_eq!(report.sets_failed, report.sets_completed);
        assert_eq!(report.stage_failures, report.records_processed);
    }

    #[tokio::test]
    async fn test_copy_failures_still_complete() {
        let config = quick_config().with_workload(
            WorkloadConfig::default()
                .with_batch_size(4)
                .with_batch_interval(Duration::from_millis(20))
                .with_span_ratio(1.0)
                .with_malformed_span_ratio(1.0),
        );
        let report = Simulator::new(config)
            .run_for(Duration::from_millis(150))
            .await;

        assert!(report.routing.copy_failures > 0);
        assert_eq!(report.routing.copies, 0);
        assert_eq!(report.sets_completed, report.sets_created);
    }

    #[tokio::test]
    async fn test_slow_stages_expire_sets() {
        let config = SimulatorConfig::new(1)
            .with_workload(
                WorkloadConfig::logs_only()
                    .with_batch_size(2)
                    .with_batch_interval(Duration::from_millis(40)),
            )
            .with_acknowledgements(
                AcknowledgementConfig::default()
                    .with_reaper_interval(Duration::from_millis(5))
                    .with_default_timeout(Duration::from_millis(20)),
            )
            .with_stage_delay(Duration::from_millis(40))
            .with_connector(false);
        let report = Simulator::new(config)
            .run_for(Duration::from_millis(100))
            .await;

        assert!(report.sets_created > 0);
        assert_eq!(report.sets_completed, 0);
        assert_eq!(report.sets_unfinished(), report.sets_created);
        assert!(report.routing.invalid_releases > 0);
        assert_eq!(report.routing.live_sets, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_failure_rate_is_clamped() {
        let mut config = quick_config().with_connector(false);
        config.stage_failure_rate = 7.0;
        let report = Simulator::new(config)
            .run_for(Duration::from_millis(60))
            .await;

        assert!(report.records_processed > 0);
        assert_eq!(report.stage_failures, report.records_processed);

        let mut config = quick_config().with_connector(false);
        config.stage_failure_rate = f64::NAN;
        let report = Simulator::new(config)
            .run_for(Duration::from_millis(60))
            .await;
        assert_eq!(report.stage_failures, 0);
    }
}
