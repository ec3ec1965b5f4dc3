//! Periodic reaper task.
//!
//! The monitor itself is synchronous. This adapter drives
//! [`AcknowledgementSetMonitor::run`] from a tokio interval until the
//! cancellation token fires.

use crate::AcknowledgementSetMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn a task that reaps `monitor` every `interval`.
///
/// A final pass runs after cancellation so sets that finished during
/// shutdown do not linger.
pub fn spawn_reaper(
    monitor: Arc<AcknowledgementSetMonitor>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // interval() rejects a zero period.
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?interval, "acknowledgement reaper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = monitor.run();
                    if removed > 0 {
                        debug!(removed, live = monitor.len(), "reaped acknowledgement sets");
                    }
                }
            }
        }

        let removed = monitor.run();
        info!(
            removed,
            live = monitor.len(),
            invalid_acquires = monitor.invalid_acquires(),
            invalid_releases = monitor.invalid_releases(),
            "acknowledgement reaper stopped"
        );
    })
}
