//! Acknowledgement configuration.

use std::time::Duration;

/// Configuration for acknowledgement tracking.
#[derive(Debug, Clone)]
pub struct AcknowledgementConfig {
    /// How often the reaper removes complete and expired sets.
    pub reaper_interval: Duration,

    /// Deadline applied to sets created without an explicit timeout.
    pub default_timeout: Duration,
}

impl Default for AcknowledgementConfig {
    fn default() -> Self {
        Self {
            reaper_interval: Duration::from_secs(1),
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl AcknowledgementConfig {
    /// Set the reaper interval.
    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    /// Set the default set timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}
