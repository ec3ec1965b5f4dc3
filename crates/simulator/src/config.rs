//! Configuration types for the simulator.

use ackflow_acknowledgements::AcknowledgementConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors loading a simulator configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Configuration for a simulation run.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Number of concurrent producer tasks.
    pub producers: usize,

    /// Workload configuration.
    pub workload: WorkloadConfig,

    /// Acknowledgement timeouts and reaper cadence.
    pub acknowledgements: AcknowledgementConfig,

    /// Probability that a stage reports failure for a record.
    pub stage_failure_rate: f64,

    /// Simulated processing time per record.
    pub stage_delay: Duration,

    /// Whether the fan-out includes a connector into a second pipeline.
    pub with_connector: bool,

    /// Random seed for deterministic workloads.
    pub seed: u64,
}

impl SimulatorConfig {
    /// Create a new simulator configuration.
    pub fn new(producers: usize) -> Self {
        Self {
            producers,
            workload: WorkloadConfig::default(),
            acknowledgements: AcknowledgementConfig::default()
                .with_reaper_interval(Duration::from_millis(100))
                .with_default_timeout(Duration::from_secs(5)),
            stage_failure_rate: 0.0,
            stage_delay: Duration::from_millis(1),
            with_connector: true,
            seed: 12345,
        }
    }

    /// Set the workload configuration.
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Set the acknowledgement configuration.
    pub fn with_acknowledgements(mut self, acknowledgements: AcknowledgementConfig) -> Self {
        self.acknowledgements = acknowledgements;
        self
    }

    /// Set the stage failure rate.
    pub fn with_stage_failure_rate(mut self, rate: f64) -> Self {
        self.stage_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the per-record stage delay.
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    /// Enable or disable the pipeline connector destination.
    pub fn with_connector(mut self, enabled: bool) -> Self {
        self.with_connector = enabled;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load a configuration from a TOML file, starting from defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse a TOML configuration. Missing keys keep their defaults.
    ///
    /// ```toml
    /// producers = 4
    /// stage_failure_rate = 0.05
    /// set_timeout_ms = 2000
    ///
    /// [workload]
    /// batch_size = 50
    /// span_ratio = 0.2
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: SimulatorFile = toml::from_str(contents)?;
        file.apply(SimulatorConfig::default())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Workload configuration.
#[derive(Clone, Debug)]
pub struct WorkloadConfig {
    /// Number of events per batch. Each batch is one acknowledgement set.
    pub batch_size: usize,

    /// Time between batches per producer.
    pub batch_interval: Duration,

    /// Ratio of span events (vs log events).
    pub span_ratio: f64,

    /// Ratio of spans generated without a span id, which cannot be copied.
    pub malformed_span_ratio: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_interval: Duration::from_millis(50),
            span_ratio: 0.3,
            malformed_span_ratio: 0.0,
        }
    }
}

impl WorkloadConfig {
    /// Create a log-only workload.
    pub fn logs_only() -> Self {
        Self {
            span_ratio: 0.0,
            ..Default::default()
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the batch interval.
    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    /// Set the span ratio.
    pub fn with_span_ratio(mut self, ratio: f64) -> Self {
        self.span_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the malformed span ratio.
    pub fn with_malformed_span_ratio(mut self, ratio: f64) -> Self {
        self.malformed_span_ratio = ratio.clamp(0.0, 1.0);
        self
    }
}

/// On-disk form of [`SimulatorConfig`]. Durations are in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimulatorFile {
    producers: Option<usize>,
    stage_failure_rate: Option<f64>,
    stage_delay_ms: Option<u64>,
    with_connector: Option<bool>,
    seed: Option<u64>,
    set_timeout_ms: Option<u64>,
    reaper_interval_ms: Option<u64>,
    #[serde(default)]
    workload: WorkloadFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkloadFile {
    batch_size: Option<usize>,
    batch_interval_ms: Option<u64>,
    span_ratio: Option<f64>,
    malformed_span_ratio: Option<f64>,
}

fn ratio(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("{value} is outside 0.0..=1.0"),
        })
    }
}

impl SimulatorFile {
    fn apply(self, mut config: SimulatorConfig) -> Result<SimulatorConfig, ConfigError> {
        if let Some(producers) = self.producers {
            if producers == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "producers",
                    reason: "at least one producer is required".to_string(),
                });
            }
            config.producers = producers;
        }
        if let Some(rate) = self.stage_failure_rate {
            config.stage_failure_rate = ratio("stage_failure_rate", rate)?;
        }
        if let Some(ms) = self.stage_delay_ms {
            config.stage_delay = Duration::from_millis(ms);
        }
        if let Some(enabled) = self.with_connector {
            config.with_connector = enabled;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(ms) = self.set_timeout_ms {
            config.acknowledgements.default_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reaper_interval_ms {
            config.acknowledgements.reaper_interval = Duration::from_millis(ms);
        }

        let workload = self.workload;
        if let Some(size) = workload.batch_size {
            config.workload.batch_size = size;
        }
        if let Some(ms) = workload.batch_interval_ms {
            config.workload.batch_interval = Duration::from_millis(ms);
        }
        if let Some(r) = workload.span_ratio {
            config.workload.span_ratio = ratio("workload.span_ratio", r)?;
        }
        if let Some(r) = workload.malformed_span_ratio {
            config.workload.malformed_span_ratio = ratio("workload.malformed_span_ratio", r)?;
        }
        Ok(config)
    }
}
