//! ackflow simulator CLI
//!
//! Drives producers, the fan-out router and processing stages against the
//! acknowledgement subsystem and prints a completion report.

use ackflow_simulator::{Simulator, SimulatorConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ackflow-sim")]
#[command(about = "Acknowledgement and fan-out workload simulator")]
#[command(version)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duration to run (e.g., "30s", "5m")
    #[arg(short, long, default_value = "10s")]
    duration: humantime::Duration,

    /// Number of producer tasks
    #[arg(long)]
    producers: Option<usize>,

    /// Events per batch (one acknowledgement set per batch)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Milliseconds between batches per producer
    #[arg(long)]
    batch_interval_ms: Option<u64>,

    /// Probability that a stage fails a record (0.0 to 1.0)
    #[arg(long)]
    failure_rate: Option<f64>,

    /// Acknowledgement set timeout (e.g., "5s")
    #[arg(long)]
    timeout: Option<humantime::Duration>,

    /// Route to the sink only
    #[arg(long)]
    no_connector: bool,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::from_file(path)?,
            None => SimulatorConfig::default(),
        };

        if let Some(producers) = self.producers {
            anyhow::ensure!(producers > 0, "--producers must be at least 1");
            config.producers = producers;
        }
        if let Some(size) = self.batch_size {
            config.workload.batch_size = size;
        }
        if let Some(ms) = self.batch_interval_ms {
            config.workload.batch_interval = Duration::from_millis(ms);
        }
        if let Some(rate) = self.failure_rate {
            anyhow::ensure!(
                (0.0..=1.0).contains(&rate),
                "--failure-rate must be within 0.0..=1.0, got {rate}"
            );
            config = config.with_stage_failure_rate(rate);
        }
        if let Some(timeout) = self.timeout {
            config.acknowledgements = config.acknowledgements.with_default_timeout(*timeout);
        }
        if self.no_connector {
            config = config.with_connector(false);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let duration = *cli.duration;
    let config = cli.into_config()?;

    println!("Starting simulator for {:?}...", duration);
    let report = Simulator::new(config).run_for(duration).await;
    report.print();

    Ok(())
}
