//! sweep — parallel experiment launcher.
//!
//! Expands a seed × game product into experiment configurations and fans
//! them out as worker processes across accelerator devices, each device
//! holding a bounded number of concurrent jobs.
//!
//! # Usage
//!
//! ```text
//! sweep --group-name rainbow --exp-name baseline \
//!       --games Pong Breakout --num-seeds 3 \
//!       --num-devices 8 --num-exp-per-device 1 \
//!       --overrides lr=0.001
//! ```
//!
//! The process exits once every experiment has been dispatched; workers
//! keep running on their devices.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use sweep_core::SweepRequest;
use sweep_scheduler::{
    DeviceSlotPool, FailurePolicy, ProcessLauncher, Scheduler,
};

#[derive(Parser)]
#[command(
    name = "sweep",
    about = "Parallel experiment launcher — fans training runs out across device slots",
    version,
)]
struct Cli {
    #[arg(long, default_value = "test")]
    group_name: String,

    #[arg(long, default_value = "test")]
    exp_name: String,

    /// Config directory handed to the worker (not opened by the launcher).
    #[arg(long, default_value = "./configs")]
    config_path: String,

    #[arg(long, default_value = "drq")]
    config_name: String,

    /// Run the first N games of the default roster (ignored with --games).
    #[arg(long, default_value_t = 26)]
    num_games: usize,

    /// Explicit game list (sorted before use).
    #[arg(long, num_args = 0..)]
    games: Vec<String>,

    /// Games to drop from the resolved roster; each must be present.
    #[arg(long, num_args = 0..)]
    excluded_games: Vec<String>,

    /// Run seeds 0..N (ignored with --seeds).
    #[arg(long, default_value_t = 1)]
    num_seeds: u64,

    /// Explicit seed list.
    #[arg(long, num_args = 0..)]
    seeds: Vec<u64>,

    /// First device id of the range this sweep may use.
    #[arg(long, default_value_t = 0)]
    device_start: u32,

    #[arg(long, default_value_t = 8)]
    num_devices: u32,

    /// Concurrent jobs per device.
    #[arg(long, default_value_t = 1)]
    num_exp_per_device: usize,

    /// Free-form key=value entries appended to every experiment.
    #[arg(long, num_args = 0..)]
    overrides: Vec<String>,

    /// Worker program spawned once per experiment.
    #[arg(long, default_value = "train")]
    worker: PathBuf,

    /// Delay between device-availability polls when all slots are taken.
    #[arg(long, default_value_t = 1)]
    poll_interval_secs: u64,

    /// Abort dispatch on the first abnormal worker exit.
    #[arg(long)]
    fail_fast: bool,

    /// Generate and log the experiments without dispatching anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sweep=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let request = SweepRequest {
        group_name: cli.group_name,
        exp_name: cli.exp_name,
        config_path: cli.config_path,
        config_name: cli.config_name,
        num_games: cli.num_games,
        games: cli.games,
        excluded_games: cli.excluded_games,
        num_seeds: cli.num_seeds,
        seeds: cli.seeds,
        device_start: cli.device_start,
        num_devices: cli.num_devices,
        num_exp_per_device: cli.num_exp_per_device,
        overrides: cli.overrides,
    };

    // Configuration errors are fatal here, before any dispatch.
    let plan = request.resolve()?;
    let experiments = plan.experiments();
    info!(
        experiments = experiments.len(),
        seeds = plan.seeds.len(),
        games = plan.games.len(),
        devices = plan.num_devices,
        capacity = plan.num_exp_per_device,
        "sweep resolved"
    );

    for experiment in &experiments {
        info!(config = %serde_json::to_string(experiment)?, "generated experiment");
    }

    if cli.dry_run {
        info!("dry run, nothing dispatched");
        return Ok(());
    }

    let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);
    let scheduler = Scheduler::new(ProcessLauncher::new(cli.worker))
        .with_poll_interval(Duration::from_secs(cli.poll_interval_secs))
        .with_failure_policy(if cli.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::BestEffort
        });

    let report = scheduler.dispatch_all(&mut pool, experiments).await?;
    info!(
        dispatched = report.dispatched,
        failures = report.failures,
        still_running = pool.live_jobs(),
        "dispatch complete; workers may still be running"
    );

    Ok(())
}
