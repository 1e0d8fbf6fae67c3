//! Worker launching — the seam between the dispatch loop and the
//! opaque training entry point.

use std::path::PathBuf;

use tokio::process::{Child, Command};
use tracing::debug;

use sweep_core::Experiment;

use crate::error::SchedulerResult;
use crate::pool::{DeviceId, JobHandle, JobStatus};

/// Launches one worker per experiment.
///
/// The scheduler has already appended the `device=<id>` override when this
/// is called; implementations only turn the experiment into a running job.
pub trait WorkerLauncher {
    fn launch(
        &self,
        experiment: &Experiment,
        device: DeviceId,
    ) -> SchedulerResult<Box<dyn JobHandle>>;
}

/// Spawns the configured worker program as a child process.
///
/// Argv: `--config-path <path> --config-name <name> --overrides <entries…>`.
/// The experiment's internals (model construction, the training loop) are
/// entirely the worker's business.
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(
        &self,
        experiment: &Experiment,
        device: DeviceId,
    ) -> SchedulerResult<Box<dyn JobHandle>> {
        let mut command = Command::new(&self.program);
        command
            .arg("--config-path")
            .arg(&experiment.config_path)
            .arg("--config-name")
            .arg(&experiment.config_name)
            .arg("--overrides")
            .args(&experiment.overrides);

        // kill_on_drop stays off: dispatched workers run to completion
        // even after the coordinator exits.
        let child = command.spawn()?;
        let pid = child.id().unwrap_or(0);
        debug!(pid, device, program = %self.program.display(), "worker process spawned");

        Ok(Box::new(ProcessJob { pid, child }))
    }
}

/// A spawned worker process.
struct ProcessJob {
    pid: u32,
    child: Child,
}

impl JobHandle for ProcessJob {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn poll(&mut self) -> JobStatus {
        match self.child.try_wait() {
            Ok(None) => JobStatus::Running,
            Ok(Some(status)) if status.success() => JobStatus::Exited,
            // Non-zero exit, signal death, or a wait error: the slot is
            // freed either way, but the outcome is reported distinctly.
            Ok(Some(_)) | Err(_) => JobStatus::Failed,
        }
    }
}
