//! Scheduler error types.

use thiserror::Error;

use crate::pool::DeviceId;

/// Result type alias for scheduling operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("device {0} is already at capacity")]
    DeviceAtCapacity(DeviceId),

    #[error("worker process {pid} on device {device} exited abnormally")]
    WorkerFailed { device: DeviceId, pid: u32 },

    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}
