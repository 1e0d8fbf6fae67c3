//! sweep-scheduler — device slot bookkeeping and the dispatch loop.
//!
//! Maps `Experiment`s (from `sweep-core`) onto a fixed set of devices,
//! each with a bounded number of concurrent job slots. The scheduler:
//!
//! - Reaps finished worker processes to free device slots
//! - Picks the least-loaded available device (lowest id on ties)
//! - Launches one worker process per experiment via the launcher seam
//! - Returns as soon as the last experiment is dispatched
//!
//! # Architecture
//!
//! ```text
//! Scheduler (dispatch loop)
//!   ├── DeviceSlotPool (device → running JobHandles, capacity-bounded)
//!   └── WorkerLauncher
//!       └── ProcessLauncher (tokio::process, one child per experiment)
//! ```

pub mod error;
pub mod launcher;
pub mod pool;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use launcher::{ProcessLauncher, WorkerLauncher};
pub use pool::{DeviceId, DeviceSlotPool, JobHandle, JobStatus, ReapedJob};
pub use scheduler::{DispatchReport, FailurePolicy, Scheduler};
