//! Device slot pool — per-device occupancy tracking.
//!
//! Each device holds a bounded, ordered list of running job handles. The
//! pool is mutated only by the single coordinating task that owns it; it
//! is not designed for concurrent mutation by multiple coordinators (the
//! availability check and the assign are separate calls, not one atomic
//! operation).

use tracing::{info, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// Identifier for one device (accelerator). Fixed at pool construction.
pub type DeviceId = u32;

/// Liveness of one worker process, as observed by a non-blocking poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    /// Exited normally (zero exit status).
    Exited,
    /// Exited abnormally (non-zero exit status or killed by a signal).
    Failed,
}

/// One in-flight worker process, bound to exactly one device.
pub trait JobHandle: Send {
    /// Opaque process identifier, used for logging only.
    fn pid(&self) -> u32;

    /// Poll liveness without blocking.
    fn poll(&mut self) -> JobStatus;
}

/// Outcome of one job removed by [`DeviceSlotPool::reap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapedJob {
    pub device: DeviceId,
    pub pid: u32,
    pub failed: bool,
}

/// Per-device slot state.
struct DeviceSlots {
    device: DeviceId,
    jobs: Vec<Box<dyn JobHandle>>,
}

/// Tracks which jobs run on which device, enforcing a fixed per-device
/// capacity. Invariant: no device's job list ever exceeds the capacity,
/// so total live jobs never exceed `devices × capacity`.
pub struct DeviceSlotPool {
    capacity_per_device: usize,
    devices: Vec<DeviceSlots>,
}

impl DeviceSlotPool {
    /// Create a pool for the given devices, each with `capacity_per_device`
    /// concurrent job slots.
    pub fn new(device_ids: Vec<DeviceId>, capacity_per_device: usize) -> Self {
        let devices = device_ids
            .into_iter()
            .map(|device| DeviceSlots {
                device,
                jobs: Vec::with_capacity(capacity_per_device),
            })
            .collect();
        Self {
            capacity_per_device,
            devices,
        }
    }

    pub fn capacity_per_device(&self) -> usize {
        self.capacity_per_device
    }

    /// Device identifiers in pool order.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|slot| slot.device).collect()
    }

    /// Number of jobs currently assigned to a device.
    pub fn job_count(&self, device: DeviceId) -> Option<usize> {
        self.slot(device).map(|slot| slot.jobs.len())
    }

    /// Total number of live jobs across all devices.
    pub fn live_jobs(&self) -> usize {
        self.devices.iter().map(|slot| slot.jobs.len()).sum()
    }

    /// Remove every job whose process has finished, logging completions.
    ///
    /// Must run before an availability check, otherwise occupancy counts
    /// are stale. Idempotent when no job state changed in between.
    pub fn reap(&mut self) -> Vec<ReapedJob> {
        let mut reaped = Vec::new();
        for slot in &mut self.devices {
            let mut i = 0;
            while i < slot.jobs.len() {
                match slot.jobs[i].poll() {
                    JobStatus::Running => i += 1,
                    status => {
                        let job = slot.jobs.remove(i);
                        let failed = status == JobStatus::Failed;
                        if failed {
                            warn!(
                                pid = job.pid(),
                                device = slot.device,
                                "worker exited abnormally, slot freed"
                            );
                        } else {
                            info!(
                                pid = job.pid(),
                                device = slot.device,
                                "worker finished"
                            );
                        }
                        reaped.push(ReapedJob {
                            device: slot.device,
                            pid: job.pid(),
                            failed,
                        });
                    }
                }
            }
        }
        reaped
    }

    /// The least-loaded device with a free slot, or `None` when every
    /// device is at capacity.
    ///
    /// Deterministic: ties break to the device earliest in pool order
    /// (the lowest id for the usual ascending range). Scanning with a
    /// strict less-than keeps the first of any tied group.
    pub fn find_available_device(&self) -> Option<DeviceId> {
        let mut best: Option<(DeviceId, usize)> = None;
        for slot in &self.devices {
            let count = slot.jobs.len();
            if count >= self.capacity_per_device {
                continue;
            }
            match best {
                Some((_, best_count)) if count >= best_count => {}
                _ => best = Some((slot.device, count)),
            }
        }
        best.map(|(device, _)| device)
    }

    /// Record a launched job under its device.
    ///
    /// The caller must have just checked availability; a full device here
    /// is refused rather than overcommitted.
    pub fn assign(
        &mut self,
        device: DeviceId,
        job: Box<dyn JobHandle>,
    ) -> SchedulerResult<()> {
        let capacity = self.capacity_per_device;
        let slot = self
            .slot_mut(device)
            .ok_or(SchedulerError::UnknownDevice(device))?;
        if slot.jobs.len() >= capacity {
            return Err(SchedulerError::DeviceAtCapacity(device));
        }
        slot.jobs.push(job);
        Ok(())
    }

    fn slot(&self, device: DeviceId) -> Option<&DeviceSlots> {
        self.devices.iter().find(|slot| slot.device == device)
    }

    fn slot_mut(&mut self, device: DeviceId) -> Option<&mut DeviceSlots> {
        self.devices.iter_mut().find(|slot| slot.device == device)
    }
}
