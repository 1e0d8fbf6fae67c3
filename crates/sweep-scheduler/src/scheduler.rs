//! The dispatch loop.
//!
//! Walks the generated experiments in order. For each one it reaps
//! finished workers, waits (polling) until a device has a free slot,
//! appends the device-binding override, launches the worker, and records
//! the job under the chosen device. The loop returns as soon as the last
//! experiment is dispatched; launched workers may still be running.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use sweep_core::Experiment;

use crate::error::{SchedulerError, SchedulerResult};
use crate::launcher::WorkerLauncher;
use crate::pool::{DeviceId, DeviceSlotPool};

/// What to do when a reaped worker exited abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure, free the slot, keep dispatching (reference
    /// behavior).
    #[default]
    BestEffort,
    /// Abort dispatch on the first abnormal exit.
    FailFast,
}

/// Summary of one dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Experiments handed off to workers.
    pub dispatched: usize,
    /// Abnormal worker exits observed while dispatching. Failures of jobs
    /// still running at return time are not seen here.
    pub failures: usize,
    /// Launches per device.
    pub per_device: HashMap<DeviceId, usize>,
}

/// Dispatches experiments onto a device slot pool.
///
/// The pool is passed by reference to `dispatch_all` and mutated only
/// from that single call; one scheduler run is the pool's lifecycle.
pub struct Scheduler<L> {
    launcher: L,
    poll_interval: Duration,
    failure_policy: FailurePolicy,
}

impl<L: WorkerLauncher> Scheduler<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            poll_interval: Duration::from_secs(1),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Set the delay between availability polls when all devices are full.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Dispatch every experiment, in generation order.
    ///
    /// Returns once the last experiment has been handed off — it does not
    /// wait for outstanding workers to finish. Under
    /// [`FailurePolicy::FailFast`], the first abnormal exit observed by a
    /// reap aborts with [`SchedulerError::WorkerFailed`].
    pub async fn dispatch_all(
        &self,
        pool: &mut DeviceSlotPool,
        experiments: Vec<Experiment>,
    ) -> SchedulerResult<DispatchReport> {
        let total = experiments.len();
        let mut report = DispatchReport::default();

        for mut experiment in experiments {
            let device = loop {
                self.reap_into(pool, &mut report)?;
                if let Some(device) = pool.find_available_device() {
                    break device;
                }
                debug!(
                    live = pool.live_jobs(),
                    "all devices at capacity, polling"
                );
                sleep(self.poll_interval).await;
            };

            experiment.overrides.push(format!("device={device}"));
            let job = self.launcher.launch(&experiment, device)?;
            info!(
                pid = job.pid(),
                device,
                index = experiment.index,
                seed = experiment.seed,
                game = %experiment.game,
                "worker started"
            );
            pool.assign(device, job)?;

            report.dispatched += 1;
            *report.per_device.entry(device).or_insert(0) += 1;
        }

        info!(
            dispatched = report.dispatched,
            total,
            failures = report.failures,
            still_running = pool.live_jobs(),
            "all experiments dispatched"
        );
        Ok(report)
    }

    /// Reap finished workers and fold the outcomes into the report.
    fn reap_into(
        &self,
        pool: &mut DeviceSlotPool,
        report: &mut DispatchReport,
    ) -> SchedulerResult<()> {
        for reaped in pool.reap() {
            if reaped.failed {
                report.failures += 1;
                if self.failure_policy == FailurePolicy::FailFast {
                    return Err(SchedulerError::WorkerFailed {
                        device: reaped.device,
                        pid: reaped.pid,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use sweep_core::{LaunchPlan, SweepRequest};

    use super::*;
    use crate::pool::{JobHandle, JobStatus};

    /// A scripted job: runs for `polls_left` polls, then reports
    /// `final_status`.
    struct FakeJob {
        pid: u32,
        polls_left: usize,
        final_status: JobStatus,
    }

    impl JobHandle for FakeJob {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn poll(&mut self) -> JobStatus {
            if self.polls_left == 0 {
                self.final_status
            } else {
                self.polls_left -= 1;
                JobStatus::Running
            }
        }
    }

    /// Records every launch and hands out scripted jobs.
    struct FakeLauncher {
        /// (experiment, device) per launch, in dispatch order.
        launches: Arc<Mutex<Vec<(Experiment, DeviceId)>>>,
        next_pid: AtomicU32,
        /// Polls each job survives before finishing.
        job_lifetime_polls: usize,
        /// Status every job ends with.
        final_status: JobStatus,
    }

    impl FakeLauncher {
        fn new(job_lifetime_polls: usize) -> Self {
            Self {
                launches: Arc::new(Mutex::new(Vec::new())),
                next_pid: AtomicU32::new(1000),
                job_lifetime_polls,
                final_status: JobStatus::Exited,
            }
        }

        fn failing(job_lifetime_polls: usize) -> Self {
            Self {
                final_status: JobStatus::Failed,
                ..Self::new(job_lifetime_polls)
            }
        }

        fn launches(&self) -> Arc<Mutex<Vec<(Experiment, DeviceId)>>> {
            self.launches.clone()
        }
    }

    impl WorkerLauncher for FakeLauncher {
        fn launch(
            &self,
            experiment: &Experiment,
            device: DeviceId,
        ) -> SchedulerResult<Box<dyn JobHandle>> {
            self.launches
                .lock()
                .unwrap()
                .push((experiment.clone(), device));
            Ok(Box::new(FakeJob {
                pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
                polls_left: self.job_lifetime_polls,
                final_status: self.final_status,
            }))
        }
    }

    fn plan(seeds: Vec<u64>, games: Vec<&str>, num_devices: u32, capacity: usize) -> LaunchPlan {
        SweepRequest {
            group_name: "g".to_string(),
            exp_name: "e".to_string(),
            config_path: "./configs".to_string(),
            config_name: "drq".to_string(),
            seeds,
            games: games.into_iter().map(str::to_string).collect(),
            num_devices,
            num_exp_per_device: capacity,
            ..SweepRequest::default()
        }
        .resolve()
        .unwrap()
    }

    fn fast_scheduler(launcher: FakeLauncher) -> Scheduler<FakeLauncher> {
        Scheduler::new(launcher).with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn two_free_devices_take_the_first_two_experiments() {
        let plan = plan(vec![0], vec!["Pong", "Breakout"], 2, 1);
        let launcher = FakeLauncher::new(usize::MAX);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        let report = scheduler
            .dispatch_all(&mut pool, plan.experiments())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 2);
        let launches = launches.lock().unwrap();
        // Games are sorted, so Breakout dispatches first, onto device 0.
        assert_eq!(launches[0].0.game, "Breakout");
        assert_eq!(launches[0].1, 0);
        assert_eq!(launches[1].0.game, "Pong");
        assert_eq!(launches[1].1, 1);

        // The loop returned without waiting for the workers.
        assert_eq!(pool.live_jobs(), 2);
    }

    #[tokio::test]
    async fn dispatch_follows_generation_order() {
        let plan = plan(vec![0, 1], vec!["Breakout", "Pong"], 4, 2);
        let launcher = FakeLauncher::new(usize::MAX);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        scheduler
            .dispatch_all(&mut pool, plan.experiments())
            .await
            .unwrap();

        let indices: Vec<usize> = launches
            .lock()
            .unwrap()
            .iter()
            .map(|(exp, _)| exp.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn waits_for_a_slot_when_all_devices_are_full() {
        // One device, one slot, two experiments: the second dispatch must
        // wait until the first job is reaped.
        let plan = plan(vec![0], vec!["Breakout", "Pong"], 1, 1);
        let launcher = FakeLauncher::new(2);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        let report = scheduler
            .dispatch_all(&mut pool, plan.experiments())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 2);
        let launches = launches.lock().unwrap();
        assert_eq!(launches.len(), 2);
        assert_eq!(launches[0].1, 0);
        assert_eq!(launches[1].1, 0);
        assert_eq!(report.per_device.get(&0), Some(&2));
    }

    #[tokio::test]
    async fn device_binding_is_the_final_override() {
        let plan = plan(vec![7], vec!["Pong"], 2, 1);
        let launcher = FakeLauncher::new(usize::MAX);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        scheduler
            .dispatch_all(&mut pool, plan.experiments())
            .await
            .unwrap();

        let launches = launches.lock().unwrap();
        let overrides = &launches[0].0.overrides;
        assert_eq!(overrides.last().unwrap(), "device=0");
        assert_eq!(
            &overrides[..overrides.len() - 1],
            &["group_name=g", "exp_name=e", "seed=7", "env.game=Pong"]
        );
    }

    #[tokio::test]
    async fn best_effort_counts_failures_and_continues() {
        // Jobs fail after one poll; every experiment still dispatches.
        let plan = plan(vec![0, 1], vec!["Pong"], 1, 1);
        let launcher = FakeLauncher::failing(1);
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        let report = scheduler
            .dispatch_all(&mut pool, plan.experiments())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 2);
        // The first job's failure is observed while freeing its slot for
        // the second; the second job's fate is past the loop's horizon.
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn fail_fast_aborts_on_first_abnormal_exit() {
        let plan = plan(vec![0, 1], vec!["Pong"], 1, 1);
        let launcher = FakeLauncher::failing(1);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher).with_failure_policy(FailurePolicy::FailFast);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        let result = scheduler.dispatch_all(&mut pool, plan.experiments()).await;
        assert!(matches!(
            result,
            Err(SchedulerError::WorkerFailed { device: 0, .. })
        ));
        assert_eq!(launches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_experiment_list_is_a_noop() {
        let plan = plan(vec![0], vec!["Pong"], 1, 1);
        let launcher = FakeLauncher::new(0);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        let report = scheduler.dispatch_all(&mut pool, Vec::new()).await.unwrap();
        assert_eq!(report.dispatched, 0);
        assert!(launches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn capacity_is_respected_throughout_a_long_sweep() {
        let plan = plan(vec![0, 1, 2], vec!["Breakout", "Pong", "Qbert"], 2, 2);
        let launcher = FakeLauncher::new(1);
        let launches = launcher.launches();
        let scheduler = fast_scheduler(launcher);
        let mut pool = DeviceSlotPool::new(plan.device_ids(), plan.num_exp_per_device);

        let report = scheduler
            .dispatch_all(&mut pool, plan.experiments())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 9);
        assert_eq!(launches.lock().unwrap().len(), 9);
        assert!(pool.live_jobs() <= 4);
        let per_device_total: usize = report.per_device.values().sum();
        assert_eq!(per_device_total, 9);
    }
}
