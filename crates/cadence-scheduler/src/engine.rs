use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cadence_core::DaemonConfig;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    condition::ConditionRegistry,
    dispatch::Dispatcher,
    entry::{JobAction, JobEntry},
    error::{Result, SchedulerError},
    job::JobContext,
    recurrence::ScheduleTime,
    report::BriefReport,
    schedule,
};

/// The scheduling daemon: owns the job list and the condition registry and
/// drives the once-per-tick dispatch loop.
///
/// Share it behind an `Arc`; [`start`](Daemon::start) runs on whichever task
/// awaits it while other tasks commit jobs, flip conditions or read reports.
///
/// The job list and the condition map have separate locks and are never held
/// together, so a single tick may observe a condition change part-way through
/// its pass over the jobs.
pub struct Daemon {
    registry: Mutex<JobRegistry>,
    conditions: ConditionRegistry,
    dispatcher: Dispatcher,
    config: DaemonConfig,
}

/// Everything behind the job-list lock.
#[derive(Default)]
struct JobRegistry {
    /// Registration order.
    jobs: Vec<Arc<JobEntry>>,
    running: bool,
    /// Cancelled by `stop`. A cancellation seen before the loop starts is
    /// consumed by that `start`; a fresh token is swapped in on every exit.
    stop: CancellationToken,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            registry: Mutex::new(JobRegistry::default()),
            conditions: ConditionRegistry::new(),
            dispatcher: Dispatcher::new(config.dispatch),
            config,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    pub fn condition_set(&self, name: &str) {
        self.conditions.assert(name);
    }

    pub fn condition_del(&self, name: &str) -> bool {
        self.conditions.clear(name)
    }

    /// Register or update a job.
    ///
    /// If a job with the same name is already committed, the candidate is
    /// merged into it: its action goes back to `Start` and, when the candidate
    /// carries a recurrence, that recurrence replaces the existing one. The
    /// existing entry is returned. Otherwise the candidate is appended.
    ///
    /// Fails with `InvalidSchedule` before touching the list if the `JobSpec`
    /// schedule does not validate.
    pub fn commit(&self, entry: JobEntry) -> Result<Arc<JobEntry>> {
        if let Some(s) = &entry.spec().schedule {
            schedule::validate(s)?;
        }

        let mut registry = self.lock_registry();

        if let Some(existing) = registry.jobs.iter().find(|j| j.name() == entry.name()) {
            let existing = Arc::clone(existing);
            existing.set_action(JobAction::Start);
            if let Some(recurrence) = entry.into_recurrence() {
                existing.replace_recurrence(recurrence);
            }
            existing.commit()?;
            info!(job = %existing.name(), "job re-committed");
            return Ok(existing);
        }

        entry.status().set_limit(self.config.history_limit);
        let entry = Arc::new(entry);
        registry.jobs.push(Arc::clone(&entry));
        entry.commit()?;
        info!(job = %entry.name(), total = registry.jobs.len(), "job committed");
        Ok(entry)
    }

    /// Set a committed job's action to `Stop`. The entry stays registered;
    /// committing it again resumes it.
    pub fn stop_job(&self, name: &str) -> Result<()> {
        let entry = self.job(name).ok_or_else(|| SchedulerError::JobNotFound {
            name: name.to_string(),
        })?;
        entry.set_action(JobAction::Stop);
        info!(job = %name, "job stopped");
        Ok(())
    }

    pub fn job(&self, name: &str) -> Option<Arc<JobEntry>> {
        self.lock_registry()
            .jobs
            .iter()
            .find(|j| j.name() == name)
            .cloned()
    }

    /// Snapshot of the job list in registration order.
    pub fn jobs(&self) -> Vec<Arc<JobEntry>> {
        self.lock_registry().jobs.clone()
    }

    pub fn len(&self) -> usize {
        self.lock_registry().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.lock_registry().running
    }

    /// Run the tick loop until [`stop`](Daemon::stop) is called.
    ///
    /// Returns immediately if the loop is already running elsewhere.
    pub async fn start(&self) {
        let stop = {
            let mut registry = self.lock_registry();
            if registry.running {
                debug!("daemon already running");
                return;
            }
            if registry.stop.is_cancelled() {
                registry.stop = CancellationToken::new();
                info!("stop requested before start, not entering loop");
                return;
            }
            registry.running = true;
            registry.stop.clone()
        };

        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        info!(
            tick_ms = period.as_millis() as u64,
            dispatch = %self.dispatcher.policy(),
            "daemon started"
        );

        // First tick one period from now, like a wall-clock ticker.
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = interval.tick() => {
                    // Handles are dropped: executions run detached.
                    let _ = self.tick_at(Utc::now());
                }
            }
        }

        let mut registry = self.lock_registry();
        registry.running = false;
        registry.stop = CancellationToken::new();
        info!("daemon stopped");
    }

    /// Signal the loop to exit, then wait the configured grace period.
    ///
    /// A stop issued before the loop is first polled is kept, so a
    /// `start` that has been spawned but not yet run returns at once.
    /// In-flight executions are neither awaited nor cancelled.
    pub async fn stop(&self) {
        let stop = self.lock_registry().stop.clone();
        info!("daemon stop requested");
        stop.cancel();
        tokio::time::sleep(Duration::from_millis(self.config.stop_grace_ms)).await;
    }

    /// Evaluate a single tick at `now` and dispatch every job that is active,
    /// passes its condition gate and whose recurrence hits.
    ///
    /// Returns the handles of the dispatched executions; they are running but
    /// not necessarily finished. Must be called from within a Tokio runtime.
    pub fn tick_at(&self, now: DateTime<Utc>) -> Vec<JoinHandle<()>> {
        let at = ScheduleTime::from_instant(now);
        let now_ms = now.timestamp_millis();
        let jobs = self.jobs();

        let mut handles = Vec::new();
        for entry in &jobs {
            if entry.action() == JobAction::Stop {
                continue;
            }
            if !self.conditions.allows(&entry.spec().conditions, now_ms) {
                debug!(job = %entry.name(), "conditions not met");
                continue;
            }
            if !entry.hit(at) {
                continue;
            }

            let ctx = JobContext::new(self.conditions.clone(), entry.name(), at);
            debug!(job = %entry.name(), run_id = %ctx.run_id(), %at, "dispatching");
            if let Some(handle) = self.dispatcher.dispatch(entry, ctx) {
                handles.push(handle);
            }
        }
        handles
    }

    /// Summary of every active job, taken under the job-list lock.
    pub fn brief_report(&self) -> BriefReport {
        let registry = self.lock_registry();
        BriefReport::from_entries(&registry.jobs)
    }

    fn lock_registry(&self) -> MutexGuard<'_, JobRegistry> {
        self.registry.lock().expect("job registry poisoned")
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new(DaemonConfig::default())
    }
}
