use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::Result,
    job::{Job, JobSpec},
    recurrence::{Recurrence, ScheduleTime},
    schedule::ScheduleState,
    status::ExecHistory,
};

/// Desired run state of a committed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    Start,
    Stop,
}

/// One job as the daemon tracks it: the job itself, its desired action, its
/// recurrence state and its execution history.
///
/// Build a candidate with [`JobEntry::new`] and hand it to
/// [`Daemon::commit`](crate::Daemon::commit), which returns the canonical
/// shared entry for that name.
pub struct JobEntry {
    job: Arc<dyn Job>,
    state: Mutex<EntryState>,
    status: ExecHistory,
}

struct EntryState {
    action: JobAction,
    recurrence: Option<Box<dyn Recurrence>>,
}

impl JobEntry {
    pub fn new(job: impl Job + 'static) -> Self {
        Self::from_arc(Arc::new(job))
    }

    pub fn from_arc(job: Arc<dyn Job>) -> Self {
        Self {
            job,
            state: Mutex::new(EntryState {
                action: JobAction::Start,
                recurrence: None,
            }),
            status: ExecHistory::default(),
        }
    }

    /// Attach an explicit recurrence, overriding the `JobSpec` schedule.
    pub fn with_recurrence(self, recurrence: impl Recurrence + 'static) -> Self {
        self.lock_state().recurrence = Some(Box::new(recurrence));
        self
    }

    pub fn name(&self) -> &str {
        &self.job.spec().name
    }

    pub fn spec(&self) -> &JobSpec {
        self.job.spec()
    }

    pub fn job(&self) -> Arc<dyn Job> {
        Arc::clone(&self.job)
    }

    pub fn action(&self) -> JobAction {
        self.lock_state().action
    }

    pub fn status(&self) -> &ExecHistory {
        &self.status
    }

    pub fn has_recurrence(&self) -> bool {
        self.lock_state().recurrence.is_some()
    }

    pub fn next_time(&self) -> Option<DateTime<Utc>> {
        self.lock_state()
            .recurrence
            .as_ref()
            .and_then(|r| r.next_time())
    }

    /// Finalize the entry after it lands in the job list.
    ///
    /// Builds the recurrence from the `JobSpec` schedule if none is attached yet.
    /// Safe to call any number of times.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.recurrence.is_none() {
            if let Some(schedule) = &self.job.spec().schedule {
                state.recurrence = Some(Box::new(ScheduleState::new(schedule.clone())?));
                debug!(job = %self.name(), "recurrence built from spec schedule");
            }
        }
        Ok(())
    }

    pub(crate) fn set_action(&self, action: JobAction) {
        self.lock_state().action = action;
    }

    pub(crate) fn replace_recurrence(&self, recurrence: Box<dyn Recurrence>) {
        self.lock_state().recurrence = Some(recurrence);
    }

    /// Consume a candidate entry, keeping only its recurrence.
    pub(crate) fn into_recurrence(self) -> Option<Box<dyn Recurrence>> {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .recurrence
    }

    /// Evaluate the recurrence for this tick. Entries without one never hit.
    pub(crate) fn hit(&self, at: ScheduleTime) -> bool {
        self.lock_state()
            .recurrence
            .as_mut()
            .is_some_and(|r| r.hit(at))
    }

    fn lock_state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().expect("job entry poisoned")
    }
}

impl fmt::Debug for JobEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("JobEntry")
            .field("name", &self.name())
            .field("action", &state.action)
            .field("recurrence", &state.recurrence)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobContext, JobError};
    use async_trait::async_trait;
    use cadence_core::Schedule;

    struct Noop(JobSpec);

    #[async_trait]
    impl Job for Noop {
        fn spec(&self) -> &JobSpec {
            &self.0
        }
        async fn run(&self, _ctx: &JobContext) -> std::result::Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn commit_builds_recurrence_from_spec_once() {
        let spec = JobSpec::new("tidy").with_schedule(Schedule::Interval { every_secs: 60 });
        let entry = JobEntry::new(Noop(spec));
        assert!(!entry.has_recurrence());

        entry.commit().unwrap();
        assert!(entry.has_recurrence());
        let next = entry.next_time();
        assert!(next.is_some());

        entry.commit().unwrap();
        assert_eq!(entry.next_time(), next);
    }

    #[test]
    fn commit_without_schedule_leaves_entry_idle() {
        let entry = JobEntry::new(Noop(JobSpec::new("manual")));
        entry.commit().unwrap();
        assert!(!entry.has_recurrence());
        assert!(!entry.hit(ScheduleTime::now()));
    }

    #[test]
    fn commit_surfaces_bad_cron() {
        let spec = JobSpec::new("bad").with_schedule(Schedule::Cron {
            expression: "every tuesday".to_string(),
        });
        let entry = JobEntry::new(Noop(spec));
        assert!(entry.commit().is_err());
        assert!(!entry.has_recurrence());
    }
}
