use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::{ConditionTtl, Schedule};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{condition::ConditionRegistry, recurrence::ScheduleTime};

/// Static description of a job, fixed at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique across the daemon; commits with the same name merge.
    pub name: String,
    /// Conditions that must all hold for the job to be dispatched.
    #[serde(default)]
    pub conditions: BTreeMap<String, ConditionTtl>,
    /// Used to build the recurrence when the entry is committed without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: BTreeMap::new(),
            schedule: None,
        }
    }

    pub fn with_condition(mut self, name: impl Into<String>, ttl: ConditionTtl) -> Self {
        self.conditions.insert(name.into(), ttl);
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

/// Failure reported by a job run. The message ends up in the execution log.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct JobError {
    message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The unit of work the daemon schedules.
///
/// Implementations must be `Send + Sync`: each dispatch runs `run` on its own
/// Tokio task, and runs of the same job may overlap.
#[async_trait]
pub trait Job: Send + Sync {
    fn spec(&self) -> &JobSpec;

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

/// Handed to every job run. Gives the job access to the daemon's conditions.
#[derive(Debug, Clone)]
pub struct JobContext {
    conditions: ConditionRegistry,
    job_name: Arc<str>,
    run_id: Uuid,
    scheduled_at: ScheduleTime,
}

impl JobContext {
    /// The daemon builds one per dispatch; exposed so job implementations can
    /// be exercised without a running daemon.
    pub fn new(conditions: ConditionRegistry, job_name: &str, scheduled_at: ScheduleTime) -> Self {
        Self {
            conditions,
            job_name: Arc::from(job_name),
            run_id: Uuid::new_v4(),
            scheduled_at,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The tick this run was dispatched for.
    pub fn scheduled_at(&self) -> ScheduleTime {
        self.scheduled_at
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

    pub fn condition(&self, name: &str) -> Option<i64> {
        self.conditions.get(name)
    }
}
