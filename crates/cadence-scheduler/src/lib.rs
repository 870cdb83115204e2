//! `cadence-scheduler`: in-process periodic job daemon on Tokio.
//!
//! # Overview
//!
//! Jobs are committed to a [`Daemon`], which keeps them in registration
//! order, at most one entry per job name. Once per tick (one second by
//! default) the daemon walks the list and, for every job that is active,
//! whose declared conditions hold and whose recurrence hits the current
//! second, spawns an independent execution. The loop never waits for an
//! execution to finish.
//!
//! # Conditions
//!
//! A condition is a named timestamp in the daemon's [`ConditionRegistry`].
//! A job declares the conditions it needs, each with a validity window in
//! milliseconds (or `-1` for presence only); it is dispatched only while all
//! of them are satisfied. Jobs can assert and clear conditions from their
//! [`JobContext`].
//!
//! # Built-in schedules
//!
//! | Variant    | Fires                                              |
//! |------------|----------------------------------------------------|
//! | `Once`     | On the tick landing on an absolute UTC second      |
//! | `Interval` | Every N seconds, epoch-aligned                     |
//! | `Daily`    | At HH:MM:00 UTC every day                          |
//! | `Weekly`   | At HH:MM:00 UTC on a specific weekday              |
//! | `Cron`     | Cron expression with a seconds field               |
//!
//! Any other pattern can be plugged in by implementing [`Recurrence`].

pub mod condition;
pub mod dispatch;
pub mod engine;
pub mod entry;
pub mod error;
pub mod job;
pub mod recurrence;
pub mod report;
pub mod schedule;
pub mod status;

pub use cadence_core::{ConditionTtl, DispatchPolicy, Schedule};
pub use condition::ConditionRegistry;
pub use dispatch::Dispatcher;
pub use engine::Daemon;
pub use entry::{JobAction, JobEntry};
pub use error::{Result, SchedulerError};
pub use job::{Job, JobContext, JobError, JobSpec};
pub use recurrence::{Recurrence, ScheduleTime};
pub use report::{BriefReport, BriefReportJob};
pub use schedule::ScheduleState;
pub use status::{ExecHistory, ExecLog, ExecResult, StatusSnapshot};
