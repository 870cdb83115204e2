use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

/// A tick instant normalized to whole UTC seconds.
///
/// Every recurrence sees the same value for a given tick, regardless of how
/// late within the second the tick actually fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleTime(DateTime<Utc>);

impl ScheduleTime {
    pub fn from_instant(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    pub fn now() -> Self {
        Self::from_instant(Utc::now())
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn unix_secs(&self) -> i64 {
        self.0.timestamp()
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Recurrence state owned by a job entry.
///
/// The daemon calls [`hit`](Recurrence::hit) once per tick for every job
/// whose conditions pass, in tick order. Implementations may keep state
/// between calls (e.g. cache the next fire time).
pub trait Recurrence: Send + fmt::Debug {
    /// Does this tick match the pattern?
    fn hit(&mut self, at: ScheduleTime) -> bool;

    /// Next predicted match, if known. Only used for reporting.
    fn next_time(&self) -> Option<DateTime<Utc>>;
}

impl<R: Recurrence + ?Sized> Recurrence for Box<R> {
    fn hit(&mut self, at: ScheduleTime) -> bool {
        (**self).hit(at)
    }

    fn next_time(&self) -> Option<DateTime<Utc>> {
        (**self).next_time()
    }
}
