use std::str::FromStr;

use cadence_core::Schedule;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::{
    error::{Result, SchedulerError},
    recurrence::{Recurrence, ScheduleTime},
};

/// Built-in [`Recurrence`] driven by a declarative [`Schedule`].
#[derive(Debug, Clone)]
pub struct ScheduleState {
    schedule: Schedule,
    /// Parsed once; `Some` only for `Schedule::Cron`.
    cron: Option<cron::Schedule>,
    next: Option<DateTime<Utc>>,
}

impl ScheduleState {
    /// Validate `schedule` and prime the next fire time from the current clock.
    pub fn new(schedule: Schedule) -> Result<Self> {
        let cron = validate(&schedule)?;
        let next = compute_next_run(&schedule, cron.as_ref(), Utc::now());
        Ok(Self {
            schedule,
            cron,
            next,
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Whether `at` (already second-aligned) falls on the pattern.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        match &self.schedule {
            Schedule::Once { at: once } => once.timestamp() == at.timestamp(),

            Schedule::Interval { every_secs } => {
                at.timestamp().rem_euclid(*every_secs as i64) == 0
            }

            Schedule::Daily { hour, minute } => {
                at.hour() == *hour as u32 && at.minute() == *minute as u32 && at.second() == 0
            }

            Schedule::Weekly { day, hour, minute } => {
                at.weekday().num_days_from_monday() == *day as u32
                    && at.hour() == *hour as u32
                    && at.minute() == *minute as u32
                    && at.second() == 0
            }

            Schedule::Cron { .. } => self.cron.as_ref().is_some_and(|c| c.includes(at)),
        }
    }
}

impl Recurrence for ScheduleState {
    fn hit(&mut self, at: ScheduleTime) -> bool {
        let hit = self.matches(at.instant());
        self.next = compute_next_run(&self.schedule, self.cron.as_ref(), at.instant());
        hit
    }

    fn next_time(&self) -> Option<DateTime<Utc>> {
        self.next
    }
}

/// Check field ranges and parse cron expressions.
///
/// Returns the parsed cron schedule for `Schedule::Cron`, `None` otherwise.
pub fn validate(schedule: &Schedule) -> Result<Option<cron::Schedule>> {
    let invalid = |msg: String| Err(SchedulerError::InvalidSchedule(msg));
    match schedule {
        Schedule::Once { .. } => Ok(None),
        Schedule::Interval { every_secs: 0 } => invalid("interval must be at least 1 second".into()),
        Schedule::Interval { every_secs } if *every_secs > i64::MAX as u64 => {
            invalid(format!("interval too large: {every_secs}"))
        }
        Schedule::Interval { .. } => Ok(None),
        Schedule::Daily { hour, minute } => {
            check_time_of_day(*hour, *minute)?;
            Ok(None)
        }
        Schedule::Weekly { day, hour, minute } => {
            if *day > 6 {
                return invalid(format!("weekday out of range (0-6): {day}"));
            }
            check_time_of_day(*hour, *minute)?;
            Ok(None)
        }
        Schedule::Cron { expression } => cron::Schedule::from_str(expression)
            .map(Some)
            .map_err(|e| SchedulerError::InvalidSchedule(format!("cron '{expression}': {e}"))),
    }
}

fn check_time_of_day(hour: u8, minute: u8) -> Result<()> {
    if hour > 23 || minute > 59 {
        return Err(SchedulerError::InvalidSchedule(format!(
            "time of day out of range: {hour:02}:{minute:02}"
        )));
    }
    Ok(())
}

/// Compute the next UTC execution time for `schedule` strictly *after* `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` job whose time has
/// already passed) or when a cron schedule has no further occurrences.
pub fn compute_next_run(
    schedule: &Schedule,
    cron: Option<&cron::Schedule>,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => {
            let every = *every_secs as i64;
            let next = (from.timestamp().div_euclid(every) + 1).checked_mul(every)?;
            Utc.timestamp_opt(next, 0).single()
        }

        Schedule::Daily { hour, minute } => {
            // Build today's candidate at HH:MM:00 UTC.
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // `day` follows chrono's `num_days_from_monday` numbering.
            let today = from.weekday().num_days_from_monday() as i64;
            let days_ahead = (*day as i64 - today).rem_euclid(7);
            let candidate_day = from + Duration::days(days_ahead);

            let candidate = Utc
                .with_ymd_and_hms(
                    candidate_day.year(),
                    candidate_day.month(),
                    candidate_day.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;

            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(7))
            }
        }

        Schedule::Cron { .. } => cron.and_then(|c| c.after(&from).next()),
    }
}
