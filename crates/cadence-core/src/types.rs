use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CadenceError;

/// Wire value of [`ConditionTtl::NeverExpires`] in config files.
pub const NEVER_EXPIRES: i64 = -1;

/// Defines when a job's recurrence fires. Matching happens at whole-second
/// resolution in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fire exactly once, on the tick that lands on this UTC second.
    Once { at: DateTime<Utc> },

    /// Fire every N seconds, aligned to the Unix epoch (`every_secs = 60`
    /// fires at second 0 of each minute).
    Interval { every_secs: u64 },

    /// Fire every day at HH:MM:00 UTC.
    Daily { hour: u8, minute: u8 },

    /// Fire on a specific weekday (0 = Monday … 6 = Sunday) at HH:MM:00 UTC.
    Weekly { day: u8, hour: u8, minute: u8 },

    /// Cron expression with a leading seconds field, e.g. `"0 */5 * * * *"`.
    Cron { expression: String },
}

/// How long an asserted condition stays valid.
///
/// Serialised as a plain integer of milliseconds, with `-1` meaning the
/// condition only has to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ConditionTtl {
    NeverExpires,
    Millis(u64),
}

impl ConditionTtl {
    /// Whether an assertion made at `asserted_ms` is still valid at `now_ms`.
    /// The window is inclusive: `asserted + ttl == now` still passes.
    pub fn covers(&self, asserted_ms: i64, now_ms: i64) -> bool {
        match self {
            ConditionTtl::NeverExpires => true,
            ConditionTtl::Millis(ttl) => {
                let ttl = i64::try_from(*ttl).unwrap_or(i64::MAX);
                asserted_ms.saturating_add(ttl) >= now_ms
            }
        }
    }
}

impl TryFrom<i64> for ConditionTtl {
    type Error = CadenceError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            NEVER_EXPIRES => Ok(ConditionTtl::NeverExpires),
            ms if ms >= 0 => Ok(ConditionTtl::Millis(ms as u64)),
            other => Err(CadenceError::InvalidThreshold(other)),
        }
    }
}

impl From<ConditionTtl> for i64 {
    fn from(ttl: ConditionTtl) -> Self {
        match ttl {
            ConditionTtl::NeverExpires => NEVER_EXPIRES,
            ConditionTtl::Millis(ms) => i64::try_from(ms).unwrap_or(i64::MAX),
        }
    }
}

/// What the daemon does when a job's recurrence hits while a previous
/// execution of the same job is still in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Launch another execution regardless.
    #[default]
    AllowOverlap,
    /// Skip this tick for the job.
    SkipIfRunning,
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchPolicy::AllowOverlap => "allow_overlap",
            DispatchPolicy::SkipIfRunning => "skip_if_running",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "allow_overlap" => Ok(DispatchPolicy::AllowOverlap),
            "skip_if_running" => Ok(DispatchPolicy::SkipIfRunning),
            other => Err(format!("unknown dispatch policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_window_is_inclusive() {
        let ttl = ConditionTtl::Millis(1_000);
        assert!(ttl.covers(5_000, 5_000));
        assert!(ttl.covers(5_000, 6_000));
        assert!(!ttl.covers(5_000, 6_001));
    }

    #[test]
    fn never_expires_ignores_age() {
        assert!(ConditionTtl::NeverExpires.covers(0, i64::MAX));
    }

    #[test]
    fn ttl_parses_sentinel_and_rejects_other_negatives() {
        assert_eq!(ConditionTtl::try_from(-1).unwrap(), ConditionTtl::NeverExpires);
        assert_eq!(ConditionTtl::try_from(250).unwrap(), ConditionTtl::Millis(250));
        assert!(ConditionTtl::try_from(-2).is_err());

        let ttl: ConditionTtl = serde_json::from_str("-1").unwrap();
        assert_eq!(ttl, ConditionTtl::NeverExpires);
        assert_eq!(serde_json::to_string(&ConditionTtl::Millis(30)).unwrap(), "30");
    }

    #[test]
    fn schedule_uses_kind_tag() {
        let json = r#"{"kind":"weekly","day":2,"hour":9,"minute":30}"#;
        let s: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(s, Schedule::Weekly { day: 2, hour: 9, minute: 30 });
    }

    #[test]
    fn dispatch_policy_round_trips_through_str() {
        for p in [DispatchPolicy::AllowOverlap, DispatchPolicy::SkipIfRunning] {
            assert_eq!(p.to_string().parse::<DispatchPolicy>().unwrap(), p);
        }
        assert!("sometimes".parse::<DispatchPolicy>().is_err());
    }
}
