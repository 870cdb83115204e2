//! Human-readable status summary of every active job.
//!
//! Message layout, one line per job:
//!
//! ```text
//! exec 3 times, last at 2024-05-01 10:00:00.25 in 120 ms, status ok, next 2024-05-01 10:01:00
//! ```
//!
//! Downstream tooling may parse these lines, so the wording is fixed.
//! Timestamps are UTC, whatever the host's local zone.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entry::{JobAction, JobEntry},
    status::ExecResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefReportJob {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefReport {
    pub jobs: Vec<BriefReportJob>,
}

impl BriefReport {
    /// Summarize every entry whose action is `Start`, in list order.
    pub fn from_entries(entries: &[Arc<JobEntry>]) -> Self {
        let jobs = entries
            .iter()
            .filter(|e| e.action() == JobAction::Start)
            .map(|e| BriefReportJob {
                name: e.name().to_string(),
                message: describe(e),
            })
            .collect();
        Self { jobs }
    }
}

fn describe(entry: &JobEntry) -> String {
    let status = entry.status().snapshot();
    let mut msg = format!("exec {} times", status.exec_num);

    if let Some(log) = status.last_log {
        msg.push_str(&format!(
            ", last at {} in {} ms",
            format_millis(log.created),
            log.duration_ms()
        ));
        match log.status {
            ExecResult::Ok => msg.push_str(", status ok"),
            ExecResult::Error => {
                msg.push_str(", status err");
                if let Some(m) = log.message.as_deref().filter(|m| !m.is_empty()) {
                    msg.push_str(": ");
                    msg.push_str(m);
                }
            }
        }
    }

    if let Some(next) = entry.next_time() {
        msg.push_str(&format!(", next {}", format_seconds(next)));
    }

    msg
}

/// `YYYY-MM-DD HH:MM:SS` plus up to three fractional digits, trailing zeros
/// (and the dot, for whole seconds) removed.
fn format_millis(ms: i64) -> String {
    let Some(at) = Utc.timestamp_millis_opt(ms).single() else {
        return ms.to_string();
    };
    let base = at.format("%Y-%m-%d %H:%M:%S").to_string();
    let frac = ms.rem_euclid(1_000);
    if frac == 0 {
        return base;
    }
    let digits = format!("{frac:03}");
    format!("{base}.{}", digits.trim_end_matches('0'))
}

fn format_seconds(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_drop_trailing_zeros() {
        // 2024-05-01 10:00:00 UTC
        let base = 1_714_557_600_000;
        assert_eq!(format_millis(base), "2024-05-01 10:00:00");
        assert_eq!(format_millis(base + 250), "2024-05-01 10:00:00.25");
        assert_eq!(format_millis(base + 7), "2024-05-01 10:00:00.007");
        assert_eq!(format_millis(base + 120), "2024-05-01 10:00:00.12");
    }

    #[test]
    fn report_serializes_as_jobs_list() {
        let report = BriefReport {
            jobs: vec![BriefReportJob {
                name: "a".to_string(),
                message: "exec 0 times".to_string(),
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"jobs":[{"name":"a","message":"exec 0 times"}]}"#);
    }
}
