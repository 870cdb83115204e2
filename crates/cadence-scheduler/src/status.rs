use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use cadence_core::{config::DEFAULT_HISTORY_LIMIT, DispatchPolicy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::now_ms;

/// Terminal state of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecResult {
    Ok,
    Error,
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecResult::Ok => "ok",
            ExecResult::Error => "err",
        };
        write!(f, "{s}")
    }
}

/// Record of one finished execution. Timestamps are Unix ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecLog {
    pub run_id: Uuid,
    pub created: i64,
    pub updated: i64,
    pub status: ExecResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecLog {
    pub fn duration_ms(&self) -> i64 {
        self.updated - self.created
    }
}

/// Consistent view of an [`ExecHistory`] taken under a single lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub exec_num: u64,
    pub in_flight: usize,
    pub last_log: Option<ExecLog>,
}

/// Per-job execution status, written by concurrent runs and read by reporting.
#[derive(Debug)]
pub struct ExecHistory {
    inner: Mutex<HistoryInner>,
}

#[derive(Debug)]
struct HistoryInner {
    exec_num: u64,
    in_flight: usize,
    limit: usize,
    /// Oldest first.
    logs: VecDeque<ExecLog>,
}

impl ExecHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Mutex::new(HistoryInner {
                exec_num: 0,
                in_flight: 0,
                limit: limit.max(1),
                logs: VecDeque::new(),
            }),
        }
    }

    /// Number of executions started so far.
    pub fn exec_num(&self) -> u64 {
        self.lock().exec_num
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn last_log(&self) -> Option<ExecLog> {
        self.lock().logs.back().cloned()
    }

    /// Retained logs, oldest first.
    pub fn logs(&self) -> Vec<ExecLog> {
        self.lock().logs.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.lock();
        StatusSnapshot {
            exec_num: inner.exec_num,
            in_flight: inner.in_flight,
            last_log: inner.logs.back().cloned(),
        }
    }

    pub(crate) fn set_limit(&self, limit: usize) {
        let mut inner = self.lock();
        inner.limit = limit.max(1);
        while inner.logs.len() > inner.limit {
            inner.logs.pop_front();
        }
    }

    /// Reserve an in-flight slot. Under `SkipIfRunning` this fails while
    /// another execution is still running.
    pub(crate) fn try_reserve(&self, policy: DispatchPolicy) -> bool {
        let mut inner = self.lock();
        if policy == DispatchPolicy::SkipIfRunning && inner.in_flight > 0 {
            return false;
        }
        inner.in_flight += 1;
        true
    }

    /// Mark a reserved execution as started. Returns its start time (ms).
    pub(crate) fn begin(&self) -> i64 {
        let mut inner = self.lock();
        inner.exec_num += 1;
        now_ms()
    }

    /// Release the in-flight slot and append the log.
    pub(crate) fn finish(&self, log: ExecLog) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.logs.push_back(log);
        while inner.logs.len() > inner.limit {
            inner.logs.pop_front();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryInner> {
        self.inner.lock().expect("exec history poisoned")
    }
}

impl Default for ExecHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(created: i64, status: ExecResult) -> ExecLog {
        ExecLog {
            run_id: Uuid::new_v4(),
            created,
            updated: created + 5,
            status,
            message: None,
        }
    }

    #[test]
    fn history_is_bounded_oldest_first() {
        let history = ExecHistory::new(2);
        for created in [1, 2, 3] {
            assert!(history.try_reserve(DispatchPolicy::AllowOverlap));
            history.begin();
            history.finish(log(created, ExecResult::Ok));
        }

        let logs = history.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].created, 2);
        assert_eq!(history.last_log().unwrap().created, 3);
        assert_eq!(history.exec_num(), 3);
        assert_eq!(history.in_flight(), 0);
    }

    #[test]
    fn skip_if_running_refuses_second_reservation() {
        let history = ExecHistory::default();
        assert!(history.try_reserve(DispatchPolicy::SkipIfRunning));
        assert!(!history.try_reserve(DispatchPolicy::SkipIfRunning));
        // Overlap policy ignores the running execution.
        assert!(history.try_reserve(DispatchPolicy::AllowOverlap));
        assert_eq!(history.in_flight(), 2);

        history.finish(log(1, ExecResult::Error));
        history.finish(log(2, ExecResult::Ok));
        assert!(history.try_reserve(DispatchPolicy::SkipIfRunning));
    }

    #[test]
    fn shrinking_limit_drops_old_logs() {
        let history = ExecHistory::new(4);
        for created in 0..4 {
            history.finish(log(created, ExecResult::Ok));
        }
        history.set_limit(1);
        assert_eq!(history.logs().len(), 1);
        assert_eq!(history.last_log().unwrap().created, 3);
    }
}
