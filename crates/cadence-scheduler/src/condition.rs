//! Named external signals that gate job dispatch.
//!
//! The registry only stores *when* each condition was last asserted; whether
//! an assertion is still valid is decided at read time against the
//! threshold the job declares.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use cadence_core::ConditionTtl;
use chrono::Utc;
use tracing::debug;

/// Shared condition map: name -> last-asserted Unix timestamp (ms).
///
/// Cloning is a pointer bump; every clone sees the same map. Guarded by its
/// own lock, independent of the daemon's job list.
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    inner: Arc<RwLock<HashMap<String, i64>>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert `name` as of now.
    pub fn assert(&self, name: &str) {
        self.assert_at(name, now_ms());
    }

    /// Assert `name` with an explicit timestamp (ms).
    pub fn assert_at(&self, name: &str, at_ms: i64) {
        let mut map = self.inner.write().expect("condition registry poisoned");
        map.insert(name.to_string(), at_ms);
        debug!(condition = name, at_ms, "condition asserted");
    }

    /// Remove `name`. Returns whether it was present.
    pub fn clear(&self, name: &str) -> bool {
        let mut map = self.inner.write().expect("condition registry poisoned");
        let removed = map.remove(name).is_some();
        if removed {
            debug!(condition = name, "condition cleared");
        }
        removed
    }

    /// Last-asserted timestamp for `name`, if any.
    pub fn get(&self, name: &str) -> Option<i64> {
        let map = self.inner.read().expect("condition registry poisoned");
        map.get(name).copied()
    }

    /// Sorted copy of every asserted condition.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        let map = self.inner.read().expect("condition registry poisoned");
        map.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// The condition gate.
    ///
    /// Passes when `required` is empty. Otherwise every required condition
    /// must be present and still within its validity window at `now_ms`.
    /// Conditions are checked in name order and the first failure ends the
    /// check.
    pub fn allows(&self, required: &BTreeMap<String, ConditionTtl>, now_ms: i64) -> bool {
        if required.is_empty() {
            return true;
        }

        let map = self.inner.read().expect("condition registry poisoned");
        required.iter().all(|(name, ttl)| match map.get(name) {
            Some(asserted) => ttl.covers(*asserted, now_ms),
            None => false,
        })
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
