use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::{ConditionTtl, DispatchPolicy, Schedule};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_STOP_GRACE_MS: u64 = 200; // one loop iteration to notice the stop
pub const DEFAULT_HISTORY_LIMIT: usize = 16;
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LOG_FILTER: &str = "cadenced=info,cadence_scheduler=info";

/// Top-level config (cadence.toml + CADENCE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Jobs the `cadenced` binary registers at startup.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Tick loop and dispatch tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How long `stop()` blocks the caller after signalling the loop.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// Execution logs kept per job (oldest dropped first). Minimum 1.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub dispatch: DispatchPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            dispatch: DispatchPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// How often the binary logs the brief report. 0 disables it.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
        }
    }
}

/// A shell-command job declared in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job name. Re-declaring a name updates the existing job.
    pub name: String,
    /// Run through `sh -c`.
    pub command: String,
    pub schedule: Schedule,
    /// Condition name -> validity window in ms (`-1` = presence only).
    #[serde(default)]
    pub conditions: BTreeMap<String, ConditionTtl>,
    /// Condition asserted after a successful run and cleared after a failed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success_assert: Option<String>,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
fn default_stop_grace_ms() -> u64 {
    DEFAULT_STOP_GRACE_MS
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_report_interval_secs() -> u64 {
    DEFAULT_REPORT_INTERVAL_SECS
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl CadenceConfig {
    /// Load config from a TOML file with CADENCE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cadence/cadence.toml
    ///
    /// A missing file is not an error; defaults fill every field.
    /// Nested keys use a double underscore: `CADENCE_DAEMON__TICK_INTERVAL_MS=500`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CadenceError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(CadenceConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.toml", home)
}
