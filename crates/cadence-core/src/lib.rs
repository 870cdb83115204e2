//! `cadence-core`: configuration and serde types shared by the scheduler
//! library and the `cadenced` binary.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CadenceConfig, DaemonConfig, JobConfig, LoggingConfig};
pub use error::{CadenceError, Result};
pub use types::{ConditionTtl, DispatchPolicy, Schedule};
