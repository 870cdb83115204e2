use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The provided schedule definition is invalid or unsupported.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job with the given name has been committed.
    #[error("Job not found: {name}")]
    JobNotFound { name: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
