use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid condition threshold: {0} (use -1 for never-expires)")]
    InvalidThreshold(i64),
}

pub type Result<T> = std::result::Result<T, CadenceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConditionTtl;

    #[test]
    fn negative_threshold_other_than_sentinel_is_rejected() {
        let err = ConditionTtl::try_from(-5).unwrap_err();
        assert!(matches!(err, CadenceError::InvalidThreshold(-5)));
        assert!(err.to_string().contains("use -1"));
    }
}
