use thiserror::Error;

/// Kernel constants a driver model refuses to run with.
#[derive(Debug, Error, PartialEq)]
pub enum BehaviorError {
    #[error("{name} must be positive and finite, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("idm_max_steps must be at least 1")]
    NoIntegrationSteps,
}

pub type BehaviorResult<T> = Result<T, BehaviorError>;
