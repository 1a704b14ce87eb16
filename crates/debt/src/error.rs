use fixed_point::MathError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebtError {
    #[error("Debt parameters from configuration are invalid: {0}")]
    InvalidParameters(String),

    #[error("Debt post-condition violated: {0}")]
    InvariantViolation(String),

    #[error("Debt math error: {0}")]
    Math(#[from] MathError),
}
