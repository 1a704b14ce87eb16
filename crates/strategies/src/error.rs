use advisor::AdvisorError;
use fixed_point::MathError;
use thiserror::Error;
use vault::VaultError;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Strategy variable '{0}' is not set")]
    MissingVariable(String),

    #[error("Strategy variable '{key}' is not a {expected}")]
    VariableType { key: String, expected: &'static str },

    #[error("Indicator error: {0}")]
    IndicatorError(String),

    #[error("Advisor '{advisor}' failed: {source}")]
    Advisor {
        advisor: String,
        #[source]
        source: AdvisorError,
    },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Math(#[from] MathError),
}
