use thiserror::Error;

/// Errors raised while reading or checking a run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file or an environment override could not be parsed into `Config`.
    #[error("Failed to read run configuration: {0}")]
    Source(#[from] config::ConfigError),

    /// The values parsed but break a rule the types cannot express, such as a
    /// range threshold that is not a multiple of the tick spacing.
    #[error("Invalid run configuration: {0}")]
    ValidationError(String),
}
