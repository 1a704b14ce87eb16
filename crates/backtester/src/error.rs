use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Strategy execution error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Vault ledger error: {0}")]
    Vault(#[from] vault::VaultError),

    #[error("Pool setup error: {0}")]
    Pool(#[from] pool_adapter::PoolError),

    #[error("Event history error: {0}")]
    Events(#[from] events::EventsError),

    #[error("Analytics calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),

    #[error("Backtest window is empty: {start} is not before {end}")]
    EmptyWindow { start: String, end: String },

    #[error("Backtest cancelled")]
    Cancelled,
}

impl From<indicatif::style::TemplateError> for BacktestError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        BacktestError::ProgressBarTemplate(error.to_string())
    }
}
