use debt::DebtError;
use fixed_point::MathError;
use pool_adapter::PoolError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Vault invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid vault parameters: {0}")]
    InvalidParameters(String),

    #[error("Deposit of zero amounts")]
    ZeroDeposit,

    #[error("Operation would mint or burn zero shares")]
    ZeroShares,

    #[error("Amounts ({amount0}, {amount1}) below minimums ({min0}, {min1})")]
    Slippage { amount0: String, amount1: String, min0: String, min1: String },

    #[error("{owner} holds {available} shares, {requested} requested")]
    InsufficientShares { owner: String, requested: String, available: String },

    #[error(transparent)]
    Math(#[from] MathError),

    #[error("Pool adapter error: {0}")]
    Pool(#[from] PoolError),

    #[error("Debt rebalancer error: {0}")]
    Debt(#[from] DebtError),
}
