use core_types::{CoreError, Owner, TickRange};
use fixed_point::MathError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid tick range: {0}")]
    InvalidRange(#[from] CoreError),

    #[error("Range {range} is not aligned to tick spacing {spacing} or exceeds tick bounds")]
    UnusableRange { range: TickRange, spacing: i32 },

    #[error("Pool parameters are invalid: {0}")]
    InvalidParameters(String),

    #[error("Liquidity amount must be positive")]
    ZeroLiquidity,

    #[error("Swap amount must be positive")]
    ZeroAmount,

    #[error("Burn of {requested} liquidity from {owner} at {range} exceeds the {available} held")]
    InsufficientLiquidity {
        owner: String,
        range: TickRange,
        requested: u128,
        available: u128,
    },

    #[error("Owner {owner} holds no position at {range}")]
    UnknownPosition { owner: Owner, range: TickRange },

    #[error("Sqrt price limit {limit} is on the wrong side of the current price {current}")]
    PriceLimit { limit: String, current: String },

    #[error("Replayed event is malformed: {0}")]
    MalformedEvent(String),

    #[error("Pool math error: {0}")]
    Math(#[from] MathError),
}
