use crate::error::CoreError;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque share holder identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    /// Reserved key holding the minimum-liquidity floor minted on first deposit.
    pub const LOCKED: &'static str = "locked";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn locked() -> Self {
        Self(Self::LOCKED.to_string())
    }

    pub fn is_locked(&self) -> bool {
        self.0 == Self::LOCKED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A half-open tick interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    pub fn new(lower: i32, upper: i32) -> Result<Self, CoreError> {
        if lower >= upper {
            return Err(CoreError::InvalidRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// Whether a position over this range earns fees at `tick`.
    pub fn contains(&self, tick: i32) -> bool {
        self.lower <= tick && tick < self.upper
    }

    /// Midpoint tick, used as the reference for deviation triggers.
    pub fn center(&self) -> i32 {
        self.lower + (self.upper - self.lower) / 2
    }

    pub fn is_aligned(&self, tick_spacing: i32) -> bool {
        tick_spacing > 0 && self.lower % tick_spacing == 0 && self.upper % tick_spacing == 0
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

/// A pair of raw token amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmounts {
    #[serde(with = "crate::serde_u256")]
    pub amount0: U256,
    #[serde(with = "crate::serde_u256")]
    pub amount1: U256,
}

impl TokenAmounts {
    pub const ZERO: TokenAmounts = TokenAmounts { amount0: U256::ZERO, amount1: U256::ZERO };

    pub fn new(amount0: U256, amount1: U256) -> Self {
        Self { amount0, amount1 }
    }

    pub fn is_zero(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }
}

/// Current pool price state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot0 {
    #[serde(with = "crate::serde_u256")]
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// Liquidity and uncollected tokens of one owner's position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub liquidity: u128,
    #[serde(with = "crate::serde_u256")]
    pub tokens_owed0: U256,
    #[serde(with = "crate::serde_u256")]
    pub tokens_owed1: U256,
}

/// Exact result of an exact-input swap against the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub zero_for_one: bool,
    /// Tokens paid into the pool, fee included.
    #[serde(with = "crate::serde_u256")]
    pub amount_in: U256,
    /// Tokens received from the pool.
    #[serde(with = "crate::serde_u256")]
    pub amount_out: U256,
    /// Part of `amount_in` kept as the pool fee, in the input token.
    #[serde(with = "crate::serde_u256")]
    pub fee: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_range() {
        assert!(TickRange::new(60, 60).is_err());
        assert!(TickRange::new(120, -60).is_err());
        let range = TickRange::new(-120, 180).unwrap();
        assert!(range.contains(-120));
        assert!(!range.contains(180));
        assert_eq!(range.center(), 30);
        assert!(range.is_aligned(60));
        assert!(!range.is_aligned(200));
    }

    #[test]
    fn locked_owner_is_reserved_key() {
        assert!(Owner::locked().is_locked());
        assert!(!Owner::new("operator").is_locked());
    }

    #[test]
    fn token_amounts_serialize_as_decimal_strings() {
        let amounts = TokenAmounts::new(U256::from(7u64), U256::MAX);
        let json = serde_json::to_string(&amounts).unwrap();
        assert!(json.contains("\"7\""));
        let back: TokenAmounts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amounts);
    }
}
