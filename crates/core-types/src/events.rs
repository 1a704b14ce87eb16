use crate::enums::EventKind;
use crate::structs::TickRange;
use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global causal position of an on-chain log: `(block_number, log_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub block_number: u64,
    pub log_index: u32,
}

/// A historical liquidity addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub timestamp: DateTime<Utc>,
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Liquidity added.
    pub amount: u128,
    #[serde(with = "crate::serde_u256")]
    pub amount0: U256,
    #[serde(with = "crate::serde_u256")]
    pub amount1: U256,
}

/// A historical liquidity removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub timestamp: DateTime<Utc>,
    pub owner: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Liquidity removed.
    pub amount: u128,
    #[serde(with = "crate::serde_u256")]
    pub amount0: U256,
    #[serde(with = "crate::serde_u256")]
    pub amount1: U256,
}

/// A historical swap. Amounts are signed from the pool's point of view:
/// positive flows into the pool, negative flows out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub timestamp: DateTime<Utc>,
    pub amount0: i128,
    pub amount1: i128,
    /// Post-swap sqrt price.
    #[serde(with = "crate::serde_u256")]
    pub sqrt_price_x96: U256,
    /// Post-swap in-range liquidity of the historical pool.
    pub liquidity: u128,
    /// Post-swap tick.
    pub tick: i32,
}

macro_rules! impl_keyed {
    ($($ty:ty),*) => {
        $(
            impl $ty {
                pub fn key(&self) -> EventKey {
                    EventKey { block_number: self.block_number, log_index: self.log_index }
                }
            }
        )*
    };
}

impl_keyed!(MintEvent, BurnEvent, SwapEvent);

impl MintEvent {
    pub fn range(&self) -> TickRange {
        TickRange { lower: self.tick_lower, upper: self.tick_upper }
    }
}

impl BurnEvent {
    pub fn range(&self) -> TickRange {
        TickRange { lower: self.tick_lower, upper: self.tick_upper }
    }
}

/// One replayed pool event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolEvent {
    Mint(MintEvent),
    Burn(BurnEvent),
    Swap(SwapEvent),
}

impl PoolEvent {
    pub fn key(&self) -> EventKey {
        match self {
            PoolEvent::Mint(e) => e.key(),
            PoolEvent::Burn(e) => e.key(),
            PoolEvent::Swap(e) => e.key(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PoolEvent::Mint(_) => EventKind::Mint,
            PoolEvent::Burn(_) => EventKind::Burn,
            PoolEvent::Swap(_) => EventKind::Swap,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PoolEvent::Mint(e) => e.timestamp,
            PoolEvent::Burn(e) => e.timestamp,
            PoolEvent::Swap(e) => e.timestamp,
        }
    }

    /// Full replay order: causal key first, then kind as the tie-break.
    pub fn order_key(&self) -> (EventKey, EventKind) {
        (self.key(), self.kind())
    }
}
