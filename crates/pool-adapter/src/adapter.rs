use crate::error::PoolError;
use core_types::{Owner, PoolEvent, PositionInfo, Slot0, SwapOutcome, TickRange, TokenAmounts, U256};

/// A generic concentrated-liquidity pool.
///
/// This trait lets the vault ledger and the replay loop be agnostic about whether
/// they are talking to the in-memory simulation or another engine. Mutating calls
/// return the exact amounts that moved; views never fail.
pub trait PoolAdapter: Send + Sync {
    /// Current sqrt price and tick.
    fn slot0(&self) -> Slot0;

    fn tick_spacing(&self) -> i32;

    /// Swap fee in pips.
    fn fee_pips(&self) -> u32;

    /// Liquidity and uncollected tokens of `owner` over `range`. Unknown positions
    /// read as empty.
    fn position(&self, owner: &Owner, range: TickRange) -> PositionInfo;

    /// Adds `liquidity` to the position and returns the tokens charged (rounded up).
    fn mint(&mut self, owner: &Owner, range: TickRange, liquidity: u128) -> Result<TokenAmounts, PoolError>;

    /// Removes `liquidity` and moves its principal (rounded down) into the
    /// position's owed balance. Tokens only leave the pool through `collect`.
    fn burn(&mut self, owner: &Owner, range: TickRange, liquidity: u128) -> Result<TokenAmounts, PoolError>;

    /// Pays out up to `max0`/`max1` of the owed balance (burned principal plus fees).
    fn collect(
        &mut self,
        owner: &Owner,
        range: TickRange,
        max0: U256,
        max1: U256,
    ) -> Result<TokenAmounts, PoolError>;

    /// Exact-input swap of `amount_in`. `zero_for_one` sells token0 for token1.
    fn swap(
        &mut self,
        zero_for_one: bool,
        amount_in: U256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<SwapOutcome, PoolError>;

    /// Applies one replayed historical event to the pool state.
    fn apply_event(&mut self, event: &PoolEvent) -> Result<(), PoolError>;
}
