use crate::adapter::PoolAdapter;
use crate::error::PoolError;
use configuration::PoolSettings;
use core_types::{
    BurnEvent, MintEvent, Owner, PoolEvent, PositionInfo, Slot0, SwapEvent, SwapOutcome, TickRange,
    TokenAmounts, U256,
};
use fixed_point::liquidity::{amounts_for_liquidity, amounts_for_liquidity_rounding_up};
use fixed_point::price::{token0_in_token1, token1_in_token0};
use fixed_point::tick_math::usable_tick_bounds;
use fixed_point::{MathError, mul_div, pips_of, pips_of_rounding_up, sqrt_ratio_at_tick, sub};
use std::collections::HashMap;

/// Static pool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    pub tick_spacing: i32,
    pub fee_pips: u32,
}

/// The in-memory pool used for backtests.
///
/// Price moves only through replayed swap events. Swaps issued by the vault fill at
/// the current spot price minus the pool fee and do not move the price. Fees from
/// replayed swaps accrue to in-range adapter positions in proportion to
/// `own_liquidity / (event_liquidity + own_in_range_liquidity)`. Historical
/// mints and burns are tracked per owner so a burn of liquidity that was never
/// minted inside the window is reported instead of silently applied.
#[derive(Debug, Clone)]
pub struct SimulatedPool {
    params: PoolParams,
    slot0: Slot0,
    positions: HashMap<(Owner, TickRange), PositionInfo>,
    historical: HashMap<(String, TickRange), u128>,
    active_liquidity: u128,
}

impl SimulatedPool {
    pub fn new(params: PoolParams, initial_tick: i32) -> Result<Self, PoolError> {
        if params.tick_spacing <= 0 {
            return Err(PoolError::InvalidParameters(format!(
                "tick spacing must be positive, got {}",
                params.tick_spacing
            )));
        }
        let sqrt_price_x96 = sqrt_ratio_at_tick(initial_tick)?;
        Ok(Self {
            params,
            slot0: Slot0 { sqrt_price_x96, tick: initial_tick },
            positions: HashMap::new(),
            historical: HashMap::new(),
            active_liquidity: 0,
        })
    }

    pub fn from_settings(settings: &PoolSettings) -> Result<Self, PoolError> {
        let params = PoolParams { tick_spacing: settings.tick_spacing, fee_pips: settings.fee_pips };
        Self::new(params, settings.initial_tick)
    }

    /// Moves the price to the post-swap state of a historical swap without
    /// accruing fees. Used to seed the pool from the last swap before a window.
    pub fn seed_from_swap(&mut self, swap: &SwapEvent) -> Result<(), PoolError> {
        if swap.sqrt_price_x96.is_zero() {
            return Err(PoolError::MalformedEvent("swap with zero sqrt price".to_string()));
        }
        self.slot0 = Slot0 { sqrt_price_x96: swap.sqrt_price_x96, tick: swap.tick };
        self.active_liquidity = swap.liquidity;
        Ok(())
    }

    /// In-range liquidity of the historical pool as of the last replayed swap.
    pub fn active_liquidity(&self) -> u128 {
        self.active_liquidity
    }

    fn check_range(&self, range: TickRange) -> Result<(), PoolError> {
        let range = TickRange::new(range.lower, range.upper)?;
        let (min, max) = usable_tick_bounds(self.params.tick_spacing);
        if !range.is_aligned(self.params.tick_spacing) || range.lower < min || range.upper > max {
            return Err(PoolError::UnusableRange { range, spacing: self.params.tick_spacing });
        }
        Ok(())
    }

    fn range_sqrt_prices(range: TickRange) -> Result<(U256, U256), PoolError> {
        Ok((sqrt_ratio_at_tick(range.lower)?, sqrt_ratio_at_tick(range.upper)?))
    }

    fn apply_historical_mint(&mut self, event: &MintEvent) -> Result<(), PoolError> {
        let range = event.range();
        self.check_range(range)?;
        let held = self.historical.entry((event.owner.clone(), range)).or_insert(0);
        *held = held.checked_add(event.amount).ok_or(MathError::Overflow("historical mint"))?;
        Ok(())
    }

    fn apply_historical_burn(&mut self, event: &BurnEvent) -> Result<(), PoolError> {
        if event.amount == 0 {
            return Ok(());
        }
        let range = event.range();
        let key = (event.owner.clone(), range);
        let available = self.historical.get(&key).copied().unwrap_or(0);
        if event.amount > available {
            return Err(PoolError::InsufficientLiquidity {
                owner: event.owner.clone(),
                range,
                requested: event.amount,
                available,
            });
        }
        if event.amount == available {
            self.historical.remove(&key);
        } else {
            self.historical.insert(key, available - event.amount);
        }
        Ok(())
    }

    fn apply_swap(&mut self, event: &SwapEvent) -> Result<(), PoolError> {
        if event.sqrt_price_x96.is_zero() {
            return Err(PoolError::MalformedEvent("swap with zero sqrt price".to_string()));
        }
        // Fees are charged on the token flowing into the pool.
        let (zero_for_one, amount_in) = match (event.amount0 > 0, event.amount1 > 0) {
            (true, false) => (true, event.amount0.unsigned_abs()),
            (false, true) => (false, event.amount1.unsigned_abs()),
            _ => {
                return Err(PoolError::MalformedEvent(format!(
                    "swap at block {} has no single input side ({}, {})",
                    event.block_number, event.amount0, event.amount1
                )));
            }
        };
        let fee_total = pips_of(U256::from(amount_in), self.params.fee_pips)?;

        let tick = self.slot0.tick;
        let own_in_range: u128 = self
            .positions
            .iter()
            .filter(|((_, range), info)| range.contains(tick) && info.liquidity > 0)
            .map(|(_, info)| info.liquidity)
            .fold(0u128, |acc, l| acc.saturating_add(l));

        if own_in_range > 0 && !fee_total.is_zero() {
            let denominator = U256::from(event.liquidity) + U256::from(own_in_range);
            for ((_, range), info) in self.positions.iter_mut() {
                if !range.contains(tick) || info.liquidity == 0 {
                    continue;
                }
                let share = mul_div(fee_total, U256::from(info.liquidity), denominator)?;
                if zero_for_one {
                    info.tokens_owed0 += share;
                } else {
                    info.tokens_owed1 += share;
                }
            }
        }

        self.slot0 = Slot0 { sqrt_price_x96: event.sqrt_price_x96, tick: event.tick };
        self.active_liquidity = event.liquidity;
        Ok(())
    }
}

impl PoolAdapter for SimulatedPool {
    fn slot0(&self) -> Slot0 {
        self.slot0
    }

    fn tick_spacing(&self) -> i32 {
        self.params.tick_spacing
    }

    fn fee_pips(&self) -> u32 {
        self.params.fee_pips
    }

    fn position(&self, owner: &Owner, range: TickRange) -> PositionInfo {
        self.positions.get(&(owner.clone(), range)).copied().unwrap_or_default()
    }

    fn mint(&mut self, owner: &Owner, range: TickRange, liquidity: u128) -> Result<TokenAmounts, PoolError> {
        if liquidity == 0 {
            return Err(PoolError::ZeroLiquidity);
        }
        self.check_range(range)?;
        let (sqrt_a, sqrt_b) = Self::range_sqrt_prices(range)?;
        let (amount0, amount1) =
            amounts_for_liquidity_rounding_up(self.slot0.sqrt_price_x96, sqrt_a, sqrt_b, liquidity)?;

        let position = self.positions.entry((owner.clone(), range)).or_default();
        position.liquidity = position
            .liquidity
            .checked_add(liquidity)
            .ok_or(MathError::Overflow("position liquidity"))?;

        tracing::debug!(%owner, %range, liquidity, %amount0, %amount1, "Pool mint");
        Ok(TokenAmounts::new(amount0, amount1))
    }

    fn burn(&mut self, owner: &Owner, range: TickRange, liquidity: u128) -> Result<TokenAmounts, PoolError> {
        let sqrt_price = self.slot0.sqrt_price_x96;
        let (sqrt_a, sqrt_b) = Self::range_sqrt_prices(range)?;
        let position = self
            .positions
            .get_mut(&(owner.clone(), range))
            .ok_or_else(|| PoolError::UnknownPosition { owner: owner.clone(), range })?;
        if liquidity > position.liquidity {
            return Err(PoolError::InsufficientLiquidity {
                owner: owner.to_string(),
                range,
                requested: liquidity,
                available: position.liquidity,
            });
        }
        if liquidity == 0 {
            return Ok(TokenAmounts::ZERO);
        }

        let (amount0, amount1) = amounts_for_liquidity(sqrt_price, sqrt_a, sqrt_b, liquidity)?;
        position.liquidity -= liquidity;
        position.tokens_owed0 += amount0;
        position.tokens_owed1 += amount1;

        tracing::debug!(%owner, %range, liquidity, %amount0, %amount1, "Pool burn");
        Ok(TokenAmounts::new(amount0, amount1))
    }

    fn collect(
        &mut self,
        owner: &Owner,
        range: TickRange,
        max0: U256,
        max1: U256,
    ) -> Result<TokenAmounts, PoolError> {
        let key = (owner.clone(), range);
        let Some(position) = self.positions.get_mut(&key) else {
            return Ok(TokenAmounts::ZERO);
        };
        let amount0 = position.tokens_owed0.min(max0);
        let amount1 = position.tokens_owed1.min(max1);
        position.tokens_owed0 = sub(position.tokens_owed0, amount0)?;
        position.tokens_owed1 = sub(position.tokens_owed1, amount1)?;
        if position.liquidity == 0 && position.tokens_owed0.is_zero() && position.tokens_owed1.is_zero() {
            self.positions.remove(&key);
        }
        Ok(TokenAmounts::new(amount0, amount1))
    }

    fn swap(
        &mut self,
        zero_for_one: bool,
        amount_in: U256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<SwapOutcome, PoolError> {
        if amount_in.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        let current = self.slot0.sqrt_price_x96;
        if let Some(limit) = sqrt_price_limit_x96 {
            let wrong_side = if zero_for_one { limit >= current } else { limit <= current };
            if wrong_side {
                return Err(PoolError::PriceLimit { limit: limit.to_string(), current: current.to_string() });
            }
        }

        let fee = pips_of_rounding_up(amount_in, self.params.fee_pips)?;
        let net = sub(amount_in, fee)?;
        let amount_out = if zero_for_one {
            token0_in_token1(net, current)?
        } else {
            token1_in_token0(net, current)?
        };

        tracing::debug!(zero_for_one, %amount_in, %amount_out, %fee, "Pool swap");
        Ok(SwapOutcome { zero_for_one, amount_in, amount_out, fee })
    }

    fn apply_event(&mut self, event: &PoolEvent) -> Result<(), PoolError> {
        match event {
            PoolEvent::Mint(mint) => self.apply_historical_mint(mint),
            PoolEvent::Burn(burn) => self.apply_historical_burn(burn),
            PoolEvent::Swap(swap) => self.apply_swap(swap),
        }
    }
}
