use crate::error::VaultError;
use crate::ledger::VaultLedger;
use crate::valuation::Valuation;
use core_types::{TickRange, TokenAmounts, U256};
use fixed_point::tick_math::{floor_to_spacing, usable_tick_bounds};
use fixed_point::{INFINITE_RATIO, PIPS_DENOMINATOR, add, mul_div, sub, to_u128};
use pool_adapter::PoolAdapter;

/// Per-token tolerance for the conservation check of a passive rebalance.
pub const TOKEN_DUST: u64 = 10;

/// LP-ratio parity tolerance, in basis points of the pre-rebalance ratio.
pub const LP_PARITY_TOLERANCE_BPS: u64 = 10;

/// LP-ratio parity is only enforced once both token balances and both value legs
/// reach this many raw units. At this size the `TOKEN_DUST` gap the conservation
/// check admits on each token moves the ratio by at most 8 bps.
pub const PARITY_MIN_AMOUNT: u64 = TOKEN_DUST * 2_500;

/// What one passive rebalance did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceReceipt {
    pub tick: i32,
    /// Fees collected from the old positions, before the manager cut.
    pub collected_fees: TokenAmounts,
    pub net_fees: TokenAmounts,
    pub wide: TickRange,
    pub base: TickRange,
    pub limit: TickRange,
    pub wide_liquidity: u128,
    pub base_liquidity: u128,
    pub limit_liquidity: u128,
    /// Usable idle once every old position was liquidated.
    pub pre_idle: TokenAmounts,
    pub post_idle: TokenAmounts,
    pub pre_lp_ratio: U256,
    pub post_lp_ratio: U256,
    pub pre_value: U256,
    pub post_value: U256,
}

impl VaultLedger {
    /// Liquidates every range, recomputes wide/base/limit around the current
    /// tick and redeploys the usable idle balance.
    pub fn rebalance(&mut self, pool: &mut dyn PoolAdapter) -> Result<RebalanceReceipt, VaultError> {
        let mut collected_fees = TokenAmounts::ZERO;
        let mut net_fees = TokenAmounts::ZERO;
        for range in self.ranges() {
            let held = pool.position(&self.address, range).liquidity;
            let principal = if held > 0 {
                pool.burn(&self.address, range, held)?
            } else {
                TokenAmounts::ZERO
            };
            let collected = pool.collect(&self.address, range, U256::MAX, U256::MAX)?;
            let net = self.settle_collected(principal, collected)?;
            collected_fees.amount0 = add(collected_fees.amount0, sub(collected.amount0, principal.amount0)?)?;
            collected_fees.amount1 = add(collected_fees.amount1, sub(collected.amount1, principal.amount1)?)?;
            net_fees.amount0 = add(net_fees.amount0, net.amount0)?;
            net_fees.amount1 = add(net_fees.amount1, net.amount1)?;
        }

        let slot0 = pool.slot0();
        let valuation = Valuation::new(self.params.stable, slot0.sqrt_price_x96);
        let pre_idle = self.usable_idle()?;
        let pre = valuation.value(pre_idle)?;

        let spacing = self.params.tick_spacing;
        let floor = floor_to_spacing(slot0.tick, spacing);
        let wide = self.centered_range(floor, self.params.wide_threshold)?;
        let base = self.centered_range(floor, self.params.base_threshold)?;
        let bid = self.bounded_range(floor - self.params.limit_threshold, floor)?;
        let ask = self.bounded_range(floor + spacing, floor + spacing + self.params.limit_threshold)?;

        let full_wide = self.mintable_liquidity(pool, wide, pre_idle)?;
        let wide_liquidity = to_u128(mul_div(
            U256::from(full_wide),
            U256::from(self.params.wide_weight_pips),
            U256::from(PIPS_DENOMINATOR),
        )?)?;
        self.mint_from_idle(pool, wide, wide_liquidity)?;

        let base_liquidity = self.mintable_liquidity(pool, base, self.usable_idle()?)?;
        self.mint_from_idle(pool, base, base_liquidity)?;

        let remaining = self.usable_idle()?;
        let bid_liquidity = self.mintable_liquidity(pool, bid, remaining)?;
        let ask_liquidity = self.mintable_liquidity(pool, ask, remaining)?;
        let (limit, limit_liquidity) =
            if bid_liquidity >= ask_liquidity { (bid, bid_liquidity) } else { (ask, ask_liquidity) };
        self.mint_from_idle(pool, limit, limit_liquidity)?;

        self.wide = Some(wide);
        self.base = Some(base);
        self.limit = Some(limit);

        let post_idle = self.usable_idle()?;
        check_token_conservation(pre_idle, self.accounted_after_mint(pool, post_idle)?)?;
        let post = self.value(pool)?;
        let pre_lp_ratio = pre.lp_ratio()?;
        let post_lp_ratio = post.lp_ratio()?;
        let floor_amount = U256::from(PARITY_MIN_AMOUNT);
        if [pre_idle.amount0, pre_idle.amount1, pre.stable_value, pre.volatile_value]
            .iter()
            .all(|v| *v >= floor_amount)
        {
            check_lp_parity(pre_lp_ratio, post_lp_ratio)?;
        }

        let receipt = RebalanceReceipt {
            tick: slot0.tick,
            collected_fees,
            net_fees,
            wide,
            base,
            limit,
            wide_liquidity,
            base_liquidity,
            limit_liquidity,
            pre_idle,
            post_idle,
            pre_lp_ratio,
            post_lp_ratio,
            pre_value: pre.total()?,
            post_value: post.total()?,
        };
        tracing::info!(
            tick = slot0.tick,
            %wide,
            %base,
            %limit,
            wide_liquidity,
            base_liquidity,
            limit_liquidity,
            fees0 = %collected_fees.amount0,
            fees1 = %collected_fees.amount1,
            "Passive rebalance"
        );
        Ok(receipt)
    }

    /// `[floor - threshold, floor + spacing + threshold]`, clamped to usable ticks.
    fn centered_range(&self, floor: i32, threshold: i32) -> Result<TickRange, VaultError> {
        self.bounded_range(floor - threshold, floor + self.params.tick_spacing + threshold)
    }

    fn bounded_range(&self, lower: i32, upper: i32) -> Result<TickRange, VaultError> {
        let (min, max) = usable_tick_bounds(self.params.tick_spacing);
        TickRange::new(lower.max(min), upper.min(max)).map_err(|e| {
            VaultError::InvalidParameters(format!("range [{lower}, {upper}) has no usable ticks: {e}"))
        })
    }

    /// Deployed principal plus remaining usable idle.
    fn accounted_after_mint(&self, pool: &dyn PoolAdapter, post_idle: TokenAmounts) -> Result<TokenAmounts, VaultError> {
        let sqrt_price = pool.slot0().sqrt_price_x96;
        let mut accounted = post_idle;
        for range in self.ranges() {
            let principal = self.principal(sqrt_price, range, pool.position(&self.address, range).liquidity)?;
            accounted.amount0 = add(accounted.amount0, principal.amount0)?;
            accounted.amount1 = add(accounted.amount1, principal.amount1)?;
        }
        Ok(accounted)
    }
}

/// What a rebalance accounts for must not exceed the idle balance before
/// minting, and may fall short of it by at most `TOKEN_DUST` per token.
fn check_token_conservation(pre_idle: TokenAmounts, accounted: TokenAmounts) -> Result<(), VaultError> {
    let dust = U256::from(TOKEN_DUST);
    for (token, before, after) in [
        (0, pre_idle.amount0, accounted.amount0),
        (1, pre_idle.amount1, accounted.amount1),
    ] {
        if after > before || before - after > dust {
            return Err(VaultError::InvariantViolation(format!(
                "token{token} not conserved by rebalance: {before} before, {after} after"
            )));
        }
    }
    Ok(())
}

fn check_lp_parity(pre: U256, post: U256) -> Result<(), VaultError> {
    if pre == INFINITE_RATIO || post == INFINITE_RATIO || pre.is_zero() || post.is_zero() {
        if pre == post {
            return Ok(());
        }
        return Err(VaultError::InvariantViolation(format!("LP ratio moved from {pre} to {post}")));
    }
    let gap = if pre > post { pre - post } else { post - pre };
    let allowed = mul_div(pre, U256::from(LP_PARITY_TOLERANCE_BPS), U256::from(10_000u32))?;
    if gap > allowed {
        return Err(VaultError::InvariantViolation(format!(
            "LP ratio moved from {pre} to {post}, beyond {LP_PARITY_TOLERANCE_BPS} bps"
        )));
    }
    Ok(())
}
