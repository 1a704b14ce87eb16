use crate::error::StrategyError;
use crate::vars::{CLOCK_NOW, HOLD_AMOUNT0, HOLD_AMOUNT1, StrategyVars};
use core_types::{RebalanceKind, RebalanceLog, TokenAmounts, U256};
use fixed_point::{mul_div, to_u128};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use vault::{LedgerSnapshot, Valuation};

/// Token1 per token0 in raw units at `tick`.
pub fn price_at_tick(tick: i32) -> Decimal {
    Decimal::from_f64(1.0001f64.powi(tick)).unwrap_or(if tick > 0 { Decimal::MAX } else { Decimal::ZERO })
}

/// Vault equity (value minus debt) against the hold benchmark, in basis points.
/// Negative when the vault trails holding.
pub fn realized_il_bps(equity: U256, hold_value: U256) -> Result<i64, StrategyError> {
    if hold_value.is_zero() {
        return Ok(0);
    }
    let (gap, negative) = if equity >= hold_value {
        (equity - hold_value, false)
    } else {
        (hold_value - equity, true)
    };
    let bps = to_u128(mul_div(gap, U256::from(10_000u32), hold_value)?)?;
    let bps = i64::try_from(bps).unwrap_or(i64::MAX);
    Ok(if negative { -bps } else { bps })
}

/// Assembles the record of one executed action from the ledger state around it.
pub fn rebalance_log(
    kind: RebalanceKind,
    pre: &LedgerSnapshot,
    post: &LedgerSnapshot,
    swap_fee: U256,
    vars: &StrategyVars,
    valuation: Valuation,
) -> Result<RebalanceLog, StrategyError> {
    let hold = TokenAmounts::new(vars.amount(HOLD_AMOUNT0)?, vars.amount(HOLD_AMOUNT1)?);
    let hold_value = valuation.value(hold)?.total()?;
    let equity = post.total_value.saturating_sub(post.virtual_debt);

    Ok(RebalanceLog {
        kind,
        timestamp: vars.time(CLOCK_NOW)?,
        tick: post.tick,
        price: price_at_tick(post.tick),
        wide: post.wide,
        base: post.base,
        limit: post.limit,
        total0: post.totals.amount0,
        total1: post.totals.amount1,
        pre_value: pre.total_value,
        post_value: post.total_value,
        lp_ratio: post.lp_ratio,
        swap_fee,
        pre_collateral_ratio: pre.collateral_ratio,
        post_collateral_ratio: post.collateral_ratio,
        debt: post.virtual_debt,
        accumulated_fees0: post.accumulated_swap_fees.amount0,
        accumulated_fees1: post.accumulated_swap_fees.amount1,
        realized_il_bps: realized_il_bps(equity, hold_value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn il_is_signed() {
        assert_eq!(realized_il_bps(U256::from(9_900u32), U256::from(10_000u32)).unwrap(), -100);
        assert_eq!(realized_il_bps(U256::from(10_250u32), U256::from(10_000u32)).unwrap(), 250);
        assert_eq!(realized_il_bps(U256::from(5u8), U256::ZERO).unwrap(), 0);
    }

    #[test]
    fn price_follows_tick() {
        assert_eq!(price_at_tick(0), dec!(1));
        let p = price_at_tick(39_120);
        assert!(p > dec!(49.9) && p < dec!(50.0));
        assert!(price_at_tick(-39_120) < dec!(0.03));
    }
}
