use crate::vars::{CLOCK_NOW, CLOCK_PERIOD_INDEX, HOLD_AMOUNT0, HOLD_AMOUNT1, POOL_SQRT_PRICE_X96, POOL_TICK, StrategyVars};
use chrono::{TimeZone, Utc};
use configuration::{AlmSettings, DebtSettings, VaultSettings};
use core_types::{Owner, StableToken, U256};
use pool_adapter::{PoolAdapter, PoolParams, SimulatedPool};
use rust_decimal_macros::dec;
use vault::VaultLedger;

pub const TICK: i32 = 39_120;
pub const DEPOSIT0: u128 = 100_000_000;
pub const DEPOSIT1: u128 = 5_000_000_000;

pub fn operator() -> Owner {
    Owner::new("operator")
}

pub fn debt_settings() -> DebtSettings {
    DebtSettings {
        enabled: true,
        target_collateral_ratio: dec!(2.0),
        deviation_threshold_above: dec!(0.1),
        deviation_threshold_below: dec!(0.1),
        max_correction_steps: 2000,
        check_every_event: false,
    }
}

pub fn alm_settings() -> AlmSettings {
    AlmSettings { period_ticks: 24, deviation_ticks: Some(1_800) }
}

/// A ledger holding the operator's deposit, nothing deployed yet.
pub fn funded() -> (VaultLedger, SimulatedPool) {
    let vault = VaultSettings {
        wide_threshold: 12_000,
        base_threshold: 3_600,
        limit_threshold: 1_200,
        wide_weight: dec!(0.1),
        manager_fee_pips: 0,
    };
    let mut ledger = VaultLedger::from_settings(&vault, &debt_settings(), 60, StableToken::Token1).unwrap();
    let mut pool = SimulatedPool::new(PoolParams { tick_spacing: 60, fee_pips: 3000 }, TICK).unwrap();
    ledger
        .deposit(&mut pool, &operator(), U256::from(DEPOSIT0), U256::from(DEPOSIT1), U256::ZERO, U256::ZERO)
        .unwrap();
    (ledger, pool)
}

/// The variables the replay loop would publish for `period`.
pub fn vars_at(pool: &dyn PoolAdapter, period: u64) -> StrategyVars {
    let slot0 = pool.slot0();
    let mut vars = StrategyVars::new();
    vars.set(CLOCK_NOW, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(period as i64));
    vars.set(CLOCK_PERIOD_INDEX, period);
    vars.set(POOL_TICK, slot0.tick);
    vars.set(POOL_SQRT_PRICE_X96, slot0.sqrt_price_x96);
    vars.set(HOLD_AMOUNT0, U256::from(DEPOSIT0));
    vars.set(HOLD_AMOUNT1, U256::from(DEPOSIT1));
    vars
}
