use chrono::{TimeZone, Utc};
use configuration::VaultSettings;
use core_types::{Owner, PoolEvent, StableToken, SwapEvent, TickRange, U256};
use debt::{DebtMode, DebtRebalancer, SolverParams};
use fixed_point::{INFINITE_RATIO, WAD, sqrt_ratio_at_tick};
use pool_adapter::{PoolAdapter, PoolParams, SimulatedPool};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use vault::{VaultError, VaultLedger, VaultParams};

const TICK: i32 = 39_120;

fn u(v: u128) -> U256 {
    U256::from(v)
}

fn setup() -> (VaultLedger, SimulatedPool) {
    let settings = VaultSettings {
        wide_threshold: 12_000,
        base_threshold: 3_600,
        limit_threshold: 1_200,
        wide_weight: dec!(0.1),
        manager_fee_pips: 100_000,
    };
    let params = VaultParams::new(&settings, 60, StableToken::Token1).unwrap();
    let ledger = VaultLedger::new(params, DebtRebalancer::new(SolverParams::default()).unwrap());
    let pool = SimulatedPool::new(PoolParams { tick_spacing: 60, fee_pips: 3000 }, TICK).unwrap();
    (ledger, pool)
}

fn swap_event(block: u64, amount0: i128, amount1: i128, tick: i32) -> PoolEvent {
    PoolEvent::Swap(SwapEvent {
        block_number: block,
        log_index: 0,
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        amount0,
        amount1,
        sqrt_price_x96: sqrt_ratio_at_tick(tick).unwrap(),
        liquidity: 10_000_000_000,
        tick,
    })
}

fn funded() -> (VaultLedger, SimulatedPool, Owner) {
    let (mut ledger, mut pool) = setup();
    let operator = Owner::new("operator");
    ledger
        .deposit(&mut pool, &operator, u(100_000_000), u(5_000_000_000), U256::ZERO, U256::ZERO)
        .unwrap();
    (ledger, pool, operator)
}

fn within_bps(a: U256, b: U256, bps: u64) -> bool {
    let gap = if a > b { a - b } else { b - a };
    gap * u(10_000) <= b * U256::from(bps)
}

#[test]
fn deposit_then_rebalance_keeps_lp_ratio() {
    let (mut ledger, mut pool, operator) = funded();
    assert_eq!(ledger.balance_of(&operator), u(5_000_000_000 - 1000));

    let receipt = ledger.rebalance(&mut pool).unwrap();
    assert_eq!(receipt.wide, TickRange::new(27_120, 51_180).unwrap());
    assert_eq!(receipt.base, TickRange::new(35_520, 42_780).unwrap());
    assert!(receipt.limit == TickRange::new(37_920, 39_120).unwrap() || receipt.limit == TickRange::new(39_180, 40_380).unwrap());
    assert!(receipt.wide_liquidity > 0 && receipt.base_liquidity > 0);
    assert!(receipt.base_liquidity > receipt.wide_liquidity);

    assert!(within_bps(receipt.post_lp_ratio, receipt.pre_lp_ratio, 10));
    // The pair was deposited close to balanced.
    assert!(within_bps(receipt.pre_lp_ratio, WAD, 100));
    assert!(ledger.has_active_position(&pool));
    ledger.check_share_conservation().unwrap();
}

#[test]
fn deposit_withdraw_round_trip() {
    let (mut ledger, mut pool, operator) = funded();
    ledger.rebalance(&mut pool).unwrap();

    let shares = ledger.balance_of(&operator);
    let paid = ledger.withdraw(&mut pool, &operator, shares, U256::ZERO, U256::ZERO).unwrap();
    // Everything but the locked floor's share and rounding comes back.
    assert!(paid.amount0 <= u(100_000_000) && within_bps(paid.amount0, u(100_000_000), 1));
    assert!(paid.amount1 <= u(5_000_000_000) && within_bps(paid.amount1, u(5_000_000_000), 1));
    assert_eq!(ledger.total_supply(), u(1000));
    ledger.check_share_conservation().unwrap();
}

#[test]
fn swap_fees_accrue_and_are_split() {
    let (mut ledger, mut pool, operator) = funded();
    ledger.rebalance(&mut pool).unwrap();

    pool.apply_event(&swap_event(1, 1_000_000_000, -49_000_000_000, TICK)).unwrap();
    let before = ledger.total_amounts(&pool).unwrap();
    assert!(before.amount0 > u(100_000_000 - 100));

    let receipt = ledger.rebalance(&mut pool).unwrap();
    assert!(receipt.collected_fees.amount0 > U256::ZERO);
    assert!(receipt.net_fees.amount0 < receipt.collected_fees.amount0);
    assert_eq!(ledger.accumulated_swap_fees(), receipt.net_fees);
    assert!(ledger.accrued_manager_fees().amount0 > U256::ZERO);

    let shares = ledger.balance_of(&operator) / u(2);
    let idle_before = ledger.idle();
    ledger.withdraw(&mut pool, &operator, shares, U256::ZERO, U256::ZERO).unwrap();
    // The manager cut is never paid out to shareholders.
    assert!(ledger.idle().amount0 >= ledger.accrued_manager_fees().amount0);
    assert!(ledger.idle().amount0 <= idle_before.amount0 + receipt.collected_fees.amount0);
}

#[test]
fn leverage_then_deleverage_after_price_drop() {
    let (mut ledger, mut pool, operator) = funded();
    ledger.rebalance(&mut pool).unwrap();
    assert_eq!(ledger.collateral_ratio(&pool).unwrap(), INFINITE_RATIO);

    let levered = ledger.rebalance_debt(&mut pool, &operator).unwrap();
    assert_eq!(levered.plan.mode, DebtMode::Leverage);
    assert!(levered.debt_change > U256::ZERO);
    assert!(levered.shares_minted > U256::ZERO);
    assert_eq!(ledger.virtual_debt(), levered.debt_change);
    let cr = ledger.collateral_ratio(&pool).unwrap();
    assert!(within_bps(cr, WAD * u(2), 1_000));

    // Volatile token loses ~18% against stable.
    pool.apply_event(&swap_event(2, 20_000_000, -900_000_000, 37_120)).unwrap();
    let dropped = ledger.collateral_ratio(&pool).unwrap();
    assert!(dropped < WAD * u(2));

    let debt_before = ledger.virtual_debt();
    let unwound = ledger.rebalance_debt(&mut pool, &operator).unwrap();
    assert_eq!(unwound.plan.mode, DebtMode::Deleverage);
    assert!(!unwound.plan.full_exit);
    assert!(ledger.virtual_debt() < debt_before);
    let cr = ledger.collateral_ratio(&pool).unwrap();
    assert!(within_bps(cr, WAD * u(2), 1_000));
    ledger.check_share_conservation().unwrap();
}

#[test]
fn price_rise_levers_up_again() {
    let (mut ledger, mut pool, operator) = funded();
    ledger.rebalance(&mut pool).unwrap();
    ledger.rebalance_debt(&mut pool, &operator).unwrap();

    pool.apply_event(&swap_event(2, -20_000_000, 1_100_000_000, 41_120)).unwrap();
    assert!(ledger.collateral_ratio(&pool).unwrap() > WAD * u(2));
    let outcome = ledger.rebalance_debt(&mut pool, &operator).unwrap();
    assert_eq!(outcome.plan.mode, DebtMode::Leverage);
    assert!(outcome.debt_change > U256::ZERO);
}

#[test]
fn withdrawing_more_than_owned_fails_before_touching_positions() {
    let (mut ledger, mut pool, operator) = funded();
    ledger.rebalance(&mut pool).unwrap();
    let before = ledger.total_amounts(&pool).unwrap();
    let err = ledger
        .withdraw(&mut pool, &operator, u(6_000_000_000), U256::ZERO, U256::ZERO)
        .unwrap_err();
    assert!(matches!(err, VaultError::InsufficientShares { .. }));
    assert_eq!(ledger.total_amounts(&pool).unwrap(), before);
}

#[test]
fn rejected_withdraw_leaves_the_books_untouched() {
    let (mut ledger, mut pool, operator) = funded();
    ledger.rebalance(&mut pool).unwrap();
    pool.apply_event(&swap_event(1, 1_000_000_000, -49_000_000_000, TICK)).unwrap();

    let shares = ledger.balance_of(&operator) / u(2);
    let balance = ledger.balance_of(&operator);
    let supply = ledger.total_supply();
    let idle = ledger.idle();
    let liquidity: Vec<u128> =
        ledger.ranges().into_iter().map(|r| pool.position(ledger.address(), r).liquidity).collect();
    let quote = ledger.preview_withdraw(&pool, &operator, shares).unwrap();

    let err = ledger
        .withdraw(&mut pool, &operator, shares, quote.amount0 + u(1), U256::ZERO)
        .unwrap_err();
    assert!(matches!(err, VaultError::Slippage { .. }));
    assert_eq!(ledger.balance_of(&operator), balance);
    assert_eq!(ledger.total_supply(), supply);
    assert_eq!(ledger.idle(), idle);
    let after: Vec<u128> =
        ledger.ranges().into_iter().map(|r| pool.position(ledger.address(), r).liquidity).collect();
    assert_eq!(after, liquidity);

    // The quote is exactly what an accepted withdrawal pays.
    let paid = ledger.withdraw(&mut pool, &operator, shares, quote.amount0, quote.amount1).unwrap();
    assert_eq!(paid, quote);
    ledger.check_share_conservation().unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    Deposit { who: usize, amount0: u128, amount1: u128 },
    Withdraw { who: usize, percent: u8 },
    Rebalance,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 1u128..10_000_000_000, 1u128..500_000_000_000)
            .prop_map(|(who, amount0, amount1)| Op::Deposit { who, amount0, amount1 }),
        (0usize..3, 1u8..=100).prop_map(|(who, percent)| Op::Withdraw { who, percent }),
        Just(Op::Rebalance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    #[test]
    fn shares_are_conserved(ops in prop::collection::vec(op(), 1..20)) {
        let (mut ledger, mut pool) = setup();
        let owners = [Owner::new("a"), Owner::new("b"), Owner::new("c")];
        for op in ops {
            let _ = match op {
                Op::Deposit { who, amount0, amount1 } => ledger
                    .deposit(&mut pool, &owners[who], u(amount0), u(amount1), U256::ZERO, U256::ZERO)
                    .map(|_| ()),
                Op::Withdraw { who, percent } => {
                    let shares = ledger.balance_of(&owners[who]) * U256::from(percent) / u(100);
                    ledger.withdraw(&mut pool, &owners[who], shares, U256::ZERO, U256::ZERO).map(|_| ())
                }
                Op::Rebalance => ledger.rebalance(&mut pool).map(|_| ()),
            };
            prop_assert!(ledger.check_share_conservation().is_ok());
            let idle = ledger.idle();
            let fees = ledger.accrued_manager_fees();
            prop_assert!(idle.amount0 >= fees.amount0 && idle.amount1 >= fees.amount1);
        }
    }
}
