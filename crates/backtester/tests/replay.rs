use async_trait::async_trait;
use backtester::{BacktestError, Backtester};
use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::{AlmSettings, BacktestSettings, Config, DataSettings, DebtSettings, PoolSettings, VaultSettings};
use core_types::{BurnEvent, MintEvent, RebalanceKind, StableToken, SwapEvent, TickSize, U256};
use events::{EventBatch, EventSource, EventsError, HistoricalEvents};
use fixed_point::sqrt_ratio_at_tick;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::sync::atomic::Ordering;
use uuid::Uuid;

const SEED_TICK: i32 = 39_000;
/// Tick offsets from `SEED_TICK`, one swap per hour.
const PATH: [i32; 12] = [0, 240, 600, 1_200, 2_100, 2_400, 1_800, 900, 0, -600, -300, 120];

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn end() -> DateTime<Utc> {
    start() + Duration::hours(PATH.len() as i64)
}

fn config() -> Config {
    Config {
        backtest: BacktestSettings {
            start_date: start(),
            end_date: end(),
            tick_size: TickSize::Hour,
            initial_amount0: 100_000_000,
            initial_amount1: 5_000_000_000,
            operator: "operator".to_string(),
        },
        pool: PoolSettings { tick_spacing: 60, fee_pips: 3000, initial_tick: 0, stable_token: StableToken::Token1 },
        vault: VaultSettings {
            wide_threshold: 12_000,
            base_threshold: 3_600,
            limit_threshold: 1_200,
            wide_weight: dec!(0.1),
            manager_fee_pips: 0,
        },
        debt: DebtSettings {
            enabled: true,
            target_collateral_ratio: dec!(2.0),
            deviation_threshold_above: dec!(0.1),
            deviation_threshold_below: dec!(0.1),
            max_correction_steps: 2000,
            check_every_event: false,
        },
        alm: AlmSettings { period_ticks: 24, deviation_ticks: Some(1_800) },
        advisor: None,
        data: DataSettings { events_dir: "data/events".into() },
    }
}

fn swap(block: u64, timestamp: DateTime<Utc>, from: i32, to: i32) -> SwapEvent {
    // Price up means token1 flowed in.
    let (amount0, amount1) = if to >= from { (-1_000_000, 50_000_000) } else { (1_000_000, -50_000_000) };
    SwapEvent {
        block_number: block,
        log_index: 0,
        timestamp,
        amount0,
        amount1,
        sqrt_price_x96: sqrt_ratio_at_tick(to).unwrap(),
        liquidity: 1_000_000_000_000_000,
        tick: to,
    }
}

fn history() -> Arc<dyn EventSource> {
    let mut swaps = vec![swap(99, start() - Duration::hours(1), 38_000, SEED_TICK)];
    let mut previous = SEED_TICK;
    for (hour, offset) in PATH.iter().enumerate() {
        let tick = SEED_TICK + offset;
        let at = start() + Duration::hours(hour as i64) + Duration::minutes(30);
        swaps.push(swap(1_005 + hour as u64 * 10, at, previous, tick));
        previous = tick;
    }

    let at = start() + Duration::minutes(10);
    let mint = MintEvent {
        block_number: 1_000,
        log_index: 0,
        timestamp: at,
        owner: "lp".to_string(),
        tick_lower: 38_400,
        tick_upper: 39_840,
        amount: 5_000,
        amount0: U256::from(10u8),
        amount1: U256::from(10u8),
    };
    let burn = |block: u64, owner: &str, amount: u128| BurnEvent {
        block_number: block,
        log_index: 1,
        timestamp: at + Duration::hours(2),
        owner: owner.to_string(),
        tick_lower: 38_400,
        tick_upper: 39_840,
        amount,
        amount0: U256::from(10u8),
        amount1: U256::from(10u8),
    };
    // The second burn removes liquidity nobody ever added.
    let burns = vec![burn(1_020, "lp", 5_000), burn(1_021, "stranger", 1_000)];

    Arc::new(HistoricalEvents::new(vec![mint], burns, swaps).unwrap())
}

async fn backtester() -> Backtester {
    Backtester::from_config(Uuid::new_v4(), &config(), history()).await.unwrap()
}

#[tokio::test]
async fn replays_every_period_and_both_strategies_act() {
    let report = backtester().await.run(start(), end()).await.unwrap();

    assert_eq!(report.periods, PATH.len() as u64);
    assert_eq!(report.equity_curve.len(), PATH.len() + 1);
    assert_eq!(report.equity_curve.last().unwrap().timestamp, end());
    // One mint, one burn and every in-window swap.
    assert_eq!(report.events_applied, PATH.len() as u64 + 2);
    assert_eq!(report.events_skipped, 1);

    let first = &report.rebalances[0];
    assert_eq!(first.kind, RebalanceKind::Dlv);
    assert_eq!(first.timestamp, start());
    let first_alm = report.rebalances.iter().find(|log| log.kind == RebalanceKind::Alm).unwrap();
    assert_eq!(first_alm.timestamp, start());
    // Priced from the last swap before the window, not the configured tick.
    assert_eq!(first_alm.tick, SEED_TICK);

    // The move to +2100 leaves the base range and forces a second ALM rebalance.
    assert!(report.performance.alm_rebalances >= 2);
    assert!(report.performance.dlv_rebalances >= 1);
    assert!(!report.final_state.virtual_debt.is_zero());
    assert!(report.final_state.base.is_some());
}

/// Remembers every window it was asked for.
struct RecordingSource {
    inner: Arc<dyn EventSource>,
    windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

#[async_trait]
impl EventSource for RecordingSource {
    async fn load(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<EventBatch, EventsError> {
        self.windows.lock().unwrap().push((start, end));
        self.inner.load(start, end).await
    }

    async fn last_swap_before(&self, timestamp: DateTime<Utc>) -> Result<Option<SwapEvent>, EventsError> {
        self.inner.last_swap_before(timestamp).await
    }
}

#[tokio::test]
async fn events_are_loaded_one_clock_tick_at_a_time() {
    let source = Arc::new(RecordingSource { inner: history(), windows: Mutex::new(Vec::new()) });
    let shared: Arc<dyn EventSource> = source.clone();
    let report = Backtester::from_config(Uuid::new_v4(), &config(), shared)
        .await
        .unwrap()
        .run(start(), end())
        .await
        .unwrap();
    assert_eq!(report.events_applied, PATH.len() as u64 + 2);

    let windows = source.windows.lock().unwrap().clone();
    assert_eq!(windows.len(), PATH.len());
    assert_eq!(windows[0], (start(), start() + Duration::hours(1)));
    assert!(windows.windows(2).all(|pair| pair[0].1 == pair[1].0));
    assert_eq!(windows.last().unwrap().1, end());
}

#[tokio::test]
async fn identical_inputs_give_identical_runs() {
    let source = history();
    let a = Backtester::from_config(Uuid::new_v4(), &config(), Arc::clone(&source)).await.unwrap();
    let b = Backtester::from_config(Uuid::new_v4(), &config(), source).await.unwrap();

    let a = a.run(start(), end()).await.unwrap();
    let b = b.run(start(), end()).await.unwrap();
    assert_eq!(a.rebalances, b.rebalances);
    assert_eq!(a.equity_curve, b.equity_curve);
    assert_eq!(a.performance, b.performance);
    assert_eq!(a.final_state, b.final_state);
}

#[tokio::test]
async fn cancelled_run_stops_with_error() {
    let backtester = backtester().await;
    backtester.cancel_handle().store(true, Ordering::Relaxed);
    assert!(matches!(backtester.run(start(), end()).await, Err(BacktestError::Cancelled)));
}

#[tokio::test]
async fn empty_window_is_rejected() {
    let result = backtester().await.run(end(), start()).await;
    assert!(matches!(result, Err(BacktestError::EmptyWindow { .. })));
}
