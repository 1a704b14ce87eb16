//! # Vaultsim Backtester
//!
//! Drives one backtest: replays the pool's event history through a simulated
//! pool, advances a discrete clock and gives the debt and liquidity strategies
//! their chance to rebalance at every step.
//!
//! ## Architectural Principles
//!
//! - **Single writer:** one `Backtester` owns its pool, ledger and strategies.
//!   Concurrent runs share only the read-only `EventSource`.
//! - **Explicit replay state:** the loop is a small state machine
//!   (`ReplayState`) so period boundaries and event replay never interleave.
//! - **Fixed phase order:** in each phase the debt strategy runs before the
//!   liquidity strategy.

pub mod error;

pub use error::BacktestError;

use analytics::{AnalyticsEngine, EquityPoint, PerformanceReport, to_decimal};
use chrono::{DateTime, Duration, Utc};
use configuration::Config;
use core_types::{Owner, Phase, PoolEvent, RebalanceKind, RebalanceLog, TickSize, TokenAmounts, U256};
use events::{EventSource, stream_events_by_date};
use indicatif::{ProgressBar, ProgressStyle};
use pool_adapter::{PoolAdapter, SimulatedPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strategies::vars::{
    CLOCK_NOW, CLOCK_PERIOD_INDEX, EVENT_BLOCK, EVENT_KIND, HOLD_AMOUNT0, HOLD_AMOUNT1, POOL_SQRT_PRICE_X96,
    POOL_TICK,
};
use strategies::{Strategy, StrategyPair, StrategyVars, create_strategies};
use uuid::Uuid;
use vault::{LedgerSnapshot, VaultError, VaultLedger};

/// Replayed events between cooperative yields to the runtime.
pub const YIELD_EVERY_EVENTS: u64 = 4096;

/// Where the replay loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Nothing deposited yet.
    Idle,
    /// A clock tick starts at `now`.
    AfterNewPeriod { period: u64, now: DateTime<Utc> },
    /// Replaying the events of `period`, loaded for `[from, until)`.
    ReplayingEvents { period: u64, from: DateTime<Utc>, until: DateTime<Utc> },
    Done,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub run_id: Uuid,
    pub performance: PerformanceReport,
    pub rebalances: Vec<RebalanceLog>,
    pub equity_curve: Vec<EquityPoint>,
    pub final_state: LedgerSnapshot,
    pub periods: u64,
    pub events_applied: u64,
    pub events_skipped: u64,
}

/// The backtesting engine for one vault over one window.
pub struct Backtester {
    // --- Context ---
    run_id: Uuid,
    tick_size: TickSize,
    operator: Owner,
    initial_amounts: TokenAmounts,
    // --- Components ---
    pool: Box<dyn PoolAdapter>,
    ledger: VaultLedger,
    source: Arc<dyn EventSource>,
    strategies: StrategyPair,
    analytics_engine: AnalyticsEngine,
    vars: StrategyVars,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
}

impl Backtester {
    pub fn new(
        run_id: Uuid,
        config: &Config,
        pool: Box<dyn PoolAdapter>,
        ledger: VaultLedger,
        source: Arc<dyn EventSource>,
        strategies: StrategyPair,
        analytics_engine: AnalyticsEngine,
    ) -> Self {
        Self {
            run_id,
            tick_size: config.backtest.tick_size,
            operator: Owner::new(config.backtest.operator.clone()),
            initial_amounts: TokenAmounts::new(
                U256::from(config.backtest.initial_amount0),
                U256::from(config.backtest.initial_amount1),
            ),
            pool,
            ledger,
            source,
            strategies,
            analytics_engine,
            vars: StrategyVars::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    /// Wires a run from configuration.
    ///
    /// The simulated pool starts at `pool.initial_tick` and, when the source
    /// knows a swap before `backtest.start_date`, is re-priced from it.
    pub async fn from_config(
        run_id: Uuid,
        config: &Config,
        source: Arc<dyn EventSource>,
    ) -> Result<Self, BacktestError> {
        let mut pool = SimulatedPool::from_settings(&config.pool)?;
        if let Some(swap) = source.last_swap_before(config.backtest.start_date).await? {
            pool.seed_from_swap(&swap)?;
            tracing::debug!(tick = swap.tick, block = swap.block_number, "Pool seeded from last swap before window");
        }
        let ledger =
            VaultLedger::from_settings(&config.vault, &config.debt, config.pool.tick_spacing, config.pool.stable_token)?;
        let strategies = create_strategies(config)?;
        Ok(Self::new(run_id, config, Box::new(pool), ledger, source, strategies, AnalyticsEngine::new()))
    }

    /// Setting the returned flag stops the run at the next period boundary or
    /// yield point with `BacktestError::Cancelled`.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn ledger(&self) -> &VaultLedger {
        &self.ledger
    }

    /// Replays `[start, end)` and evaluates the result against holding the
    /// initial deposit.
    ///
    /// A run consumes the backtester: the operator's deposit happens once, at
    /// the first step of the loop.
    pub async fn run(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<BacktestReport, BacktestError> {
        if start >= end {
            return Err(BacktestError::EmptyWindow { start: start.to_rfc3339(), end: end.to_rfc3339() });
        }
        let step = self.tick_size.duration();
        let total_periods = period_count(start, end, step);
        let progress_bar = self.progress_bar(total_periods)?;

        tracing::info!(
            run_id = %self.run_id,
            %start,
            %end,
            tick_size = ?self.tick_size,
            periods = total_periods,
            "Backtest started"
        );

        let mut equity_curve = Vec::with_capacity(total_periods as usize + 1);
        let mut rebalances = Vec::new();
        let (mut replayed, mut applied, mut skipped, mut periods) = (0u64, 0u64, 0u64, 0u64);
        let mut state = ReplayState::Idle;

        loop {
            state = match state {
                ReplayState::Idle => {
                    self.initialize().await?;
                    ReplayState::AfterNewPeriod { period: 0, now: start }
                }
                ReplayState::AfterNewPeriod { period, now } => {
                    if now >= end {
                        ReplayState::Done
                    } else {
                        self.check_cancelled()?;
                        self.publish_clock(now, period);
                        equity_curve.push(self.equity_point(now)?);
                        self.run_phase(Phase::AfterNewTimePeriod, &mut rebalances).await?;
                        ReplayState::ReplayingEvents { period, from: now, until: (now + step).min(end) }
                    }
                }
                ReplayState::ReplayingEvents { period, from, until } => {
                    let events = stream_events_by_date(self.source.as_ref(), from, until).await?;
                    for event in events {
                        replayed += 1;
                        if replayed % YIELD_EVERY_EVENTS == 0 {
                            tokio::task::yield_now().await;
                            self.check_cancelled()?;
                        }
                        if let Err(e) = self.pool.apply_event(&event) {
                            skipped += 1;
                            let key = event.key();
                            tracing::warn!(
                                kind = %event.kind(),
                                block = key.block_number,
                                log_index = key.log_index,
                                error = %e,
                                "Skipping event the simulated pool rejected"
                            );
                            continue;
                        }
                        applied += 1;
                        self.publish_event(&event);
                        self.run_phase(Phase::AfterEventApplied, &mut rebalances).await?;
                    }
                    progress_bar.inc(1);
                    periods = period + 1;
                    ReplayState::AfterNewPeriod { period: period + 1, now: until }
                }
                ReplayState::Done => break,
            };
        }

        progress_bar.finish_with_message("Replay complete. Analyzing results...");

        equity_curve.push(self.equity_point(end)?);
        let performance = self.analytics_engine.calculate(&equity_curve, &rebalances)?;
        let final_state = self.ledger.snapshot(&*self.pool)?;

        tracing::info!(
            run_id = %self.run_id,
            periods,
            events_applied = applied,
            events_skipped = skipped,
            alm_rebalances = performance.alm_rebalances,
            dlv_rebalances = performance.dlv_rebalances,
            vault_apy_pct = %performance.vault_apy_pct,
            hold_apy_pct = %performance.hold_apy_pct,
            "Backtest finished"
        );

        Ok(BacktestReport {
            run_id: self.run_id,
            performance,
            rebalances,
            equity_curve,
            final_state,
            periods,
            events_applied: applied,
            events_skipped: skipped,
        })
    }

    /// Deposits the operator's initial amounts and resets both strategies.
    async fn initialize(&mut self) -> Result<(), BacktestError> {
        let receipt = self.ledger.deposit(
            &mut *self.pool,
            &self.operator,
            self.initial_amounts.amount0,
            self.initial_amounts.amount1,
            U256::ZERO,
            U256::ZERO,
        )?;
        // The hold benchmark is what the operator actually handed over.
        self.initial_amounts = receipt.amounts;
        self.vars.set(HOLD_AMOUNT0, receipt.amounts.amount0);
        self.vars.set(HOLD_AMOUNT1, receipt.amounts.amount1);

        self.strategies.dlv.reset().await?;
        self.strategies.alm.reset().await?;
        tracing::info!(
            operator = %self.operator.as_str(),
            shares = %receipt.shares,
            amount0 = %receipt.amounts.amount0,
            amount1 = %receipt.amounts.amount1,
            "Initial deposit"
        );
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), BacktestError> {
        if self.cancel.load(Ordering::Relaxed) {
            tracing::warn!(run_id = %self.run_id, "Backtest cancelled");
            return Err(BacktestError::Cancelled);
        }
        Ok(())
    }

    fn publish_pool(&mut self) {
        let slot0 = self.pool.slot0();
        self.vars.set(POOL_TICK, slot0.tick);
        self.vars.set(POOL_SQRT_PRICE_X96, slot0.sqrt_price_x96);
    }

    fn publish_clock(&mut self, now: DateTime<Utc>, period: u64) {
        self.vars.set(CLOCK_NOW, now);
        self.vars.set(CLOCK_PERIOD_INDEX, period);
        self.vars.remove(EVENT_KIND);
        self.vars.remove(EVENT_BLOCK);
        self.publish_pool();
    }

    fn publish_event(&mut self, event: &PoolEvent) {
        self.vars.set(CLOCK_NOW, event.timestamp());
        self.vars.set(EVENT_KIND, event.kind().to_string());
        self.vars.set(EVENT_BLOCK, event.key().block_number);
        self.publish_pool();
    }

    /// Vault equity (value net of debt) and the hold benchmark at the current price.
    fn equity_point(&self, timestamp: DateTime<Utc>) -> Result<EquityPoint, BacktestError> {
        let pool = &*self.pool;
        let equity = self.ledger.total_value(pool)?.saturating_sub(self.ledger.virtual_debt());
        let hold = self
            .ledger
            .valuation(pool)
            .value(self.initial_amounts)
            .and_then(|v| v.total())
            .map_err(VaultError::from)?;
        Ok(EquityPoint { timestamp, vault_equity: to_decimal(equity)?, hold_value: to_decimal(hold)? })
    }

    /// Runs `cache`, `trigger` and `act` for both strategies, debt first.
    async fn run_phase(&mut self, phase: Phase, logs: &mut Vec<RebalanceLog>) -> Result<(), BacktestError> {
        let Self { strategies, pool, ledger, vars, .. } = self;
        for kind in RebalanceKind::ORDER {
            let strategy: &mut dyn Strategy = match kind {
                RebalanceKind::Dlv => strategies.dlv.as_mut(),
                RebalanceKind::Alm => strategies.alm.as_mut(),
            };
            strategy.cache(phase, &**pool, ledger, vars).await?;
            if !strategy.trigger(phase, &**pool, ledger, vars).await? {
                continue;
            }
            if let Some(log) = strategy.act(phase, &mut **pool, ledger, vars).await? {
                tracing::info!(
                    kind = %log.kind,
                    strategy = strategy.name(),
                    ?phase,
                    tick = log.tick,
                    post_value = %log.post_value,
                    post_collateral_ratio = %log.post_collateral_ratio,
                    "Rebalance executed"
                );
                logs.push(log);
            }
        }
        Ok(())
    }

    fn progress_bar(&self, len: u64) -> Result<ProgressBar, BacktestError> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let progress_bar = ProgressBar::new(len);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );
        Ok(progress_bar)
    }
}

/// Clock ticks in `[start, end)`; a trailing partial tick counts as one.
fn period_count(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> u64 {
    let span = (end - start).num_seconds().max(0) as u64;
    let step = step.num_seconds().max(1) as u64;
    span.div_ceil(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn partial_last_tick_counts() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(period_count(start, start + Duration::hours(24), Duration::hours(1)), 24);
        assert_eq!(period_count(start, start + Duration::minutes(90), Duration::hours(1)), 2);
        assert_eq!(period_count(start, start, Duration::hours(1)), 0);
    }
}
