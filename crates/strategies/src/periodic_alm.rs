use crate::error::StrategyError;
use crate::record::rebalance_log;
use crate::vars::{CLOCK_PERIOD_INDEX, StrategyVars};
use crate::Strategy;
use async_trait::async_trait;
use configuration::AlmSettings;
use core_types::{Phase, RebalanceKind, RebalanceLog, U256};
use pool_adapter::PoolAdapter;
use vault::VaultLedger;

/// Passive rebalance on a fixed schedule.
///
/// Fires at the start of a period when nothing is deployed yet or when
/// `period_ticks` periods have passed since the last rebalance, and after a
/// replayed event when the tick has drifted more than `deviation_ticks` away
/// from the center of the base range.
#[derive(Debug, Clone)]
pub struct PeriodicAlm {
    period_ticks: u64,
    deviation_ticks: Option<i32>,
    last_rebalance_period: Option<u64>,
}

impl PeriodicAlm {
    pub fn new(settings: &AlmSettings) -> Result<Self, StrategyError> {
        if settings.period_ticks == 0 {
            return Err(StrategyError::InvalidParameters("ALM period_ticks must be positive".to_string()));
        }
        if matches!(settings.deviation_ticks, Some(d) if d <= 0) {
            return Err(StrategyError::InvalidParameters("ALM deviation_ticks must be positive".to_string()));
        }
        Ok(Self {
            period_ticks: settings.period_ticks.into(),
            deviation_ticks: settings.deviation_ticks,
            last_rebalance_period: None,
        })
    }

    pub fn period_ticks(&self) -> u64 {
        self.period_ticks
    }

    pub fn last_rebalance_period(&self) -> Option<u64> {
        self.last_rebalance_period
    }

    /// Periods elapsed since the last rebalance, or `None` before the first one.
    pub fn periods_since_rebalance(&self, period: u64) -> Option<u64> {
        self.last_rebalance_period.map(|last| period.saturating_sub(last))
    }

    fn due(&self, period: u64) -> bool {
        self.periods_since_rebalance(period).is_none_or(|elapsed| elapsed >= self.period_ticks)
    }

    fn drifted(&self, tick: i32, ledger: &VaultLedger) -> bool {
        match (self.deviation_ticks, ledger.base()) {
            (Some(limit), Some(base)) => (i64::from(tick) - i64::from(base.center())).abs() > i64::from(limit),
            _ => false,
        }
    }
}

#[async_trait]
impl Strategy for PeriodicAlm {
    fn name(&self) -> &str {
        "periodic-alm"
    }

    fn kind(&self) -> RebalanceKind {
        RebalanceKind::Alm
    }

    async fn reset(&mut self) -> Result<(), StrategyError> {
        self.last_rebalance_period = None;
        Ok(())
    }

    async fn trigger(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        vars: &StrategyVars,
    ) -> Result<bool, StrategyError> {
        if ledger.total_supply().is_zero() {
            return Ok(false);
        }
        let fire = match phase {
            Phase::AfterNewTimePeriod => {
                !ledger.has_active_position(pool) || self.due(vars.uint(CLOCK_PERIOD_INDEX)?)
            }
            Phase::AfterEventApplied => self.drifted(pool.slot0().tick, ledger),
        };
        if fire {
            tracing::debug!(?phase, tick = pool.slot0().tick, "PeriodicAlm: trigger fired");
        }
        Ok(fire)
    }

    async fn act(
        &mut self,
        _phase: Phase,
        pool: &mut dyn PoolAdapter,
        ledger: &mut VaultLedger,
        vars: &mut StrategyVars,
    ) -> Result<Option<RebalanceLog>, StrategyError> {
        let pre = ledger.snapshot(pool)?;
        ledger.rebalance(pool)?;
        let post = ledger.snapshot(pool)?;
        self.last_rebalance_period = Some(vars.uint(CLOCK_PERIOD_INDEX)?);
        let log = rebalance_log(RebalanceKind::Alm, &pre, &post, U256::ZERO, vars, ledger.valuation(pool))?;
        Ok(Some(log))
    }
}
