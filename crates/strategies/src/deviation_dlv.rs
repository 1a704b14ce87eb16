use crate::error::StrategyError;
use crate::record::rebalance_log;
use crate::vars::StrategyVars;
use crate::Strategy;
use async_trait::async_trait;
use configuration::DebtSettings;
use core_types::{Owner, Phase, RebalanceKind, RebalanceLog, U256};
use debt::{DebtMode, SolverParams};
use fixed_point::{PIPS_DENOMINATOR, add, pips_of, sub};
use pool_adapter::PoolAdapter;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use vault::VaultLedger;

/// Debt rebalance whenever the collateral ratio leaves the band
/// `[T * (1 - below), T * (1 + above)]`.
///
/// A vault with value but no debt has an infinite ratio and therefore sits
/// above the band: the first period of a run levers up.
#[derive(Debug, Clone)]
pub struct DeviationDlv {
    enabled: bool,
    check_every_event: bool,
    operator: Owner,
    target: U256,
    lower: U256,
    upper: U256,
}

fn fraction_pips(name: &str, fraction: Decimal) -> Result<u32, StrategyError> {
    (fraction * Decimal::from(PIPS_DENOMINATOR))
        .trunc()
        .to_u32()
        .ok_or_else(|| StrategyError::InvalidParameters(format!("{name} {fraction} is not a valid fraction")))
}

impl DeviationDlv {
    pub fn new(settings: &DebtSettings, operator: Owner) -> Result<Self, StrategyError> {
        let above = fraction_pips("deviation_threshold_above", settings.deviation_threshold_above)?;
        let below = fraction_pips("deviation_threshold_below", settings.deviation_threshold_below)?;
        if below >= PIPS_DENOMINATOR {
            return Err(StrategyError::InvalidParameters(
                "deviation_threshold_below must be less than 1".to_string(),
            ));
        }
        let target = SolverParams::from_settings(settings)
            .map_err(|e| StrategyError::InvalidParameters(e.to_string()))?
            .target_ratio;

        Ok(Self {
            enabled: settings.enabled,
            check_every_event: settings.check_every_event,
            operator,
            target,
            lower: sub(target, pips_of(target, below)?)?,
            upper: add(target, pips_of(target, above)?)?,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn target(&self) -> U256 {
        self.target
    }

    /// Inclusive collateral-ratio band, WAD.
    pub fn band(&self) -> (U256, U256) {
        (self.lower, self.upper)
    }

    pub fn out_of_band(&self, collateral_ratio: U256) -> bool {
        collateral_ratio < self.lower || collateral_ratio > self.upper
    }
}

#[async_trait]
impl Strategy for DeviationDlv {
    fn name(&self) -> &str {
        "deviation-dlv"
    }

    fn kind(&self) -> RebalanceKind {
        RebalanceKind::Dlv
    }

    async fn trigger(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        _vars: &StrategyVars,
    ) -> Result<bool, StrategyError> {
        if !self.enabled || (phase == Phase::AfterEventApplied && !self.check_every_event) {
            return Ok(false);
        }
        let value = ledger.value(pool)?;
        if value.total()?.is_zero() {
            return Ok(false);
        }
        let cr = value.collateral_ratio(ledger.virtual_debt())?;
        let fire = self.out_of_band(cr);
        if fire {
            tracing::debug!(?phase, collateral_ratio = %cr, lower = %self.lower, upper = %self.upper, "DeviationDlv: ratio out of band");
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
        let outcome = ledger.rebalance_debt(pool, &self.operator)?;
        if outcome.plan.mode == DebtMode::Noop {
            return Ok(None);
        }
        let post = ledger.snapshot(pool)?;
        let log = rebalance_log(
            RebalanceKind::Dlv,
            &pre,
            &post,
            outcome.report.swap_fee_value,
            vars,
            ledger.valuation(pool),
        )?;
        Ok(Some(log))
    }
}
