//! Strategies that ask an `Advisor` once per period.
//!
//! Both wrap the mechanical strategy of their kind: `act` is shared, and when the
//! advisor fails under `AdvisorFailurePolicy::Fallback` the mechanical trigger
//! takes over for the rest of the run.

use crate::deviation_dlv::DeviationDlv;
use crate::error::StrategyError;
use crate::features::{AlmFeatures, DebtFeatures, share_of, wad_to_f64};
use crate::periodic_alm::PeriodicAlm;
use crate::vars::{CLOCK_PERIOD_INDEX, StrategyVars};
use crate::Strategy;
use advisor::heuristic::{ACTION_DECREASE, ACTION_HOLD, ACTION_INCREASE};
use advisor::{Advisor, AdvisorError};
use async_trait::async_trait;
use configuration::AdvisorFailurePolicy;
use core_types::{Phase, RebalanceKind, RebalanceLog};
use pool_adapter::PoolAdapter;
use vault::VaultLedger;

const ALM_ACTION_HOLD: i64 = 0;
const ALM_ACTION_REBALANCE: i64 = 1;

/// Shared failure handling: abort the run or switch to the fallback for good.
struct AdvisorSlot {
    advisor: Box<dyn Advisor>,
    on_error: AdvisorFailurePolicy,
    failed: bool,
}

impl AdvisorSlot {
    async fn infer(&mut self, obs: &[f64]) -> Result<Option<i64>, StrategyError> {
        match self.advisor.infer(obs).await {
            Ok(action) => Ok(Some(action)),
            Err(e) => self.fail(e).map(|()| None),
        }
    }

    fn fail(&mut self, error: AdvisorError) -> Result<(), StrategyError> {
        match self.on_error {
            AdvisorFailurePolicy::Abort => {
                Err(StrategyError::Advisor { advisor: self.advisor.name().to_string(), source: error })
            }
            AdvisorFailurePolicy::Fallback => {
                tracing::warn!(
                    advisor = self.advisor.name(),
                    error = %error,
                    "Advisor failed, falling back to the mechanical strategy"
                );
                self.failed = true;
                Ok(())
            }
        }
    }

    async fn reset(&mut self) -> Result<(), StrategyError> {
        self.failed = false;
        if let Err(e) = self.advisor.reset().await {
            self.fail(e)?;
        }
        Ok(())
    }
}

/// Debt overlay driven by an advisor's leverage decision.
///
/// Actions: 1 hold, 2 increase leverage, 3 decrease leverage. An increase only
/// fires while the collateral ratio is above target and a decrease only while it
/// is below; the executed trade always aims at the target.
pub struct AdvisedDlv {
    slot: AdvisorSlot,
    fallback: DeviationDlv,
    features: DebtFeatures,
    observation: Option<[f64; crate::features::DEBT_OBS_DIM]>,
}

impl AdvisedDlv {
    pub fn new(
        advisor: Box<dyn Advisor>,
        fallback: DeviationDlv,
        on_error: AdvisorFailurePolicy,
        calm_ticks: i32,
    ) -> Result<Self, StrategyError> {
        let features = DebtFeatures::new(wad_to_f64(fallback.target()), calm_ticks)?;
        Ok(Self {
            slot: AdvisorSlot { advisor, on_error, failed: false },
            fallback,
            features,
            observation: None,
        })
    }

    /// Whether the advisor has been given up on for this run.
    pub fn is_degraded(&self) -> bool {
        self.slot.failed
    }
}

#[async_trait]
impl Strategy for AdvisedDlv {
    fn name(&self) -> &str {
        "advised-dlv"
    }

    fn kind(&self) -> RebalanceKind {
        RebalanceKind::Dlv
    }

    async fn reset(&mut self) -> Result<(), StrategyError> {
        self.observation = None;
        self.slot.reset().await
    }

    async fn cache(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        vars: &mut StrategyVars,
    ) -> Result<(), StrategyError> {
        if phase == Phase::AfterNewTimePeriod {
            let cr = wad_to_f64(ledger.collateral_ratio(pool)?);
            self.observation = Some(self.features.update(cr, vars.tick()?));
        }
        Ok(())
    }

    async fn trigger(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        vars: &StrategyVars,
    ) -> Result<bool, StrategyError> {
        if !self.fallback.enabled() {
            return Ok(false);
        }
        if self.slot.failed {
            return self.fallback.trigger(phase, pool, ledger, vars).await;
        }
        if phase != Phase::AfterNewTimePeriod || ledger.total_value(pool)?.is_zero() {
            return Ok(false);
        }
        let Some(obs) = self.observation.take() else {
            return Ok(false);
        };

        let Some(action) = self.slot.infer(&obs).await? else {
            return self.fallback.trigger(phase, pool, ledger, vars).await;
        };
        let cr = ledger.collateral_ratio(pool)?;
        let target = self.fallback.target();
        let fire = match action {
            ACTION_HOLD => false,
            ACTION_INCREASE => cr > target,
            ACTION_DECREASE => cr < target,
            other => {
                self.slot.fail(AdvisorError::UnexpectedResponse(format!("debt action {other}")))?;
                return self.fallback.trigger(phase, pool, ledger, vars).await;
            }
        };
        tracing::debug!(action, collateral_ratio = %cr, fire, "AdvisedDlv: advisor decision");
        Ok(fire)
    }

    async fn act(
        &mut self,
        phase: Phase,
        pool: &mut dyn PoolAdapter,
        ledger: &mut VaultLedger,
        vars: &mut StrategyVars,
    ) -> Result<Option<RebalanceLog>, StrategyError> {
        self.fallback.act(phase, pool, ledger, vars).await
    }
}

/// Passive rebalance driven by an advisor. Actions: 0 hold, 1 rebalance.
///
/// A vault with nothing deployed rebalances without asking.
pub struct AdvisedAlm {
    slot: AdvisorSlot,
    fallback: PeriodicAlm,
    features: AlmFeatures,
    observation: Option<[f64; crate::features::ALM_OBS_DIM]>,
}

impl AdvisedAlm {
    pub fn new(
        advisor: Box<dyn Advisor>,
        fallback: PeriodicAlm,
        on_error: AdvisorFailurePolicy,
        base_threshold: i32,
    ) -> Result<Self, StrategyError> {
        let features = AlmFeatures::new(base_threshold, fallback.period_ticks())?;
        Ok(Self {
            slot: AdvisorSlot { advisor, on_error, failed: false },
            fallback,
            features,
            observation: None,
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.slot.failed
    }
}

#[async_trait]
impl Strategy for AdvisedAlm {
    fn name(&self) -> &str {
        "advised-alm"
    }

    fn kind(&self) -> RebalanceKind {
        RebalanceKind::Alm
    }

    async fn reset(&mut self) -> Result<(), StrategyError> {
        self.observation = None;
        self.fallback.reset().await?;
        self.slot.reset().await
    }

    async fn cache(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        vars: &mut StrategyVars,
    ) -> Result<(), StrategyError> {
        if phase == Phase::AfterNewTimePeriod {
            let value = ledger.value(pool)?;
            let stable_share = share_of(value.stable_value, value.total()?)?;
            let since = self.fallback.periods_since_rebalance(vars.uint(CLOCK_PERIOD_INDEX)?);
            self.observation = Some(self.features.update(vars.tick()?, ledger.base(), stable_share, since));
        }
        Ok(())
    }

    async fn trigger(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        vars: &StrategyVars,
    ) -> Result<bool, StrategyError> {
        if self.slot.failed {
            return self.fallback.trigger(phase, pool, ledger, vars).await;
        }
        if phase != Phase::AfterNewTimePeriod || ledger.total_supply().is_zero() {
            return Ok(false);
        }
        if !ledger.has_active_position(pool) {
            return Ok(true);
        }
        let Some(obs) = self.observation.take() else {
            return Ok(false);
        };

        let Some(action) = self.slot.infer(&obs).await? else {
            return self.fallback.trigger(phase, pool, ledger, vars).await;
        };
        match action {
            ALM_ACTION_HOLD => Ok(false),
            ALM_ACTION_REBALANCE => Ok(true),
            other => {
                self.slot.fail(AdvisorError::UnexpectedResponse(format!("ALM action {other}")))?;
                self.fallback.trigger(phase, pool, ledger, vars).await
            }
        }
    }

    async fn act(
        &mut self,
        phase: Phase,
        pool: &mut dyn PoolAdapter,
        ledger: &mut VaultLedger,
        vars: &mut StrategyVars,
    ) -> Result<Option<RebalanceLog>, StrategyError> {
        self.fallback.act(phase, pool, ledger, vars).await
    }
}
