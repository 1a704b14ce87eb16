use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use core_types::{StableToken, TickSize};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Largest tick magnitude a concentrated-liquidity pool accepts.
const MAX_TICK: i32 = 887_272;

/// The root configuration structure for one backtest run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backtest: BacktestSettings,
    pub pool: PoolSettings,
    pub vault: VaultSettings,
    pub debt: DebtSettings,
    pub alm: AlmSettings,
    #[serde(default)]
    pub advisor: Option<AdvisorSettings>,
    pub data: DataSettings,
}

/// Contains parameters for a single backtest run.
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestSettings {
    /// Inclusive start of the replayed window.
    pub start_date: DateTime<Utc>,
    /// Exclusive end of the replayed window.
    pub end_date: DateTime<Utc>,
    /// Clock granularity of the replay loop.
    pub tick_size: TickSize,
    /// The operator's initial deposit of token0, raw units.
    ///
    /// `u64` is the widest integer the `config` deserializer accepts.
    pub initial_amount0: u64,
    /// The operator's initial deposit of token1, raw units.
    pub initial_amount1: u64,
    /// Share holder identity used for the operator's deposit and debt actions.
    #[serde(default = "default_operator")]
    pub operator: String,
}

/// Static parameters of the replayed pool.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSettings {
    pub tick_spacing: i32,
    /// Swap fee in pips (3000 == 0.30%).
    pub fee_pips: u32,
    /// Starting tick when no swap precedes the window in the event history.
    pub initial_tick: i32,
    /// Which token the debt and all valuations are denominated in.
    pub stable_token: StableToken,
}

/// Range geometry and fees of the vault.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultSettings {
    /// Half-width of the wide range, in ticks.
    pub wide_threshold: i32,
    /// Half-width of the base range, in ticks.
    pub base_threshold: i32,
    /// Width of the single-sided limit range, in ticks.
    pub limit_threshold: i32,
    /// Share of the deployable liquidity placed in the wide range.
    #[serde(default = "default_wide_weight")]
    pub wide_weight: Decimal,
    /// Manager cut of collected swap fees, in pips.
    #[serde(default)]
    pub manager_fee_pips: u32,
}

/// Parameters of the leveraged-debt overlay.
#[derive(Debug, Clone, Deserialize)]
pub struct DebtSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Target collateral ratio (2.0 == 200%).
    pub target_collateral_ratio: Decimal,
    /// Relative band above the target before a leverage action fires (0.1 == 10%).
    pub deviation_threshold_above: Decimal,
    /// Relative band below the target before a deleverage action fires.
    pub deviation_threshold_below: Decimal,
    /// Cap on the solver's ±1 correction loop.
    #[serde(default = "default_max_correction_steps")]
    pub max_correction_steps: u32,
    /// Also evaluate the debt trigger after every replayed event, not only per period.
    #[serde(default)]
    pub check_every_event: bool,
}

/// Cadence of the passive liquidity rebalance.
#[derive(Debug, Clone, Deserialize)]
pub struct AlmSettings {
    /// Rebalance every N clock ticks.
    pub period_ticks: u32,
    /// Also rebalance mid-period once the tick drifts this far from the base-range center.
    #[serde(default)]
    pub deviation_ticks: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorKind {
    /// External process speaking line-delimited JSON.
    Subprocess,
    /// In-process mechanical debt policy.
    Heuristic,
}

/// Where decisions for one rebalance kind come from.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorSource {
    pub kind: AdvisorKind,
    /// Program and arguments; required for `subprocess`.
    #[serde(default)]
    pub command: Vec<String>,
}

/// What a run does when an advisor request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorFailurePolicy {
    #[default]
    Abort,
    Fallback,
}

/// Optional advisor-driven decision making.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorSettings {
    #[serde(default)]
    pub debt: Option<AdvisorSource>,
    #[serde(default)]
    pub alm: Option<AdvisorSource>,
    /// Upper bound on one request/response round trip.
    #[serde(with = "humantime_serde", default = "default_advisor_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub on_error: AdvisorFailurePolicy,
}

/// Location of the historical event files.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    /// Directory holding `mints.jsonl`, `burns.jsonl` and `swaps.jsonl`.
    pub events_dir: PathBuf,
}

fn default_operator() -> String {
    "operator".to_string()
}

fn default_wide_weight() -> Decimal {
    dec!(0.1)
}

fn default_true() -> bool {
    true
}

fn default_max_correction_steps() -> u32 {
    2000
}

fn default_advisor_timeout() -> Duration {
    Duration::from_secs(5)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

impl Config {
    /// Checks every cross-field rule the typed structs cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        self.pool.validate()?;
        self.vault.validate(self.pool.tick_spacing)?;
        self.debt.validate()?;
        self.alm.validate()?;
        if let Some(advisor) = &self.advisor {
            advisor.validate()?;
        }
        Ok(())
    }
}

impl BacktestSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(invalid("backtest.start_date must be before backtest.end_date"));
        }
        if self.initial_amount0 == 0 && self.initial_amount1 == 0 {
            return Err(invalid("backtest initial deposit must not be zero in both tokens"));
        }
        if self.operator.is_empty() || self.operator == core_types::Owner::LOCKED {
            return Err(invalid("backtest.operator must be a non-reserved, non-empty name"));
        }
        Ok(())
    }
}

impl PoolSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_spacing <= 0 {
            return Err(invalid("pool.tick_spacing must be positive"));
        }
        if self.fee_pips >= 1_000_000 {
            return Err(invalid("pool.fee_pips must be below 1_000_000"));
        }
        if self.initial_tick.abs() > MAX_TICK {
            return Err(invalid(format!("pool.initial_tick {} is out of range", self.initial_tick)));
        }
        Ok(())
    }
}

impl VaultSettings {
    pub(crate) fn validate(&self, tick_spacing: i32) -> Result<(), ConfigError> {
        for (name, threshold) in [
            ("wide_threshold", self.wide_threshold),
            ("base_threshold", self.base_threshold),
            ("limit_threshold", self.limit_threshold),
        ] {
            if threshold <= 0 {
                return Err(invalid(format!("vault.{name} must be positive")));
            }
            if threshold % tick_spacing != 0 {
                return Err(invalid(format!(
                    "vault.{name} ({threshold}) must be a multiple of the tick spacing ({tick_spacing})"
                )));
            }
        }
        if self.wide_threshold == self.base_threshold {
            return Err(invalid("vault.wide_threshold and vault.base_threshold must differ"));
        }
        if self.wide_weight <= Decimal::ZERO || self.wide_weight > Decimal::ONE {
            return Err(invalid("vault.wide_weight must be in (0, 1]"));
        }
        if self.manager_fee_pips >= 1_000_000 {
            return Err(invalid("vault.manager_fee_pips must be below 1_000_000"));
        }
        Ok(())
    }
}

impl DebtSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.target_collateral_ratio <= Decimal::ONE {
            return Err(invalid("debt.target_collateral_ratio must be above 1.0"));
        }
        if self.deviation_threshold_above < Decimal::ZERO {
            return Err(invalid("debt.deviation_threshold_above must not be negative"));
        }
        if self.deviation_threshold_below < Decimal::ZERO || self.deviation_threshold_below >= Decimal::ONE {
            return Err(invalid("debt.deviation_threshold_below must be in [0, 1)"));
        }
        if self.max_correction_steps == 0 {
            return Err(invalid("debt.max_correction_steps must be positive"));
        }
        Ok(())
    }
}

impl AlmSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ticks == 0 {
            return Err(invalid("alm.period_ticks must be positive"));
        }
        if matches!(self.deviation_ticks, Some(ticks) if ticks <= 0) {
            return Err(invalid("alm.deviation_ticks must be positive when set"));
        }
        Ok(())
    }
}

impl AdvisorSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(alm) = &self.alm {
            if alm.kind == AdvisorKind::Heuristic {
                return Err(invalid("advisor.alm does not support the heuristic kind"));
            }
        }
        for (name, source) in [("debt", &self.debt), ("alm", &self.alm)] {
            if let Some(source) = source {
                if source.kind == AdvisorKind::Subprocess && source.command.is_empty() {
                    return Err(invalid(format!("advisor.{name}.command is required for a subprocess advisor")));
                }
            }
        }
        if self.timeout.is_zero() {
            return Err(invalid("advisor.timeout must be positive"));
        }
        Ok(())
    }
}
