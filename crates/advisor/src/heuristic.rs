//! Mechanical debt policy over the 10-feature debt observation.

use crate::error::AdvisorError;
use crate::Advisor;
use async_trait::async_trait;

/// Number of features in a debt observation.
pub const OBS_DIM: usize = 10;

pub const ACTION_HOLD: i64 = 1;
pub const ACTION_INCREASE: i64 = 2;
pub const ACTION_DECREASE: i64 = 3;

const LEVERAGE_BOTTOM: f64 = 1.8;
const LEVERAGE_TOP: f64 = 2.2;
const LEVERAGE_RANGE: f64 = LEVERAGE_TOP - LEVERAGE_BOTTOM;

/// Debt observation, in the order it travels on the wire. All features are
/// normalised to `[0, 1]`; slopes are centred on 0.5.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DebtObservation {
    leverage: f64,
    collateral: f64,
    leverage_mean: f64,
    leverage_slope: f64,
    vol_ratio: f64,
    vol_mean: f64,
    vol_slope: f64,
    calm: f64,
    calm_mean: f64,
    calm_slope: f64,
}

impl DebtObservation {
    fn from_slice(obs: &[f64]) -> Result<Self, AdvisorError> {
        let &[leverage, collateral, leverage_mean, leverage_slope, vol_ratio, vol_mean, vol_slope, calm, calm_mean, calm_slope] =
            obs
        else {
            return Err(AdvisorError::InvalidObservation { expected: OBS_DIM, got: obs.len() });
        };
        Ok(Self {
            leverage: clamp01(leverage),
            collateral: clamp01(collateral),
            leverage_mean: clamp01(leverage_mean),
            leverage_slope: zero_center(leverage_slope),
            vol_ratio: clamp01(vol_ratio),
            vol_mean: clamp01(vol_mean),
            vol_slope: zero_center(vol_slope),
            calm: clamp01(calm),
            calm_mean: clamp01(calm_mean),
            calm_slope: zero_center(calm_slope),
        })
    }
}

fn clamp01(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

/// Maps a `[0, 1]` slope back to roughly `[-1, 1]`.
fn zero_center(value: f64) -> f64 {
    if value.is_finite() { ((value - 0.5) * 2.0).clamp(-1.0, 1.0) } else { 0.0 }
}

/// Keeps leverage inside the 1.8x–2.2x band, leaning on collateral, volatility
/// and calm-market signals. Ambiguous states repeat the last action.
#[derive(Debug, Clone)]
pub struct HeuristicDebtAdvisor {
    last_action: i64,
}

impl Default for HeuristicDebtAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicDebtAdvisor {
    pub fn new() -> Self {
        Self { last_action: ACTION_HOLD }
    }

    pub fn decide(&mut self, obs: &[f64]) -> Result<i64, AdvisorError> {
        let o = DebtObservation::from_slice(obs)?;

        let increase_pressure = (0.35 - o.leverage) * 2.0 + (o.collateral - 0.55) * 1.5 + (o.calm - o.calm_mean) * 0.8
            - o.vol_slope.abs() * 0.6
            - o.calm_slope.abs() * 0.4;
        let decrease_pressure = (o.leverage - 0.65) * 2.0
            + (0.45 - o.collateral) * 1.7
            + (o.vol_ratio - o.vol_mean) * 0.9
            + o.leverage_slope.max(0.0) * 0.8
            + o.vol_slope.max(0.0) * 0.6;

        let leverage_gap = (o.leverage_mean - o.leverage).abs();
        let calm_delta = (o.calm - o.calm_mean).abs();
        let leverage_actual = LEVERAGE_BOTTOM + o.leverage * LEVERAGE_RANGE;

        let action = if o.collateral > 0.65 && o.vol_ratio < 0.9 {
            ACTION_INCREASE
        } else if o.collateral < 0.48 || o.vol_ratio > 0.95 {
            ACTION_DECREASE
        } else if o.leverage_slope > 0.12 || o.vol_slope > 0.12 {
            ACTION_DECREASE
        } else if o.leverage_slope < -0.12 || o.vol_slope < -0.12 {
            ACTION_INCREASE
        } else if leverage_gap < 0.02 && calm_delta < 0.03 && (o.vol_ratio - o.vol_mean).abs() < 0.03 {
            ACTION_HOLD
        } else if leverage_actual < LEVERAGE_BOTTOM + 0.1 && o.collateral >= 0.52 {
            ACTION_INCREASE
        } else if leverage_actual > LEVERAGE_TOP - 0.1 || o.collateral <= 0.42 {
            ACTION_DECREASE
        } else if increase_pressure > 0.4 && decrease_pressure < 0.2 {
            ACTION_INCREASE
        } else if decrease_pressure > 0.3 && increase_pressure < 0.25 {
            ACTION_DECREASE
        } else if o.leverage_slope.abs() < 0.05 && o.vol_slope.abs() < 0.05 {
            self.last_action
        } else {
            ACTION_HOLD
        };

        self.last_action = action;
        Ok(action)
    }
}

#[async_trait]
impl Advisor for HeuristicDebtAdvisor {
    fn name(&self) -> &str {
        "heuristic-debt"
    }

    fn observation_dim(&self) -> usize {
        OBS_DIM
    }

    async fn infer(&mut self, obs: &[f64]) -> Result<i64, AdvisorError> {
        self.decide(obs)
    }

    async fn reset(&mut self) -> Result<(), AdvisorError> {
        self.last_action = ACTION_HOLD;
        Ok(())
    }
}
