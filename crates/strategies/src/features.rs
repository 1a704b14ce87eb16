//! Observation vectors for the advisor-driven strategies.
//!
//! Every feature is normalised to `[0, 1]`. Slopes compare the latest value with
//! its rolling mean and are centred on 0.5.

use crate::error::StrategyError;
use core_types::{TickRange, U256};
use fixed_point::{INFINITE_RATIO, WAD, mul_div, to_u128};
use ta::Next;
use ta::indicators::{SimpleMovingAverage as Sma, StandardDeviation as Sd};

/// Features in one debt observation.
pub const DEBT_OBS_DIM: usize = 10;
/// Features in one ALM observation.
pub const ALM_OBS_DIM: usize = 4;

const LEVERAGE_BOTTOM: f64 = 1.8;
const LEVERAGE_TOP: f64 = 2.2;

const SHORT_WINDOW: usize = 6;
const MEAN_WINDOW: usize = 12;
const LONG_WINDOW: usize = 24;

fn indicator<T>(built: Result<T, ta::errors::TaError>) -> Result<T, StrategyError> {
    built.map_err(|e| StrategyError::IndicatorError(format!("{e:?}")))
}

fn clamp01(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

fn slope(latest: f64, mean: f64) -> f64 {
    clamp01(0.5 + (latest - mean) / 2.0)
}

/// A WAD ratio as `f64`; the infinite sentinel maps to `f64::INFINITY`.
pub fn wad_to_f64(ratio: U256) -> f64 {
    if ratio == INFINITE_RATIO {
        return f64::INFINITY;
    }
    let whole = to_u128(ratio / WAD).map(|w| w as f64).unwrap_or(f64::MAX);
    let frac = to_u128(ratio % WAD).map(|f| f as f64 / 1e18).unwrap_or(0.0);
    whole + frac
}

/// `part / total` as `f64`, zero when `total` is zero.
pub fn share_of(part: U256, total: U256) -> Result<f64, StrategyError> {
    if total.is_zero() {
        return Ok(0.0);
    }
    let ppm = to_u128(mul_div(part, U256::from(1_000_000u32), total)?)?;
    Ok(ppm as f64 / 1e6)
}

/// Leverage `cr / (cr - 1)` mapped onto the 1.8x–2.2x band.
fn leverage_feature(cr: f64) -> f64 {
    if cr <= 1.0 {
        return 1.0;
    }
    clamp01((cr / (cr - 1.0) - LEVERAGE_BOTTOM) / (LEVERAGE_TOP - LEVERAGE_BOTTOM))
}

/// Collateral ratio mapped from `[0.75 T, 1.25 T]`.
fn collateral_feature(cr: f64, target: f64) -> f64 {
    if cr.is_infinite() {
        return 1.0;
    }
    clamp01((cr - 0.75 * target) / (0.5 * target))
}

/// Rolling state behind the 10-feature debt observation:
/// leverage, collateral, leverage mean and slope, volatility ratio, its mean and
/// slope, calm share, its mean and slope.
pub struct DebtFeatures {
    target: f64,
    calm_ticks: i64,
    last_tick: Option<i32>,
    leverage_mean: Sma,
    short_vol: Sd,
    long_vol: Sd,
    vol_mean: Sma,
    calm: Sma,
    calm_mean: Sma,
}

impl DebtFeatures {
    /// `target` is the target collateral ratio; a period whose tick moved by at
    /// most `calm_ticks` counts as calm.
    pub fn new(target: f64, calm_ticks: i32) -> Result<Self, StrategyError> {
        if !(target.is_finite() && target > 1.0) {
            return Err(StrategyError::InvalidParameters(format!("target ratio {target} must exceed 1")));
        }
        Ok(Self {
            target,
            calm_ticks: i64::from(calm_ticks.max(0)),
            last_tick: None,
            leverage_mean: indicator(Sma::new(MEAN_WINDOW))?,
            short_vol: indicator(Sd::new(SHORT_WINDOW))?,
            long_vol: indicator(Sd::new(LONG_WINDOW))?,
            vol_mean: indicator(Sma::new(MEAN_WINDOW))?,
            calm: indicator(Sma::new(SHORT_WINDOW))?,
            calm_mean: indicator(Sma::new(LONG_WINDOW))?,
        })
    }

    /// Folds in one period and returns the observation for it.
    pub fn update(&mut self, collateral_ratio: f64, tick: i32) -> [f64; DEBT_OBS_DIM] {
        let delta = self.last_tick.map_or(0, |last| i64::from(tick) - i64::from(last));
        self.last_tick = Some(tick);

        let leverage = leverage_feature(collateral_ratio);
        let leverage_mean = self.leverage_mean.next(leverage);

        let short = self.short_vol.next(delta as f64);
        let long = self.long_vol.next(delta as f64);
        let vol_ratio = if short + long > 0.0 { short / (short + long) } else { 0.5 };
        let vol_mean = self.vol_mean.next(vol_ratio);

        let calm = self.calm.next(if delta.abs() <= self.calm_ticks { 1.0 } else { 0.0 });
        let calm_mean = self.calm_mean.next(calm);

        [
            leverage,
            collateral_feature(collateral_ratio, self.target),
            clamp01(leverage_mean),
            slope(leverage, leverage_mean),
            clamp01(vol_ratio),
            clamp01(vol_mean),
            slope(vol_ratio, vol_mean),
            clamp01(calm),
            clamp01(calm_mean),
            slope(calm, calm_mean),
        ]
    }
}

/// Rolling state behind the 4-feature ALM observation: tick position relative
/// to the base range, recent volatility, stable share of value and the age of
/// the current ranges.
pub struct AlmFeatures {
    base_threshold: f64,
    period_ticks: f64,
    last_tick: Option<i32>,
    vol: Sd,
}

impl AlmFeatures {
    pub fn new(base_threshold: i32, period_ticks: u64) -> Result<Self, StrategyError> {
        if base_threshold <= 0 || period_ticks == 0 {
            return Err(StrategyError::InvalidParameters(
                "ALM features need a positive base threshold and period".to_string(),
            ));
        }
        Ok(Self {
            base_threshold: f64::from(base_threshold),
            period_ticks: period_ticks as f64,
            last_tick: None,
            vol: indicator(Sd::new(SHORT_WINDOW))?,
        })
    }

    pub fn update(
        &mut self,
        tick: i32,
        base: Option<TickRange>,
        stable_share: f64,
        periods_since_rebalance: Option<u64>,
    ) -> [f64; ALM_OBS_DIM] {
        let delta = self.last_tick.map_or(0, |last| i64::from(tick) - i64::from(last));
        self.last_tick = Some(tick);
        let vol = self.vol.next(delta as f64);

        let position = match base {
            Some(range) => clamp01(0.5 + f64::from(tick - range.center()) / (2.0 * self.base_threshold)),
            None => 0.5,
        };
        let age = periods_since_rebalance.map_or(1.0, |p| clamp01(p as f64 / self.period_ticks));

        [position, clamp01(vol / self.base_threshold), clamp01(stable_share), age]
    }
}
