use crate::error::AnalyticsError;
use crate::report::PerformanceReport;
use chrono::{DateTime, Utc};
use core_types::{RebalanceKind, RebalanceLog, U256};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// One sample of the run, taken at the start of every clock tick and at the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Vault value minus virtual debt, stable units.
    pub vault_equity: Decimal,
    /// The initial deposit valued at this sample's price, stable units.
    pub hold_value: Decimal,
}

/// Converts a raw `U256` to `Decimal`.
pub fn to_decimal(value: U256) -> Result<Decimal, AnalyticsError> {
    Decimal::from_str(&value.to_string()).map_err(|_| AnalyticsError::Overflow(value.to_string()))
}

fn ratio(numerator: Decimal, denominator: Decimal, metric: &str) -> Result<Decimal, AnalyticsError> {
    if denominator.is_zero() {
        return Err(AnalyticsError::DivisionByZero(metric.to_string()));
    }
    numerator
        .checked_div(denominator)
        .ok_or_else(|| AnalyticsError::Calculation(format!("{metric} overflowed")))
}

fn percent(value: Decimal) -> Decimal {
    (value * Decimal::ONE_HUNDRED).round_dp(6)
}

/// A stateless calculator for deriving performance metrics from a run.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Arguments
    ///
    /// * `equity_curve` - Vault equity and hold value over time, oldest first.
    /// * `logs` - Every rebalance the run executed.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `PerformanceReport` or an `AnalyticsError`.
    pub fn calculate(
        &self,
        equity_curve: &[EquityPoint],
        logs: &[RebalanceLog],
    ) -> Result<PerformanceReport, AnalyticsError> {
        let (first, last) = match equity_curve {
            [first, .., last] => (first, last),
            _ => {
                return Err(AnalyticsError::NotEnoughData(format!(
                    "{} equity samples, need at least 2",
                    equity_curve.len()
                )));
            }
        };

        let mut report = PerformanceReport::new(first.timestamp, last.timestamp);
        self.calculate_returns(first, last, &mut report)?;
        self.calculate_drawdown(equity_curve, &mut report)?;
        self.calculate_sharpe(equity_curve, &mut report)?;
        self.calculate_rebalance_stats(logs, &mut report)?;

        tracing::debug!(
            vault_apy = %report.vault_apy_pct,
            hold_apy = %report.hold_apy_pct,
            max_drawdown_pct = %report.max_drawdown_pct,
            "Performance calculated"
        );
        Ok(report)
    }

    /// Total returns and compounded annual yields of vault and hold.
    fn calculate_returns(
        &self,
        first: &EquityPoint,
        last: &EquityPoint,
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let years = (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_YEAR;
        if years <= 0.0 {
            return Err(AnalyticsError::NotEnoughData("equity curve spans no time".to_string()));
        }

        report.initial_value = first.vault_equity;
        report.final_vault_value = last.vault_equity;
        report.final_hold_value = last.hold_value;

        let vault_growth = ratio(last.vault_equity, first.vault_equity, "vault_return_pct")?;
        let hold_growth = ratio(last.hold_value, first.hold_value, "hold_return_pct")?;
        report.vault_return_pct = percent(vault_growth - Decimal::ONE);
        report.hold_return_pct = percent(hold_growth - Decimal::ONE);
        report.vault_apy_pct = annualize(vault_growth, years);
        report.hold_apy_pct = annualize(hold_growth, years);
        report.apy_diff_pct = report.vault_apy_pct.saturating_sub(report.hold_apy_pct);

        let relative = ratio(last.vault_equity - last.hold_value, last.hold_value, "realized_il_bps")?;
        report.realized_il_bps = (relative * Decimal::from(10_000)).round().to_i64().unwrap_or(i64::MIN);
        Ok(())
    }

    /// Calculates maximum drawdown of the vault equity.
    fn calculate_drawdown(
        &self,
        equity_curve: &[EquityPoint],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let mut peak = equity_curve[0].vault_equity;
        let mut peak_at_max = peak;
        let mut max_drawdown = Decimal::ZERO;

        for point in equity_curve {
            if point.vault_equity > peak {
                peak = point.vault_equity;
            }
            let drawdown = peak - point.vault_equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                peak_at_max = peak;
            }
        }

        report.max_drawdown = max_drawdown;
        if peak_at_max > Decimal::ZERO {
            report.max_drawdown_pct = percent(ratio(max_drawdown, peak_at_max, "max_drawdown_pct")?);
        }
        Ok(())
    }

    /// Per-sample Sharpe ratio of vault equity, risk-free rate zero.
    fn calculate_sharpe(
        &self,
        equity_curve: &[EquityPoint],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let returns: Vec<Decimal> = equity_curve
            .windows(2)
            .filter(|w| !w[0].vault_equity.is_zero())
            .map(|w| (w[1].vault_equity - w[0].vault_equity) / w[0].vault_equity)
            .collect();

        if returns.len() < 2 {
            report.sharpe_ratio = None;
            return Ok(());
        }

        let count = Decimal::from(returns.len());
        let mean_return = returns.iter().sum::<Decimal>() / count;
        let variance = returns
            .iter()
            .map(|r| (*r - mean_return) * (*r - mean_return))
            .sum::<Decimal>()
            / count;

        if variance <= Decimal::ZERO {
            report.sharpe_ratio = None;
            return Ok(());
        }

        let std_dev = variance
            .sqrt()
            .ok_or_else(|| AnalyticsError::Calculation("square root of variance".to_string()))?;
        report.sharpe_ratio = Some((mean_return / std_dev).round_dp(6));
        Ok(())
    }

    fn calculate_rebalance_stats(
        &self,
        logs: &[RebalanceLog],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        for log in logs {
            match log.kind {
                RebalanceKind::Alm => report.alm_rebalances += 1,
                RebalanceKind::Dlv => {
                    report.dlv_rebalances += 1;
                    report.final_debt = to_decimal(log.debt)?;
                }
            }
            report.total_swap_fees += to_decimal(log.swap_fee)?;
        }
        Ok(())
    }
}

/// `growth ^ (1 / years) - 1`, in percent. A wiped-out vault reads as -100%.
///
/// Short windows compound small moves into yields past `Decimal`'s range; those
/// saturate at `Decimal::MAX`.
fn annualize(growth: Decimal, years: f64) -> Decimal {
    if growth <= Decimal::ZERO {
        return -Decimal::ONE_HUNDRED;
    }
    let growth = growth.to_f64().unwrap_or(f64::MAX);
    let apy_pct = (growth.powf(1.0 / years) - 1.0) * 100.0;
    match Decimal::from_f64(apy_pct) {
        Some(apy) => apy.round_dp(6),
        None => {
            tracing::warn!(apy_pct, years, "APY out of range, saturating");
            Decimal::MAX
        }
    }
}
