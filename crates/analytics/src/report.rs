use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The evaluation of one backtest run.
///
/// Values are in raw stable-token units. Percentages are plain percent
/// (12.5 == 12.5%). The hold benchmark is the operator's initial deposit valued
/// at each sample's price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // I. Window
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,

    // II. Vault against hold
    pub initial_value: Decimal,
    pub final_vault_value: Decimal,
    pub final_hold_value: Decimal,
    pub vault_return_pct: Decimal,
    pub hold_return_pct: Decimal,
    pub vault_apy_pct: Decimal,
    pub hold_apy_pct: Decimal,
    /// `vault_apy_pct - hold_apy_pct`.
    pub apy_diff_pct: Decimal,

    // III. Risk and Drawdown
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<Decimal>, // Option<> for cases with no stdev

    // IV. Rebalance statistics
    pub alm_rebalances: usize,
    pub dlv_rebalances: usize,
    pub total_swap_fees: Decimal,
    pub final_debt: Decimal,
    pub realized_il_bps: i64,
}

impl PerformanceReport {
    /// Creates a zeroed report covering `[start, end)`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            elapsed: (end - start).to_std().unwrap_or_default(),
            initial_value: Decimal::ZERO,
            final_vault_value: Decimal::ZERO,
            final_hold_value: Decimal::ZERO,
            vault_return_pct: Decimal::ZERO,
            hold_return_pct: Decimal::ZERO,
            vault_apy_pct: Decimal::ZERO,
            hold_apy_pct: Decimal::ZERO,
            apy_diff_pct: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: None,
            alm_rebalances: 0,
            dlv_rebalances: 0,
            total_swap_fees: Decimal::ZERO,
            final_debt: Decimal::ZERO,
            realized_il_bps: 0,
        }
    }
}
