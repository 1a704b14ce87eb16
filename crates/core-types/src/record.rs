use crate::enums::RebalanceKind;
use crate::structs::TickRange;
use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One executed rebalance, as handed to downstream reporting.
///
/// Values and ratios are raw stable-token units and WAD (1e18) fixed point. A
/// ratio equal to `U256::MAX` means "infinite" (no volatile holdings for the LP
/// ratio, no debt for the collateral ratio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceLog {
    pub kind: RebalanceKind,
    pub timestamp: DateTime<Utc>,
    pub tick: i32,
    /// Human price, token1 per token0 in raw units.
    pub price: Decimal,
    pub wide: Option<TickRange>,
    pub base: Option<TickRange>,
    pub limit: Option<TickRange>,
    #[serde(with = "crate::serde_u256")]
    pub total0: U256,
    #[serde(with = "crate::serde_u256")]
    pub total1: U256,
    #[serde(with = "crate::serde_u256")]
    pub pre_value: U256,
    #[serde(with = "crate::serde_u256")]
    pub post_value: U256,
    #[serde(with = "crate::serde_u256")]
    pub lp_ratio: U256,
    /// Swap fee paid by the action, valued in stable units.
    #[serde(with = "crate::serde_u256")]
    pub swap_fee: U256,
    #[serde(with = "crate::serde_u256")]
    pub pre_collateral_ratio: U256,
    #[serde(with = "crate::serde_u256")]
    pub post_collateral_ratio: U256,
    #[serde(with = "crate::serde_u256")]
    pub debt: U256,
    #[serde(with = "crate::serde_u256")]
    pub accumulated_fees0: U256,
    #[serde(with = "crate::serde_u256")]
    pub accumulated_fees1: U256,
    /// Vault equity against holding the initial deposit, in basis points.
    pub realized_il_bps: i64,
}
