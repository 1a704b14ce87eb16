//! # Vaultsim Vault Ledger
//!
//! Share accounting for an automated liquidity-management vault that spreads its
//! holdings over three concentrated-liquidity ranges (wide, base and limit) and
//! carries a virtual stable-token debt for the leverage overlay.
//!
//! ## Architectural Principles
//!
//! - **Exact integers only:** shares, balances, fees and debt are `U256` raw
//!   units. Every rounding direction is chosen so the vault never pays out more
//!   than it holds.
//! - **The pool is the source of truth:** the ledger never assumes the amounts it
//!   asked for. Idle balances move by what `PoolAdapter::mint`, `burn`, `collect`
//!   and `swap` actually report.
//! - **Invariants are fatal:** share conservation, token conservation and
//!   LP-ratio parity on rebalance, and the debt post-conditions are checked where
//!   they can break. A violation is returned as `VaultError::InvariantViolation`
//!   and ends the run.
//!
//! ## Public API
//!
//! - `VaultLedger`: deposit, withdraw, passive rebalance, debt rebalance, views.
//! - `VaultParams`: validated range thresholds and fee settings.
//! - `Valuation`, `ValueBreakdown`: stable-denominated pricing of token amounts.
//! - `VaultError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod ledger;
pub mod leverage;
pub mod rebalance;
pub mod shares;
pub mod valuation;

pub use error::VaultError;
pub use ledger::{LedgerSnapshot, MINIMUM_LIQUIDITY, POSITION_OWNER, VaultLedger, VaultParams};
pub use leverage::DebtOutcome;
pub use rebalance::{LP_PARITY_TOLERANCE_BPS, PARITY_MIN_AMOUNT, RebalanceReceipt, TOKEN_DUST};
pub use shares::DepositReceipt;
pub use valuation::{Valuation, ValueBreakdown};
