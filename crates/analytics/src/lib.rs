//! # Vaultsim Analytics Engine
//!
//! The final evaluation of a backtest: how the vault's equity did against simply
//! holding the initial deposit. It acts as the "unbiased judge" of a run.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** a pure logic crate with no knowledge of the pool or the
//!   ledger. It depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** `AnalyticsEngine` takes the equity curve and the
//!   rebalance log of a run and produces a `PerformanceReport`. Raw `U256`
//!   values are converted to `Decimal` once, at this boundary.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: the calculation logic.
//! - `EquityPoint`: one sample of the vault and hold benchmark values.
//! - `PerformanceReport`: APYs, returns, drawdown and rebalance statistics.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

pub mod engine;
pub mod error;
pub mod report;

pub use engine::{AnalyticsEngine, EquityPoint, to_decimal};
pub use error::AnalyticsError;
pub use report::PerformanceReport;
