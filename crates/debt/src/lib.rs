//! # Vaultsim Debt Rebalancer
//!
//! Sizes leverage and deleverage trades that bring the vault's collateral ratio
//! back to its target, and checks the result after the ledger has executed them.
//!
//! ## Architectural Principles
//!
//! - **Pure calculator:** `DebtRebalancer` never touches the ledger or the pool.
//!   It takes a `DebtSnapshot` and returns a `DebtPlan`; the ledger executes it
//!   and hands back an `ExecutionReport` for `verify_execution`.
//! - **Closed form, then integer correction:** the continuous solution is
//!   nudged by ±1 raw unit, under a hard step cap, until the simulated ratio sits
//!   on the right side of the target.
//!
//! ## Public API
//!
//! - `DebtRebalancer`, `SolverParams`: the solver and its parameters.
//! - `DebtSnapshot`, `DebtPlan`, `DebtMode`: its input and output.
//! - `ExecutionReport`: post-execution facts checked by `verify_execution`.
//! - `DebtError`: the specific error types that can be returned from this crate.

pub mod checks;
pub mod error;
pub mod solver;

pub use checks::{CR_TOLERANCE_DIVISOR, DEBT_CEILING, ExecutionReport};
pub use error::DebtError;
pub use solver::{DEFAULT_MAX_CORRECTION_STEPS, DebtMode, DebtPlan, DebtRebalancer, DebtSnapshot, SolverParams};
