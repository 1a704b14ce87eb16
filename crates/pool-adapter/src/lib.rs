//! # Vaultsim Pool Adapter
//!
//! The narrow contract between the vault ledger and a concentrated-liquidity pool,
//! plus `SimulatedPool`, the reference implementation used for backtests.
//!
//! ## Architectural Principles
//!
//! - **The adapter is the source of truth:** every mint, burn, collect and swap
//!   returns the exact token amounts that moved. Callers never assume the amounts
//!   they asked for.
//! - **Replay lives behind the same trait:** historical events are applied through
//!   `PoolAdapter::apply_event`, so the ledger and the replay loop can be pointed at
//!   any engine that implements the contract.
//!
//! ## Public API
//!
//! - `PoolAdapter`: the trait the ledger and strategies program against.
//! - `SimulatedPool`: in-memory pool driven by replayed events.
//! - `PoolError`: the specific error types that can be returned from this crate.

pub mod adapter;
pub mod error;
pub mod simulated;

pub use adapter::PoolAdapter;
pub use error::PoolError;
pub use simulated::{PoolParams, SimulatedPool};
