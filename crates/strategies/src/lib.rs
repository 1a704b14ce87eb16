//! # Vaultsim Strategy Library
//!
//! This crate decides when the vault rebalances. It defines the `Strategy`
//! trait the replay loop drives and provides the default mechanical policies for
//! both rebalance kinds plus advisor-driven variants.
//!
//! ## Architectural Principles
//!
//! - **Three callbacks:** every phase of the replay loop runs `cache` (refresh
//!   derived state), `trigger` (decide) and, only when the trigger fired, `act`.
//!   Only `act` receives the pool and the ledger mutably.
//! - **Strategy Agnostic Loop:** the backtester holds one boxed strategy per
//!   rebalance kind and never looks inside.
//! - **Shared variables:** the loop publishes the clock, the pool price and the
//!   hold benchmark through `StrategyVars`; strategies read them by key.
//!
//! ## Public API
//!
//! - `Strategy`: the trait all strategies implement.
//! - `PeriodicAlm`, `DeviationDlv`: mechanical defaults.
//! - `AdvisedAlm`, `AdvisedDlv`: advisor-driven policies with mechanical fallback.
//! - `create_strategies`: builds the pair a run needs from configuration.
//! - `StrategyVars`, `VarValue`: the variable bag and its well-known keys.

pub mod advised;
pub mod deviation_dlv;
pub mod error;
pub mod factory;
pub mod features;
pub mod periodic_alm;
pub mod record;
pub mod vars;

#[cfg(test)]
pub(crate) mod test_support;

pub use advised::{AdvisedAlm, AdvisedDlv};
pub use deviation_dlv::DeviationDlv;
pub use error::StrategyError;
pub use factory::{StrategyPair, create_strategies};
pub use periodic_alm::PeriodicAlm;
pub use vars::{StrategyVars, VarValue};

use async_trait::async_trait;
use core_types::{Phase, RebalanceKind, RebalanceLog};
use pool_adapter::PoolAdapter;
use vault::VaultLedger;

/// The callbacks the replay loop runs for one rebalance kind.
///
/// `&mut self` lets strategies keep their own state (schedules, rolling
/// windows, an advisor channel) between calls.
#[async_trait]
pub trait Strategy: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> RebalanceKind;

    /// Called once before the first period of a run.
    async fn reset(&mut self) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Refreshes derived state. May publish variables for later callbacks.
    async fn cache(
        &mut self,
        _phase: Phase,
        _pool: &dyn PoolAdapter,
        _ledger: &VaultLedger,
        _vars: &mut StrategyVars,
    ) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Whether `act` should run in this phase.
    async fn trigger(
        &mut self,
        phase: Phase,
        pool: &dyn PoolAdapter,
        ledger: &VaultLedger,
        vars: &StrategyVars,
    ) -> Result<bool, StrategyError>;

    /// Executes the rebalance.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(RebalanceLog))` - the action changed the vault.
    /// * `Ok(None)` - nothing needed doing after all.
    /// * `Err(StrategyError)` - the action failed; invariant violations end the run.
    async fn act(
        &mut self,
        phase: Phase,
        pool: &mut dyn PoolAdapter,
        ledger: &mut VaultLedger,
        vars: &mut StrategyVars,
    ) -> Result<Option<RebalanceLog>, StrategyError>;
}
