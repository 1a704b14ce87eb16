//! # Vaultsim Advisor
//!
//! Decision sources for the advisor-driven strategies: an external process
//! (typically a trained policy network) spoken to over line-delimited JSON, and
//! an in-process mechanical policy for the debt overlay.
//!
//! ## Architectural Principles
//!
//! - **One request in flight:** an advisor owns its channel and is driven through
//!   `&mut self`, so a tick blocks until the answer, a timeout or process exit.
//! - **Failures are surfaced, never defaulted:** every transport or protocol
//!   problem becomes an `AdvisorError`. Whether the run aborts or falls back to a
//!   mechanical strategy is the caller's policy.
//!
//! ## Public API
//!
//! - `Advisor`: the trait strategies ask for actions.
//! - `SubprocessAdvisor`: external process over stdin/stdout.
//! - `HeuristicDebtAdvisor`: in-process leverage-band policy.
//! - `create_advisor`: builds an advisor from configuration.
//! - `AdvisorError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod heuristic;
pub mod protocol;
pub mod subprocess;

pub use error::AdvisorError;
pub use heuristic::HeuristicDebtAdvisor;
pub use subprocess::SubprocessAdvisor;

use async_trait::async_trait;
use configuration::{AdvisorKind, AdvisorSource};
use std::time::Duration;

/// A source of discrete actions for a fixed-size observation vector.
#[async_trait]
pub trait Advisor: Send {
    fn name(&self) -> &str;

    /// Number of features `infer` expects.
    fn observation_dim(&self) -> usize;

    async fn infer(&mut self, obs: &[f64]) -> Result<i64, AdvisorError>;

    /// Clears any recurrent state kept between calls.
    async fn reset(&mut self) -> Result<(), AdvisorError>;
}

/// Builds the advisor described by `source`.
pub fn create_advisor(
    source: &AdvisorSource,
    observation_dim: usize,
    timeout: Duration,
) -> Result<Box<dyn Advisor>, AdvisorError> {
    match source.kind {
        AdvisorKind::Subprocess => {
            Ok(Box::new(SubprocessAdvisor::spawn(&source.command, observation_dim, timeout)?))
        }
        AdvisorKind::Heuristic => {
            if observation_dim != heuristic::OBS_DIM {
                return Err(AdvisorError::InvalidObservation { expected: heuristic::OBS_DIM, got: observation_dim });
            }
            Ok(Box::new(HeuristicDebtAdvisor::new()))
        }
    }
}
