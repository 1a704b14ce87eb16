//! # Vaultsim Core Types
//!
//! The shared vocabulary of the workspace: who owns shares, which ticks a position
//! spans, what a replayed pool event looks like and what one executed rebalance
//! leaves behind in the log.
//!
//! ## Architectural Principles
//!
//! - **Layer 0:** depends on nothing else in the workspace. Every other crate speaks
//!   in these types.
//! - **Raw units everywhere:** token amounts and prices are `U256` raw integers
//!   exactly as the pool reports them. Decimal values only appear at the reporting
//!   edge (`RebalanceLog::price`).

pub mod enums;
pub mod error;
pub mod events;
pub mod record;
pub mod serde_u256;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use alloy_primitives::U256;
pub use enums::{EventKind, Phase, RebalanceKind, StableToken, TickSize};
pub use error::CoreError;
pub use events::{BurnEvent, EventKey, MintEvent, PoolEvent, SwapEvent};
pub use record::RebalanceLog;
pub use structs::{Owner, PositionInfo, Slot0, SwapOutcome, TickRange, TokenAmounts};
