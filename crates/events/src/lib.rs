//! # Vaultsim Events
//!
//! Historical pool events and the deterministic merge that turns three sorted
//! streams (mints, burns, swaps) into one causal replay order.
//!
//! ## Architectural Principles
//!
//! - **One total order:** `(block_number, log_index)` ascending, with
//!   Mint < Burn < Swap as the tie-break. Two runs over the same window always
//!   see the same sequence.
//! - **Lazy merge:** `OrderedEvents` is a pull-based iterator over three cursors
//!   and only ever looks at the head of each stream.
//! - **Shared, read-only history:** `EventSource` is `Send + Sync` so concurrent
//!   runs can share one `Arc` of the loaded history.
//!
//! ## Public API
//!
//! - `OrderedEvents`, `EventBatch`: the merge.
//! - `EventSource`, `HistoricalEvents`, `stream_events_by_date`: windowed access.
//! - `EventsError`: the specific error types that can be returned from this crate.

// Declare the modules that make up this crate.
pub mod error;
pub mod merge;
pub mod source;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use merge::{EventBatch, OrderedEvents};
pub use source::{EventSource, HistoricalEvents, stream_events_by_date};
