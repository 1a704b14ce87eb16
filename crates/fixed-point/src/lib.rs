//! # Vaultsim Fixed-Point Math
//!
//! Checked, non-negative big-integer arithmetic and the concentrated-liquidity
//! conversions built on top of it.
//!
//! ## Architectural Principles
//!
//! - **No silent wrap:** every operation that can overflow, underflow or divide by
//!   zero returns a `MathError`. Callers treat these as fatal contract violations.
//! - **Explicit rounding:** each conversion states whether it floors or ceils. The
//!   vault always rounds in its own favour (amounts charged round up, amounts paid
//!   round down).
//!
//! ## Public API
//!
//! - `math`: `add`, `sub`, `mul`, `div`, `mul_div`, `mul_div_rounding_up`,
//!   `div_rounding_up`, `div_round_half_up`, WAD and pip helpers.
//! - `tick_math`: `sqrt_ratio_at_tick` and tick bounds.
//! - `liquidity`: liquidity <-> token amount conversions.
//! - `price`: spot quotes between token0 and token1.

pub mod error;
pub mod liquidity;
pub mod math;
pub mod price;
pub mod tick_math;

pub use alloy_primitives::{U256, U512};
pub use error::MathError;
pub use math::{
    INFINITE_RATIO, PIPS_DENOMINATOR, Q96, WAD, add, div, div_round_half_up, div_rounding_up, mul,
    mul_div, mul_div_rounding_up, pips_of, pips_of_rounding_up, sub, to_u128, wad_div, wad_mul,
};
pub use tick_math::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK, sqrt_ratio_at_tick};
