//! Spot quotes at a Q64.96 sqrt price, rounded down.

use crate::error::MathError;
use crate::math::{mul_div, mul_div_rounding_up};
use alloy_primitives::U256;

const Q64: U256 = U256::from_limbs([0, 1, 0, 0]);
const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);
const Q192: U256 = U256::from_limbs([0, 0, 0, 1]);

/// Price as `(ratio, scale)` with `price = ratio / scale`, keeping as many bits
/// as fit in 256.
fn price_ratio(sqrt_price: U256) -> Result<(U256, U256), MathError> {
    if sqrt_price <= U256::from(u128::MAX) {
        Ok((sqrt_price * sqrt_price, Q192))
    } else {
        Ok((mul_div(sqrt_price, sqrt_price, Q64)?, Q128))
    }
}

/// Value of `amount0` token0 expressed in token1.
pub fn token0_in_token1(amount0: U256, sqrt_price: U256) -> Result<U256, MathError> {
    let (ratio, scale) = price_ratio(sqrt_price)?;
    mul_div(ratio, amount0, scale)
}

/// Value of `amount1` token1 expressed in token0.
pub fn token1_in_token0(amount1: U256, sqrt_price: U256) -> Result<U256, MathError> {
    let (ratio, scale) = price_ratio(sqrt_price)?;
    mul_div(scale, amount1, ratio)
}

/// `token0_in_token1`, rounded up.
pub fn token0_in_token1_rounding_up(amount0: U256, sqrt_price: U256) -> Result<U256, MathError> {
    let (ratio, scale) = price_ratio(sqrt_price)?;
    mul_div_rounding_up(ratio, amount0, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick_math::sqrt_ratio_at_tick;

    #[test]
    fn unit_price_quotes_one_to_one() {
        let p = sqrt_ratio_at_tick(0).unwrap();
        assert_eq!(token0_in_token1(U256::from(1_000u32), p).unwrap(), U256::from(1_000u32));
        assert_eq!(token1_in_token0(U256::from(1_000u32), p).unwrap(), U256::from(1_000u32));
    }

    #[test]
    fn quotes_are_inverse_within_rounding() {
        let p = sqrt_ratio_at_tick(39_120).unwrap();
        let one_btc = U256::from(100_000_000u64);
        let usdc = token0_in_token1(one_btc, p).unwrap();
        // 1.0001^39120 ~= 49.99
        assert!(usdc > U256::from(4_990_000_000u64) && usdc < U256::from(5_010_000_000u64));
        let back = token1_in_token0(usdc, p).unwrap();
        assert!(one_btc - back <= U256::from(1u8));
    }

    #[test]
    fn high_prices_use_the_wide_path() {
        let p = sqrt_ratio_at_tick(500_000).unwrap();
        assert!(p > U256::from(u128::MAX));
        assert!(token0_in_token1(U256::from(1u8), p).unwrap() > U256::ZERO);
    }
}
