//! Conversions between position liquidity and token amounts over a sqrt-price
//! interval `[sqrt_a, sqrt_b)`. Argument order of the bounds does not matter.

use crate::error::MathError;
use crate::math::{Q96, div, div_rounding_up, mul_div, mul_div_rounding_up, sub, to_u128};
use alloy_primitives::U256;

fn ordered(sqrt_a: U256, sqrt_b: U256) -> (U256, U256) {
    if sqrt_a > sqrt_b { (sqrt_b, sqrt_a) } else { (sqrt_a, sqrt_b) }
}

/// Liquidity supported by `amount0` of token0 across the whole interval.
pub fn liquidity_for_amount0(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> Result<u128, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    let intermediate = mul_div(lo, hi, Q96)?;
    to_u128(mul_div(amount0, intermediate, sub(hi, lo)?)?)
}

/// Liquidity supported by `amount1` of token1 across the whole interval.
pub fn liquidity_for_amount1(sqrt_a: U256, sqrt_b: U256, amount1: U256) -> Result<u128, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    to_u128(mul_div(amount1, Q96, sub(hi, lo)?)?)
}

/// Largest liquidity the two balances can fund at the current price.
pub fn liquidity_for_amounts(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    if sqrt_price <= lo {
        liquidity_for_amount0(lo, hi, amount0)
    } else if sqrt_price < hi {
        let from0 = liquidity_for_amount0(sqrt_price, hi, amount0)?;
        let from1 = liquidity_for_amount1(lo, sqrt_price, amount1)?;
        Ok(from0.min(from1))
    } else {
        liquidity_for_amount1(lo, hi, amount1)
    }
}

pub fn amount0_for_liquidity(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    if lo.is_zero() {
        return Err(MathError::DivisionByZero("amount0_for_liquidity"));
    }
    let numerator1 = U256::from(liquidity) << 96usize;
    let numerator2 = sub(hi, lo)?;
    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, hi)?, lo)
    } else {
        div(mul_div(numerator1, numerator2, hi)?, lo)
    }
}

pub fn amount1_for_liquidity(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    let width = sub(hi, lo)?;
    if round_up {
        mul_div_rounding_up(U256::from(liquidity), width, Q96)
    } else {
        mul_div(U256::from(liquidity), width, Q96)
    }
}

fn amounts(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<(U256, U256), MathError> {
    let (lo, hi) = ordered(sqrt_a, sqrt_b);
    if sqrt_price <= lo {
        Ok((amount0_for_liquidity(lo, hi, liquidity, round_up)?, U256::ZERO))
    } else if sqrt_price < hi {
        Ok((
            amount0_for_liquidity(sqrt_price, hi, liquidity, round_up)?,
            amount1_for_liquidity(lo, sqrt_price, liquidity, round_up)?,
        ))
    } else {
        Ok((U256::ZERO, amount1_for_liquidity(lo, hi, liquidity, round_up)?))
    }
}

/// Token amounts a position of `liquidity` is worth at `sqrt_price`, rounded down.
pub fn amounts_for_liquidity(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<(U256, U256), MathError> {
    amounts(sqrt_price, sqrt_a, sqrt_b, liquidity, false)
}

/// Token amounts required to add `liquidity` at `sqrt_price`, rounded up.
pub fn amounts_for_liquidity_rounding_up(
    sqrt_price: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<(U256, U256), MathError> {
    amounts(sqrt_price, sqrt_a, sqrt_b, liquidity, true)
}
