use crate::error::MathError;
use alloy_primitives::{U256, U512};

/// Fixed-point scale for ratios: 1e18 == 1.0.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 2^96, the Q64.96 scale of sqrt prices.
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

/// Fee rates are expressed in pips: 1_000_000 == 100%.
pub const PIPS_DENOMINATOR: u32 = 1_000_000;

/// Sentinel for unbounded ratios (zero denominator by construction, not by error).
pub const INFINITE_RATIO: U256 = U256::MAX;

pub fn add(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow("add"))
}

pub fn sub(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow("sub"))
}

pub fn mul(a: U256, b: U256) -> Result<U256, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow("mul"))
}

pub fn div(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero("div"));
    }
    Ok(a / b)
}

/// `ceil(a / b)`.
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero("div_rounding_up"));
    }
    let quotient = a / b;
    if (a % b).is_zero() {
        Ok(quotient)
    } else {
        add(quotient, U256::from(1u8))
    }
}

/// `a / b` rounded to nearest, halves away from zero.
pub fn div_round_half_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero("div_round_half_up"));
    }
    let half = b / U256::from(2u8);
    Ok(add(a, half)? / b)
}

/// `floor(a * b / d)` with a 512-bit intermediate product.
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256, MathError> {
    if d.is_zero() {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    let product = U512::from(a) * U512::from(b);
    narrow(product / U512::from(d), "mul_div")
}

/// `ceil(a * b / d)` with a 512-bit intermediate product.
pub fn mul_div_rounding_up(a: U256, b: U256, d: U256) -> Result<U256, MathError> {
    if d.is_zero() {
        return Err(MathError::DivisionByZero("mul_div_rounding_up"));
    }
    let product = U512::from(a) * U512::from(b);
    let divisor = U512::from(d);
    let mut quotient = product / divisor;
    if !(product % divisor).is_zero() {
        quotient += U512::from(1u8);
    }
    narrow(quotient, "mul_div_rounding_up")
}

pub fn wad_mul(a: U256, b: U256) -> Result<U256, MathError> {
    mul_div(a, b, WAD)
}

pub fn wad_div(a: U256, b: U256) -> Result<U256, MathError> {
    mul_div(a, WAD, b)
}

/// `floor(amount * pips / 1e6)`.
pub fn pips_of(amount: U256, pips: u32) -> Result<U256, MathError> {
    mul_div(amount, U256::from(pips), U256::from(PIPS_DENOMINATOR))
}

/// `ceil(amount * pips / 1e6)`.
pub fn pips_of_rounding_up(amount: U256, pips: u32) -> Result<U256, MathError> {
    mul_div_rounding_up(amount, U256::from(pips), U256::from(PIPS_DENOMINATOR))
}

pub fn to_u128(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Narrowing(value.to_string()));
    }
    Ok(value.to::<u128>())
}

fn narrow(value: U512, op: &'static str) -> Result<U256, MathError> {
    if value > U512::from(U256::MAX) {
        return Err(MathError::Overflow(op));
    }
    Ok(value.to::<U256>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    #[test]
    fn checked_ops_report_failures() {
        assert_eq!(add(U256::MAX, u(1)), Err(MathError::Overflow("add")));
        assert_eq!(sub(u(1), u(2)), Err(MathError::Underflow("sub")));
        assert_eq!(mul(U256::MAX, u(2)), Err(MathError::Overflow("mul")));
        assert_eq!(div(u(1), U256::ZERO), Err(MathError::DivisionByZero("div")));
        assert!(mul_div(u(1), u(1), U256::ZERO).is_err());
    }

    #[test]
    fn rounding_modes() {
        assert_eq!(div_rounding_up(u(10), u(3)).unwrap(), u(4));
        assert_eq!(div_rounding_up(u(9), u(3)).unwrap(), u(3));
        assert_eq!(div_round_half_up(u(5), u(2)).unwrap(), u(3));
        assert_eq!(div_round_half_up(u(7), u(3)).unwrap(), u(2));
        assert_eq!(mul_div(u(10), u(10), u(3)).unwrap(), u(33));
        assert_eq!(mul_div_rounding_up(u(10), u(10), u(3)).unwrap(), u(34));
        assert_eq!(pips_of(u(1_000_000), 3000).unwrap(), u(3000));
        assert_eq!(pips_of_rounding_up(u(1), 3000).unwrap(), u(1));
        assert_eq!(pips_of(u(1), 3000).unwrap(), U256::ZERO);
    }

    #[test]
    fn mul_div_survives_wide_intermediate() {
        // (2^255 * 4) / 8 fits, even though the product does not.
        let big = U256::from(1u8) << 255usize;
        assert_eq!(mul_div(big, u(4), u(8)).unwrap(), big / u(2));
        assert_eq!(mul_div(U256::MAX, u(2), u(1)), Err(MathError::Overflow("mul_div")));
    }

    #[test]
    fn constants() {
        assert_eq!(WAD, u(1_000_000_000_000_000_000));
        assert_eq!(Q96, U256::from(1u8) << 96usize);
        assert_eq!(wad_mul(WAD, WAD).unwrap(), WAD);
        assert_eq!(wad_div(u(1), u(2)).unwrap(), WAD / u(2));
        assert!(to_u128(U256::from(u128::MAX) + u(1)).is_err());
        assert_eq!(to_u128(u(42)).unwrap(), 42);
    }

    proptest! {
        #[test]
        fn ceil_is_floor_or_floor_plus_one(a in any::<u128>(), b in any::<u128>(), d in 1u128..) {
            let lo = mul_div(u(a), u(b), u(d)).unwrap();
            let hi = mul_div_rounding_up(u(a), u(b), u(d)).unwrap();
            prop_assert!(hi == lo || hi == lo + u(1));
        }
    }
}
