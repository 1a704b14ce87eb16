use crate::error::MathError;
use alloy_primitives::U256;

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// `sqrt_ratio_at_tick(MIN_TICK)`.
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4_295_128_739, 0, 0, 0]);

/// `sqrt_ratio_at_tick(MAX_TICK)`.
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([0x5d95_1d52_6398_8d26, 0xefd1_fc6a_5064_8849, 0xfffd_8963, 0]);

/// Per-bit multipliers: `2^128 / sqrt(1.0001)^(2^i)` for bit `i` of |tick|.
const RATIO_STEPS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// Q64.96 sqrt price `sqrt(1.0001^tick) * 2^96`, rounded up.
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfBounds(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001_u128)
    } else {
        U256::from(1u8) << 128usize
    };
    for (bit, multiplier) in RATIO_STEPS {
        if abs_tick & bit != 0 {
            ratio = (ratio * U256::from(multiplier)) >> 128usize;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the result never undershoots the tick.
    let low_mask = U256::from(u32::MAX);
    let rounded = if (ratio & low_mask).is_zero() { U256::ZERO } else { U256::from(1u8) };
    Ok((ratio >> 32usize) + rounded)
}

/// Rounds `tick` down to the nearest multiple of `spacing`.
pub fn floor_to_spacing(tick: i32, spacing: i32) -> i32 {
    tick.div_euclid(spacing) * spacing
}

/// Lowest and highest usable ticks for a given spacing.
pub fn usable_tick_bounds(spacing: i32) -> (i32, i32) {
    let min = -(MAX_TICK / spacing) * spacing;
    (min, -min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Q96;

    #[test]
    fn tick_zero_is_unit_price() {
        assert_eq!(sqrt_ratio_at_tick(0).unwrap(), Q96);
    }

    #[test]
    fn bounds_match_reference_constants() {
        assert_eq!(sqrt_ratio_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(sqrt_ratio_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
        assert!(sqrt_ratio_at_tick(MAX_TICK + 1).is_err());
        assert!(sqrt_ratio_at_tick(MIN_TICK - 1).is_err());
    }

    #[test]
    fn monotone_in_tick() {
        let mut previous = sqrt_ratio_at_tick(-50_000).unwrap();
        for tick in (-49_990..50_000).step_by(997) {
            let current = sqrt_ratio_at_tick(tick).unwrap();
            assert!(current > previous, "tick {tick}");
            previous = current;
        }
    }

    #[test]
    fn reciprocal_ticks_multiply_to_q192() {
        let up = sqrt_ratio_at_tick(40_000).unwrap();
        let down = sqrt_ratio_at_tick(-40_000).unwrap();
        let product = crate::math::mul_div(up, down, Q96).unwrap();
        // Both sides round up, so the product may land a few units above 2^96.
        assert!(product >= Q96);
        assert!(product - Q96 < U256::from(1_000u32));
    }

    #[test]
    fn spacing_helpers() {
        assert_eq!(floor_to_spacing(125, 60), 120);
        assert_eq!(floor_to_spacing(-1, 60), -60);
        assert_eq!(floor_to_spacing(-120, 60), -120);
        assert_eq!(usable_tick_bounds(60), (-887_220, 887_220));
    }
}
