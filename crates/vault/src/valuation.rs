//! Pricing of token amounts in stable-token raw units.

use core_types::{StableToken, TokenAmounts, U256};
use fixed_point::price::{token0_in_token1, token1_in_token0};
use fixed_point::{INFINITE_RATIO, MathError, WAD, add, mul_div};

/// Converts between the two pool tokens at one sqrt price, with the stable token
/// as numeraire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Valuation {
    pub stable: StableToken,
    pub sqrt_price_x96: U256,
}

impl Valuation {
    pub fn new(stable: StableToken, sqrt_price_x96: U256) -> Self {
        Self { stable, sqrt_price_x96 }
    }

    pub fn stable_amount(&self, amounts: TokenAmounts) -> U256 {
        if self.stable.stable_is_token0() { amounts.amount0 } else { amounts.amount1 }
    }

    pub fn volatile_amount(&self, amounts: TokenAmounts) -> U256 {
        if self.stable.stable_is_token0() { amounts.amount1 } else { amounts.amount0 }
    }

    /// Builds a `TokenAmounts` from a stable and a volatile amount.
    pub fn amounts(&self, stable: U256, volatile: U256) -> TokenAmounts {
        if self.stable.stable_is_token0() {
            TokenAmounts::new(stable, volatile)
        } else {
            TokenAmounts::new(volatile, stable)
        }
    }

    /// Direction flag for a pool swap selling the stable token.
    pub fn stable_is_token0(&self) -> bool {
        self.stable.stable_is_token0()
    }

    /// Spot value of `amount` volatile tokens in stable, rounded down.
    pub fn volatile_to_stable(&self, amount: U256) -> Result<U256, MathError> {
        if self.stable.stable_is_token0() {
            token1_in_token0(amount, self.sqrt_price_x96)
        } else {
            token0_in_token1(amount, self.sqrt_price_x96)
        }
    }

    pub fn value(&self, amounts: TokenAmounts) -> Result<ValueBreakdown, MathError> {
        Ok(ValueBreakdown {
            stable_value: self.stable_amount(amounts),
            volatile_value: self.volatile_to_stable(self.volatile_amount(amounts))?,
        })
    }
}

/// Holdings split into their stable and volatile legs, both valued in stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValueBreakdown {
    pub stable_value: U256,
    pub volatile_value: U256,
}

impl ValueBreakdown {
    pub fn total(&self) -> Result<U256, MathError> {
        add(self.stable_value, self.volatile_value)
    }

    /// `stable / volatile` in WAD; 1.0 is perfectly balanced. `INFINITE_RATIO`
    /// when there is no volatile value.
    pub fn lp_ratio(&self) -> Result<U256, MathError> {
        if self.volatile_value.is_zero() {
            return Ok(INFINITE_RATIO);
        }
        mul_div(self.stable_value, WAD, self.volatile_value)
    }

    /// `(stable + volatile) / debt` in WAD; `INFINITE_RATIO` without debt.
    pub fn collateral_ratio(&self, debt: U256) -> Result<U256, MathError> {
        if debt.is_zero() {
            return Ok(INFINITE_RATIO);
        }
        mul_div(self.total()?, WAD, debt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixed_point::sqrt_ratio_at_tick;

    #[test]
    fn unit_price_values_one_to_one() {
        let valuation = Valuation::new(StableToken::Token1, sqrt_ratio_at_tick(0).unwrap());
        let value = valuation.value(TokenAmounts::new(U256::from(500u32), U256::from(700u32))).unwrap();
        assert_eq!(value.stable_value, U256::from(700u32));
        assert_eq!(value.volatile_value, U256::from(500u32));
        assert_eq!(value.total().unwrap(), U256::from(1200u32));
        assert_eq!(value.lp_ratio().unwrap(), U256::from(1_400_000_000_000_000_000u128));
    }

    #[test]
    fn stable_side_selects_the_numeraire() {
        // tick 39120 ~ 50 token1 per token0.
        let sqrt = sqrt_ratio_at_tick(39_120).unwrap();
        let amounts = TokenAmounts::new(U256::from(1_000_000u32), U256::from(1_000_000u32));

        let stable1 = Valuation::new(StableToken::Token1, sqrt).value(amounts).unwrap();
        assert!(stable1.volatile_value > U256::from(49_000_000u32));

        let stable0 = Valuation::new(StableToken::Token0, sqrt).value(amounts).unwrap();
        assert!(stable0.volatile_value < U256::from(21_000u32));
    }

    #[test]
    fn sentinel_ratios() {
        let empty = ValueBreakdown { stable_value: U256::from(10u8), volatile_value: U256::ZERO };
        assert_eq!(empty.lp_ratio().unwrap(), INFINITE_RATIO);
        assert_eq!(empty.collateral_ratio(U256::ZERO).unwrap(), INFINITE_RATIO);
        assert_eq!(empty.collateral_ratio(U256::from(5u8)).unwrap(), WAD * U256::from(2u8));
    }
}
