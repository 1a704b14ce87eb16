use crate::error::VaultError;
use crate::ledger::{MINIMUM_LIQUIDITY, VaultLedger};
use core_types::{Owner, TokenAmounts, U256};
use fixed_point::{add, div, div_rounding_up, mul, mul_div, to_u128};
use pool_adapter::PoolAdapter;

/// Result of a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub shares: U256,
    /// Tokens taken from the depositor.
    pub amounts: TokenAmounts,
    /// Tokens the pool charged for the liquidity added to active ranges.
    pub deployed: TokenAmounts,
}

impl VaultLedger {
    /// Shares and actual amounts for a deposit, without touching state.
    ///
    /// The first deposit prices shares at `max(desired0, desired1)`. Later deposits
    /// are proportional to total holdings: amounts round up, shares round down.
    pub fn preview_deposit(
        &self,
        pool: &dyn PoolAdapter,
        desired0: U256,
        desired1: U256,
    ) -> Result<(U256, TokenAmounts), VaultError> {
        if desired0.is_zero() && desired1.is_zero() {
            return Err(VaultError::ZeroDeposit);
        }
        if self.total_supply.is_zero() {
            let shares = desired0.max(desired1);
            return Ok((shares, TokenAmounts::new(desired0, desired1)));
        }

        let totals = self.total_amounts(pool)?;
        let supply = self.total_supply;
        let (total0, total1) = (totals.amount0, totals.amount1);
        if total0.is_zero() && total1.is_zero() {
            return Err(VaultError::InvariantViolation(format!(
                "{supply} shares outstanding against empty holdings"
            )));
        }
        if total0.is_zero() {
            return Ok((mul_div(desired1, supply, total1)?, TokenAmounts::new(U256::ZERO, desired1)));
        }
        if total1.is_zero() {
            return Ok((mul_div(desired0, supply, total0)?, TokenAmounts::new(desired0, U256::ZERO)));
        }

        let cross = mul(desired0, total1)?.min(mul(desired1, total0)?);
        if cross.is_zero() {
            return Err(VaultError::ZeroShares);
        }
        let amount0 = div_rounding_up(cross, total1)?;
        let amount1 = div_rounding_up(cross, total0)?;
        let shares = div(mul_div(cross, supply, total0)?, total1)?;
        Ok((shares, TokenAmounts::new(amount0, amount1)))
    }

    /// Deposits up to `desired` tokens for `owner` and returns the shares minted.
    ///
    /// The tokens go to idle first; then every range that currently holds
    /// liquidity receives its pro-rata share of new liquidity, paid from idle at
    /// the pool's actual charge.
    pub fn deposit(
        &mut self,
        pool: &mut dyn PoolAdapter,
        owner: &Owner,
        desired0: U256,
        desired1: U256,
        min0: U256,
        min1: U256,
    ) -> Result<DepositReceipt, VaultError> {
        let (gross_shares, amounts) = self.preview_deposit(pool, desired0, desired1)?;
        let first = self.total_supply.is_zero();
        let floor = U256::from(MINIMUM_LIQUIDITY);
        let shares = if first { gross_shares.saturating_sub(floor) } else { gross_shares };
        if shares.is_zero() {
            return Err(VaultError::ZeroShares);
        }
        if amounts.amount0 < min0 || amounts.amount1 < min1 {
            return Err(VaultError::Slippage {
                amount0: amounts.amount0.to_string(),
                amount1: amounts.amount1.to_string(),
                min0: min0.to_string(),
                min1: min1.to_string(),
            });
        }

        let supply_before = self.total_supply;
        if first {
            self.mint_shares(&Owner::locked(), floor)?;
        }
        self.mint_shares(owner, shares)?;
        self.credit_idle(amounts)?;

        let mut deployed = TokenAmounts::ZERO;
        if !supply_before.is_zero() {
            for range in self.ranges() {
                let held = pool.position(&self.address, range).liquidity;
                if held == 0 {
                    continue;
                }
                let pro_rata = to_u128(mul_div(U256::from(held), shares, supply_before)?)?;
                let liquidity = pro_rata.min(self.mintable_liquidity(pool, range, self.usable_idle()?)?);
                let charged = self.mint_from_idle(pool, range, liquidity)?;
                deployed.amount0 = add(deployed.amount0, charged.amount0)?;
                deployed.amount1 = add(deployed.amount1, charged.amount1)?;
            }
        }

        tracing::info!(
            %owner,
            %shares,
            amount0 = %amounts.amount0,
            amount1 = %amounts.amount1,
            deployed0 = %deployed.amount0,
            deployed1 = %deployed.amount1,
            "Deposit"
        );
        Ok(DepositReceipt { shares, amounts, deployed })
    }

    /// Tokens a withdrawal of `shares` by `owner` would pay, without touching state.
    ///
    /// The payout is the pro-rata part of usable idle, plus for every range the
    /// principal of the pro-rata liquidity and a pro-rata share of the owed fees
    /// net of the manager cut.
    pub fn preview_withdraw(
        &self,
        pool: &dyn PoolAdapter,
        owner: &Owner,
        shares: U256,
    ) -> Result<TokenAmounts, VaultError> {
        if shares.is_zero() {
            return Err(VaultError::ZeroShares);
        }
        let available = self.balance_of(owner);
        if available < shares {
            return Err(VaultError::InsufficientShares {
                owner: owner.to_string(),
                requested: shares.to_string(),
                available: available.to_string(),
            });
        }
        let supply = self.total_supply;
        let usable = self.usable_idle()?;
        let mut payout =
            TokenAmounts::new(mul_div(usable.amount0, shares, supply)?, mul_div(usable.amount1, shares, supply)?);

        let sqrt_price = pool.slot0().sqrt_price_x96;
        for range in self.ranges() {
            let position = pool.position(&self.address, range);
            let liquidity = to_u128(mul_div(U256::from(position.liquidity), shares, supply)?)?;
            let principal = self.principal(sqrt_price, range, liquidity)?;
            let fees0 = self.net_of_manager_fee(position.tokens_owed0)?;
            let fees1 = self.net_of_manager_fee(position.tokens_owed1)?;
            payout.amount0 = add(payout.amount0, add(principal.amount0, mul_div(fees0, shares, supply)?)?)?;
            payout.amount1 = add(payout.amount1, add(principal.amount1, mul_div(fees1, shares, supply)?)?)?;
        }
        Ok(payout)
    }

    /// Burns `shares` of `owner` and pays out their pro-rata holdings.
    ///
    /// The payout is checked against `min0`/`min1` before anything moves. Then
    /// for every range the pro-rata liquidity is burned and the whole owed
    /// balance collected; the fee part is split into manager cut and net and
    /// everything lands in idle, from which the payout is debited.
    pub fn withdraw(
        &mut self,
        pool: &mut dyn PoolAdapter,
        owner: &Owner,
        shares: U256,
        min0: U256,
        min1: U256,
    ) -> Result<TokenAmounts, VaultError> {
        let payout = self.preview_withdraw(pool, owner, shares)?;
        if payout.amount0 < min0 || payout.amount1 < min1 {
            return Err(VaultError::Slippage {
                amount0: payout.amount0.to_string(),
                amount1: payout.amount1.to_string(),
                min0: min0.to_string(),
                min1: min1.to_string(),
            });
        }

        let supply_before = self.total_supply;
        self.burn_shares(owner, shares)?;
        for range in self.ranges() {
            let held = pool.position(&self.address, range).liquidity;
            let liquidity = to_u128(mul_div(U256::from(held), shares, supply_before)?)?;
            let principal = if liquidity > 0 {
                pool.burn(&self.address, range, liquidity)?
            } else {
                TokenAmounts::ZERO
            };
            let collected = pool.collect(&self.address, range, U256::MAX, U256::MAX)?;
            self.settle_collected(principal, collected)?;
        }
        self.debit_idle(payout)?;

        tracing::info!(
            %owner,
            %shares,
            amount0 = %payout.amount0,
            amount1 = %payout.amount1,
            remaining_supply = %self.total_supply,
            "Withdraw"
        );
        Ok(payout)
    }

    /// Value of `owner`'s shares in stable, at the current price.
    pub fn share_value(&self, pool: &dyn PoolAdapter, owner: &Owner) -> Result<U256, VaultError> {
        if self.total_supply.is_zero() {
            return Ok(U256::ZERO);
        }
        let value = self.total_value(pool)?;
        Ok(mul_div(value, self.balance_of(owner), self.total_supply)?)
    }

    pub(crate) fn shares_for_value(&self, value: U256, total_value: U256) -> Result<U256, VaultError> {
        if total_value.is_zero() {
            return Ok(U256::ZERO);
        }
        Ok(mul_div(value, self.total_supply, total_value)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::{VaultLedger, VaultParams};
    use crate::error::VaultError;
    use configuration::VaultSettings;
    use core_types::{Owner, StableToken, U256};
    use debt::{DebtRebalancer, SolverParams};
    use pool_adapter::{PoolParams, SimulatedPool};
    use rust_decimal_macros::dec;

    fn setup() -> (VaultLedger, SimulatedPool) {
        let settings = VaultSettings {
            wide_threshold: 12_000,
            base_threshold: 3_600,
            limit_threshold: 1_200,
            wide_weight: dec!(0.1),
            manager_fee_pips: 0,
        };
        let params = VaultParams::new(&settings, 60, StableToken::Token1).unwrap();
        let ledger = VaultLedger::new(params, DebtRebalancer::new(SolverParams::default()).unwrap());
        let pool = SimulatedPool::new(PoolParams { tick_spacing: 60, fee_pips: 3000 }, 39_120).unwrap();
        (ledger, pool)
    }

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    #[test]
    fn first_deposit_locks_the_floor() {
        let (mut ledger, mut pool) = setup();
        let alice = Owner::new("alice");
        let receipt = ledger
            .deposit(&mut pool, &alice, u(100_000_000), u(5_000_000_000), U256::ZERO, U256::ZERO)
            .unwrap();
        assert_eq!(receipt.shares, u(5_000_000_000 - 1000));
        assert_eq!(ledger.balance_of(&Owner::locked()), u(1000));
        assert_eq!(ledger.total_supply(), u(5_000_000_000));
        assert_eq!(ledger.idle().amount0, u(100_000_000));
        ledger.check_share_conservation().unwrap();
    }

    #[test]
    fn later_deposits_are_proportional() {
        let (mut ledger, mut pool) = setup();
        let alice = Owner::new("alice");
        let bob = Owner::new("bob");
        ledger.deposit(&mut pool, &alice, u(1_000), u(2_000_000), U256::ZERO, U256::ZERO).unwrap();

        // Bob offers too much token0; only the proportional part is taken.
        let receipt = ledger.deposit(&mut pool, &bob, u(5_000), u(1_000_000), U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(receipt.amounts.amount1, u(1_000_000));
        assert_eq!(receipt.amounts.amount0, u(500));
        assert_eq!(receipt.shares, u(1_000_000));
        ledger.check_share_conservation().unwrap();
    }

    #[test]
    fn rejects_zero_and_slippage() {
        let (mut ledger, mut pool) = setup();
        let alice = Owner::new("alice");
        assert_eq!(
            ledger.deposit(&mut pool, &alice, U256::ZERO, U256::ZERO, U256::ZERO, U256::ZERO),
            Err(VaultError::ZeroDeposit)
        );
        assert_eq!(
            ledger.deposit(&mut pool, &alice, u(10), u(1000), U256::ZERO, U256::ZERO),
            Err(VaultError::ZeroShares)
        );
        ledger.deposit(&mut pool, &alice, u(1_000), u(2_000_000), U256::ZERO, U256::ZERO).unwrap();
        let err = ledger
            .deposit(&mut pool, &alice, u(5_000), u(1_000_000), u(600), U256::ZERO)
            .unwrap_err();
        assert!(matches!(err, VaultError::Slippage { .. }));
        // A rejected deposit leaves the books untouched.
        assert_eq!(ledger.total_supply(), u(2_000_000));
    }

    #[test]
    fn withdraw_from_idle_is_pro_rata() {
        let (mut ledger, mut pool) = setup();
        let alice = Owner::new("alice");
        ledger.deposit(&mut pool, &alice, u(1_000_000), u(4_000_000), U256::ZERO, U256::ZERO).unwrap();
        let shares = ledger.balance_of(&alice) / u(2);
        let paid = ledger.withdraw(&mut pool, &alice, shares, U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(paid.amount1, u(1_999_500));
        assert_eq!(paid.amount0, u(499_875));
        assert!(matches!(
            ledger.withdraw(&mut pool, &alice, u(10_000_000), U256::ZERO, U256::ZERO),
            Err(VaultError::InsufficientShares { .. })
        ));
        ledger.check_share_conservation().unwrap();
    }
}
