use crate::error::VaultError;
use crate::valuation::{Valuation, ValueBreakdown};
use configuration::{DebtSettings, VaultSettings};
use core_types::{Owner, StableToken, TickRange, TokenAmounts, U256};
use debt::{DebtRebalancer, SolverParams};
use fixed_point::liquidity::{amounts_for_liquidity, liquidity_for_amounts};
use fixed_point::{PIPS_DENOMINATOR, add, pips_of, sqrt_ratio_at_tick, sub};
use pool_adapter::PoolAdapter;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

/// Shares minted to the locked owner on the first deposit. They can never be
/// withdrawn, so the share price can never be reset to an arbitrary value.
pub const MINIMUM_LIQUIDITY: u64 = 1000;

/// Owner under which the vault's positions are held in the pool.
pub const POSITION_OWNER: &str = "vault";

/// Ceil-rounded mint charges exceed floor-rounded liquidity amounts by at most
/// two raw units per token.
const MINT_ROUNDING_SLACK: u64 = 2;

/// Validated range and fee parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultParams {
    pub tick_spacing: i32,
    pub wide_threshold: i32,
    pub base_threshold: i32,
    pub limit_threshold: i32,
    /// Share of the deployable liquidity placed in the wide range, in pips.
    pub wide_weight_pips: u32,
    pub manager_fee_pips: u32,
    pub stable: StableToken,
}

impl VaultParams {
    pub fn new(settings: &VaultSettings, tick_spacing: i32, stable: StableToken) -> Result<Self, VaultError> {
        let wide_weight_pips = (settings.wide_weight * Decimal::from(PIPS_DENOMINATOR))
            .trunc()
            .to_u32()
            .ok_or_else(|| VaultError::InvalidParameters(format!("wide_weight {} is out of range", settings.wide_weight)))?;
        let params = Self {
            tick_spacing,
            wide_threshold: settings.wide_threshold,
            base_threshold: settings.base_threshold,
            limit_threshold: settings.limit_threshold,
            wide_weight_pips,
            manager_fee_pips: settings.manager_fee_pips,
            stable,
        };
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), VaultError> {
        if self.tick_spacing <= 0 {
            return Err(VaultError::InvalidParameters(format!("tick spacing {} is not positive", self.tick_spacing)));
        }
        for (name, threshold) in [
            ("wide_threshold", self.wide_threshold),
            ("base_threshold", self.base_threshold),
            ("limit_threshold", self.limit_threshold),
        ] {
            if threshold <= 0 || threshold % self.tick_spacing != 0 {
                return Err(VaultError::InvalidParameters(format!(
                    "{name} {threshold} must be a positive multiple of tick spacing {}",
                    self.tick_spacing
                )));
            }
        }
        if self.wide_threshold == self.base_threshold {
            return Err(VaultError::InvalidParameters("wide and base thresholds must differ".to_string()));
        }
        if self.wide_weight_pips == 0 || self.wide_weight_pips > PIPS_DENOMINATOR {
            return Err(VaultError::InvalidParameters(format!(
                "wide weight {} pips must be in (0, 1e6]",
                self.wide_weight_pips
            )));
        }
        if self.manager_fee_pips >= PIPS_DENOMINATOR {
            return Err(VaultError::InvalidParameters(format!(
                "manager fee {} pips must be below 1e6",
                self.manager_fee_pips
            )));
        }
        Ok(())
    }
}

/// Point-in-time view of the vault, priced at the pool's current sqrt price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub tick: i32,
    pub sqrt_price_x96: U256,
    pub totals: TokenAmounts,
    pub value: ValueBreakdown,
    pub total_value: U256,
    pub lp_ratio: U256,
    pub collateral_ratio: U256,
    pub virtual_debt: U256,
    pub total_supply: U256,
    pub wide: Option<TickRange>,
    pub base: Option<TickRange>,
    pub limit: Option<TickRange>,
    pub accumulated_swap_fees: TokenAmounts,
}

/// The vault's books: shares, idle balances, fee accumulators, virtual debt and
/// the three position ranges.
///
/// One ledger lives for one backtest and is mutated in place. Idle balances
/// include the accrued manager fees, which are a liability against them; the
/// usable idle balance is what remains after that liability.
#[derive(Debug, Clone)]
pub struct VaultLedger {
    pub(crate) params: VaultParams,
    pub(crate) address: Owner,
    pub(crate) total_supply: U256,
    pub(crate) balances: BTreeMap<Owner, U256>,
    pub(crate) idle: TokenAmounts,
    pub(crate) accrued_manager_fees: TokenAmounts,
    pub(crate) accumulated_swap_fees: TokenAmounts,
    pub(crate) virtual_debt: U256,
    pub(crate) wide: Option<TickRange>,
    pub(crate) base: Option<TickRange>,
    pub(crate) limit: Option<TickRange>,
    pub(crate) solver: DebtRebalancer,
}

impl VaultLedger {
    pub fn new(params: VaultParams, solver: DebtRebalancer) -> Self {
        Self {
            params,
            address: Owner::new(POSITION_OWNER),
            total_supply: U256::ZERO,
            balances: BTreeMap::new(),
            idle: TokenAmounts::ZERO,
            accrued_manager_fees: TokenAmounts::ZERO,
            accumulated_swap_fees: TokenAmounts::ZERO,
            virtual_debt: U256::ZERO,
            wide: None,
            base: None,
            limit: None,
            solver,
        }
    }

    pub fn from_settings(
        vault: &VaultSettings,
        debt: &DebtSettings,
        tick_spacing: i32,
        stable: StableToken,
    ) -> Result<Self, VaultError> {
        let params = VaultParams::new(vault, tick_spacing, stable)?;
        let solver = DebtRebalancer::new(SolverParams::from_settings(debt)?)?;
        Ok(Self::new(params, solver))
    }

    pub fn params(&self) -> &VaultParams {
        &self.params
    }

    pub fn solver(&self) -> &DebtRebalancer {
        &self.solver
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, owner: &Owner) -> U256 {
        self.balances.get(owner).copied().unwrap_or(U256::ZERO)
    }

    pub fn balances(&self) -> &BTreeMap<Owner, U256> {
        &self.balances
    }

    /// Idle balances including the accrued manager fees.
    pub fn idle(&self) -> TokenAmounts {
        self.idle
    }

    pub fn accrued_manager_fees(&self) -> TokenAmounts {
        self.accrued_manager_fees
    }

    pub fn accumulated_swap_fees(&self) -> TokenAmounts {
        self.accumulated_swap_fees
    }

    pub fn virtual_debt(&self) -> U256 {
        self.virtual_debt
    }

    pub fn wide(&self) -> Option<TickRange> {
        self.wide
    }

    pub fn base(&self) -> Option<TickRange> {
        self.base
    }

    pub fn limit(&self) -> Option<TickRange> {
        self.limit
    }

    /// The position owner used for every mint, burn and collect.
    pub fn address(&self) -> &Owner {
        &self.address
    }

    pub fn usable_idle(&self) -> Result<TokenAmounts, VaultError> {
        Ok(TokenAmounts::new(
            sub(self.idle.amount0, self.accrued_manager_fees.amount0)?,
            sub(self.idle.amount1, self.accrued_manager_fees.amount1)?,
        ))
    }

    /// Current ranges without duplicates, in wide, base, limit order.
    pub fn ranges(&self) -> Vec<TickRange> {
        let mut ranges = Vec::with_capacity(3);
        for range in [self.wide, self.base, self.limit].into_iter().flatten() {
            if !ranges.contains(&range) {
                ranges.push(range);
            }
        }
        ranges
    }

    /// Whether any range currently holds liquidity in the pool.
    pub fn has_active_position(&self, pool: &dyn PoolAdapter) -> bool {
        self.ranges().into_iter().any(|range| pool.position(&self.address, range).liquidity > 0)
    }

    pub fn valuation(&self, pool: &dyn PoolAdapter) -> Valuation {
        Valuation::new(self.params.stable, pool.slot0().sqrt_price_x96)
    }

    /// Usable idle plus, for every range, its principal at the current price and
    /// its uncollected fees net of the manager cut.
    pub fn total_amounts(&self, pool: &dyn PoolAdapter) -> Result<TokenAmounts, VaultError> {
        let mut totals = self.usable_idle()?;
        let sqrt_price = pool.slot0().sqrt_price_x96;
        for range in self.ranges() {
            let info = pool.position(&self.address, range);
            let principal = self.principal(sqrt_price, range, info.liquidity)?;
            totals.amount0 = add(totals.amount0, add(principal.amount0, self.net_of_manager_fee(info.tokens_owed0)?)?)?;
            totals.amount1 = add(totals.amount1, add(principal.amount1, self.net_of_manager_fee(info.tokens_owed1)?)?)?;
        }
        Ok(totals)
    }

    pub fn value(&self, pool: &dyn PoolAdapter) -> Result<ValueBreakdown, VaultError> {
        Ok(self.valuation(pool).value(self.total_amounts(pool)?)?)
    }

    pub fn total_value(&self, pool: &dyn PoolAdapter) -> Result<U256, VaultError> {
        Ok(self.value(pool)?.total()?)
    }

    pub fn lp_ratio(&self, pool: &dyn PoolAdapter) -> Result<U256, VaultError> {
        Ok(self.value(pool)?.lp_ratio()?)
    }

    pub fn collateral_ratio(&self, pool: &dyn PoolAdapter) -> Result<U256, VaultError> {
        Ok(self.value(pool)?.collateral_ratio(self.virtual_debt)?)
    }

    pub fn snapshot(&self, pool: &dyn PoolAdapter) -> Result<LedgerSnapshot, VaultError> {
        let slot0 = pool.slot0();
        let totals = self.total_amounts(pool)?;
        let value = Valuation::new(self.params.stable, slot0.sqrt_price_x96).value(totals)?;
        Ok(LedgerSnapshot {
            tick: slot0.tick,
            sqrt_price_x96: slot0.sqrt_price_x96,
            totals,
            value,
            total_value: value.total()?,
            lp_ratio: value.lp_ratio()?,
            collateral_ratio: value.collateral_ratio(self.virtual_debt)?,
            virtual_debt: self.virtual_debt,
            total_supply: self.total_supply,
            wide: self.wide,
            base: self.base,
            limit: self.limit,
            accumulated_swap_fees: self.accumulated_swap_fees,
        })
    }

    /// Re-verifies that the balances add up to the total supply.
    pub fn check_share_conservation(&self) -> Result<(), VaultError> {
        let mut sum = U256::ZERO;
        for balance in self.balances.values() {
            sum = add(sum, *balance)?;
        }
        if sum != self.total_supply {
            return Err(VaultError::InvariantViolation(format!(
                "share balances sum to {sum} but total supply is {}",
                self.total_supply
            )));
        }
        Ok(())
    }

    pub(crate) fn mint_shares(&mut self, owner: &Owner, shares: U256) -> Result<(), VaultError> {
        let balance = self.balances.entry(owner.clone()).or_insert(U256::ZERO);
        *balance = add(*balance, shares)?;
        self.total_supply = add(self.total_supply, shares)?;
        Ok(())
    }

    pub(crate) fn burn_shares(&mut self, owner: &Owner, shares: U256) -> Result<(), VaultError> {
        let available = self.balance_of(owner);
        if available < shares {
            return Err(VaultError::InsufficientShares {
                owner: owner.to_string(),
                requested: shares.to_string(),
                available: available.to_string(),
            });
        }
        let remaining = available - shares;
        if remaining.is_zero() {
            self.balances.remove(owner);
        } else {
            self.balances.insert(owner.clone(), remaining);
        }
        self.total_supply = sub(self.total_supply, shares)?;
        Ok(())
    }

    pub(crate) fn credit_idle(&mut self, amounts: TokenAmounts) -> Result<(), VaultError> {
        self.idle.amount0 = add(self.idle.amount0, amounts.amount0)?;
        self.idle.amount1 = add(self.idle.amount1, amounts.amount1)?;
        Ok(())
    }

    pub(crate) fn debit_idle(&mut self, amounts: TokenAmounts) -> Result<(), VaultError> {
        let usable = self.usable_idle()?;
        if amounts.amount0 > usable.amount0 || amounts.amount1 > usable.amount1 {
            return Err(VaultError::InvariantViolation(format!(
                "debit of ({}, {}) exceeds usable idle ({}, {})",
                amounts.amount0, amounts.amount1, usable.amount0, usable.amount1
            )));
        }
        self.idle.amount0 -= amounts.amount0;
        self.idle.amount1 -= amounts.amount1;
        Ok(())
    }

    pub(crate) fn net_of_manager_fee(&self, fee: U256) -> Result<U256, VaultError> {
        Ok(sub(fee, pips_of(fee, self.params.manager_fee_pips)?)?)
    }

    /// Books the tokens collected from a position: everything goes to idle, the
    /// manager cut of the fee component is accrued. Returns the net fees.
    pub(crate) fn settle_collected(
        &mut self,
        principal: TokenAmounts,
        collected: TokenAmounts,
    ) -> Result<TokenAmounts, VaultError> {
        let fees0 = sub(collected.amount0, principal.amount0)?;
        let fees1 = sub(collected.amount1, principal.amount1)?;
        let cut0 = pips_of(fees0, self.params.manager_fee_pips)?;
        let cut1 = pips_of(fees1, self.params.manager_fee_pips)?;
        let net = TokenAmounts::new(fees0 - cut0, fees1 - cut1);

        self.credit_idle(collected)?;
        self.accrued_manager_fees.amount0 = add(self.accrued_manager_fees.amount0, cut0)?;
        self.accrued_manager_fees.amount1 = add(self.accrued_manager_fees.amount1, cut1)?;
        self.accumulated_swap_fees.amount0 = add(self.accumulated_swap_fees.amount0, net.amount0)?;
        self.accumulated_swap_fees.amount1 = add(self.accumulated_swap_fees.amount1, net.amount1)?;
        Ok(net)
    }

    pub(crate) fn principal(&self, sqrt_price: U256, range: TickRange, liquidity: u128) -> Result<TokenAmounts, VaultError> {
        if liquidity == 0 {
            return Ok(TokenAmounts::ZERO);
        }
        let (amount0, amount1) = amounts_for_liquidity(
            sqrt_price,
            sqrt_ratio_at_tick(range.lower)?,
            sqrt_ratio_at_tick(range.upper)?,
            liquidity,
        )?;
        Ok(TokenAmounts::new(amount0, amount1))
    }

    /// Liquidity `available` can pay for in `range` once the pool rounds its
    /// charge up.
    pub(crate) fn mintable_liquidity(
        &self,
        pool: &dyn PoolAdapter,
        range: TickRange,
        available: TokenAmounts,
    ) -> Result<u128, VaultError> {
        let slack = U256::from(MINT_ROUNDING_SLACK);
        Ok(liquidity_for_amounts(
            pool.slot0().sqrt_price_x96,
            sqrt_ratio_at_tick(range.lower)?,
            sqrt_ratio_at_tick(range.upper)?,
            available.amount0.saturating_sub(slack),
            available.amount1.saturating_sub(slack),
        )?)
    }

    /// Mints `liquidity` into `range` and pays the pool's actual charge from idle.
    pub(crate) fn mint_from_idle(
        &mut self,
        pool: &mut dyn PoolAdapter,
        range: TickRange,
        liquidity: u128,
    ) -> Result<TokenAmounts, VaultError> {
        if liquidity == 0 {
            return Ok(TokenAmounts::ZERO);
        }
        let charged = pool.mint(&self.address, range, liquidity)?;
        self.debit_idle(charged)?;
        Ok(charged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings() -> VaultSettings {
        VaultSettings {
            wide_threshold: 12_000,
            base_threshold: 3_600,
            limit_threshold: 1_200,
            wide_weight: dec!(0.1),
            manager_fee_pips: 0,
        }
    }

    #[test]
    fn params_convert_weight_to_pips() {
        let params = VaultParams::new(&settings(), 60, StableToken::Token1).unwrap();
        assert_eq!(params.wide_weight_pips, 100_000);
    }

    #[test]
    fn rejects_misaligned_or_equal_thresholds() {
        let misaligned = VaultSettings { base_threshold: 3_601, ..settings() };
        assert!(matches!(
            VaultParams::new(&misaligned, 60, StableToken::Token1),
            Err(VaultError::InvalidParameters(_))
        ));

        let equal = VaultSettings { base_threshold: 12_000, ..settings() };
        assert!(VaultParams::new(&equal, 60, StableToken::Token1).is_err());

        let negative = VaultSettings { limit_threshold: -60, ..settings() };
        assert!(VaultParams::new(&negative, 60, StableToken::Token1).is_err());

        let heavy = VaultSettings { wide_weight: dec!(1.5), ..settings() };
        assert!(VaultParams::new(&heavy, 60, StableToken::Token1).is_err());
    }

    #[test]
    fn burning_more_than_held_is_rejected() {
        let params = VaultParams::new(&settings(), 60, StableToken::Token1).unwrap();
        let solver = DebtRebalancer::new(SolverParams::default()).unwrap();
        let mut ledger = VaultLedger::new(params, solver);
        let alice = Owner::new("alice");
        ledger.mint_shares(&alice, U256::from(10u8)).unwrap();
        assert!(matches!(
            ledger.burn_shares(&alice, U256::from(11u8)),
            Err(VaultError::InsufficientShares { .. })
        ));
        ledger.burn_shares(&alice, U256::from(10u8)).unwrap();
        assert!(ledger.balances().is_empty());
        assert_eq!(ledger.total_supply(), U256::ZERO);
        ledger.check_share_conservation().unwrap();
    }
}
