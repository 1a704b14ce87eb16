use crate::error::DebtError;
use configuration::DebtSettings;
use fixed_point::{
    INFINITE_RATIO, PIPS_DENOMINATOR, U256, WAD, add, div, mul, mul_div, pips_of_rounding_up, sub,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;

/// Cap on the ±1 correction loop when nothing else is configured.
pub const DEFAULT_MAX_CORRECTION_STEPS: u32 = 2000;

/// Solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverParams {
    /// Target collateral ratio in WAD (2e18 == 200%).
    pub target_ratio: U256,
    pub max_correction_steps: u32,
}

impl SolverParams {
    pub fn from_settings(settings: &DebtSettings) -> Result<Self, DebtError> {
        let scaled = (settings.target_collateral_ratio * Decimal::from(1_000_000_000_000_000_000u64))
            .trunc()
            .to_u128()
            .ok_or_else(|| {
                DebtError::InvalidParameters(format!(
                    "target_collateral_ratio {} does not fit in WAD",
                    settings.target_collateral_ratio
                ))
            })?;
        Ok(Self { target_ratio: U256::from(scaled), max_correction_steps: settings.max_correction_steps })
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self { target_ratio: WAD * U256::from(2u8), max_correction_steps: DEFAULT_MAX_CORRECTION_STEPS }
    }
}

/// Vault state the solver works from. All values are stable-token raw units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtSnapshot {
    /// Stable token held by the vault.
    pub stable: U256,
    /// Volatile token held by the vault, valued in stable.
    pub volatile_value: U256,
    pub debt: U256,
    /// Pool swap fee in pips.
    pub fee_pips: u32,
}

impl DebtSnapshot {
    pub fn value(&self) -> Result<U256, DebtError> {
        Ok(add(self.stable, self.volatile_value)?)
    }

    /// Collateral ratio in WAD; `INFINITE_RATIO` without debt.
    pub fn collateral_ratio(&self) -> Result<U256, DebtError> {
        if self.debt.is_zero() {
            return Ok(INFINITE_RATIO);
        }
        Ok(mul_div(self.value()?, WAD, self.debt)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtMode {
    Leverage,
    Deleverage,
    Noop,
}

impl DebtMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtMode::Leverage => "leverage",
            DebtMode::Deleverage => "deleverage",
            DebtMode::Noop => "noop",
        }
    }
}

/// Trade sizes for one debt rebalance. Fields that do not apply to the mode are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtPlan {
    pub mode: DebtMode,
    /// Stable borrowed (leverage).
    pub borrow_stable: U256,
    /// Part of the borrowed stable swapped into volatile (leverage).
    pub swap_stable: U256,
    /// Vault value withdrawn (deleverage).
    pub withdraw_value: U256,
    /// Value of the volatile part of the withdrawal, swapped back to stable (deleverage).
    pub swap_volatile_value: U256,
    /// Stable repaid (deleverage).
    pub repay_stable: U256,
    /// Expected swap fee, valued in stable.
    pub expected_fee: U256,
    pub pre_collateral_ratio: U256,
    /// Simulated collateral ratio after execution.
    pub post_collateral_ratio: U256,
    /// Deleverage could not reach the target incrementally; everything is withdrawn.
    pub full_exit: bool,
    pub correction_steps: u32,
    /// False when the correction cap was hit before the integer optimum was found.
    pub converged: bool,
}

impl DebtPlan {
    fn noop(pre_collateral_ratio: U256) -> Self {
        Self {
            mode: DebtMode::Noop,
            borrow_stable: U256::ZERO,
            swap_stable: U256::ZERO,
            withdraw_value: U256::ZERO,
            swap_volatile_value: U256::ZERO,
            repay_stable: U256::ZERO,
            expected_fee: U256::ZERO,
            pre_collateral_ratio,
            post_collateral_ratio: pre_collateral_ratio,
            full_exit: false,
            correction_steps: 0,
            converged: true,
        }
    }
}

/// Closed-form leverage/deleverage solver with bounded integer correction.
#[derive(Debug, Clone)]
pub struct DebtRebalancer {
    params: SolverParams,
}

impl DebtRebalancer {
    pub fn new(params: SolverParams) -> Result<Self, DebtError> {
        if params.target_ratio <= WAD {
            return Err(DebtError::InvalidParameters("target ratio must be above 1.0".to_string()));
        }
        if params.max_correction_steps == 0 {
            return Err(DebtError::InvalidParameters("max_correction_steps must be positive".to_string()));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Classifies the snapshot against the target and sizes the trade.
    ///
    /// `V0 * WAD` is compared exactly with `target * D0`: greater leverages,
    /// smaller deleverages, equal is a no-op.
    pub fn rebalance_borrowed_amount(&self, snapshot: &DebtSnapshot) -> Result<DebtPlan, DebtError> {
        if snapshot.fee_pips >= PIPS_DENOMINATOR {
            return Err(DebtError::InvalidParameters(format!("fee {} pips is not below 100%", snapshot.fee_pips)));
        }
        let value = snapshot.value()?;
        let pre_cr = snapshot.collateral_ratio()?;
        let lhs = mul(value, WAD)?;
        let rhs = mul(self.params.target_ratio, snapshot.debt)?;

        let plan = match lhs.cmp(&rhs) {
            Ordering::Greater => self.plan_leverage(snapshot, value, pre_cr)?,
            Ordering::Less => self.plan_deleverage(snapshot, value, pre_cr)?,
            Ordering::Equal => DebtPlan::noop(pre_cr),
        };
        tracing::debug!(
            mode = plan.mode.as_str(),
            borrow = %plan.borrow_stable,
            withdraw = %plan.withdraw_value,
            pre_cr = %plan.pre_collateral_ratio,
            post_cr = %plan.post_collateral_ratio,
            steps = plan.correction_steps,
            full_exit = plan.full_exit,
            "Debt plan"
        );
        Ok(plan)
    }

    /// Borrow `B`, swap `S = B / k` of it (`k = 1 + r(1 - f)`) so the added
    /// tokens keep the vault's stable/volatile mix `r`, and deposit the rest.
    ///
    /// `B = (V0 - T*D0) / ((T - 1) + f/k)`.
    fn plan_leverage(&self, s: &DebtSnapshot, value: U256, pre_cr: U256) -> Result<DebtPlan, DebtError> {
        let target = self.params.target_ratio;
        let pips = U256::from(PIPS_DENOMINATOR);
        let fee = U256::from(s.fee_pips);

        // k * vol * 1e6, kept as an exact rational denominator.
        let k_scaled = add(mul(s.volatile_value, pips)?, mul(s.stable, sub(pips, fee)?)?)?;
        let swap_share = |borrow: U256| -> Result<U256, DebtError> {
            if s.volatile_value.is_zero() {
                return Ok(U256::ZERO);
            }
            Ok(mul_div(borrow, mul(s.volatile_value, pips)?, k_scaled)?)
        };
        let simulate = |borrow: U256| -> Result<(U256, U256, U256), DebtError> {
            let swap = swap_share(borrow)?;
            let fee_cost = pips_of_rounding_up(swap, s.fee_pips)?;
            let post_value = sub(add(value, borrow)?, fee_cost)?;
            let post_debt = add(s.debt, borrow)?;
            let cr = if post_debt.is_zero() { INFINITE_RATIO } else { mul_div(post_value, WAD, post_debt)? };
            Ok((cr, swap, fee_cost))
        };

        let f_over_k = if s.volatile_value.is_zero() {
            U256::ZERO
        } else {
            mul_div(mul(fee, s.volatile_value)?, WAD, k_scaled)?
        };
        let denominator = add(sub(target, WAD)?, f_over_k)?;
        let excess = sub(mul(value, WAD)?, mul(target, s.debt)?)?;
        let mut borrow = div(excess, denominator)?;

        let cap = self.params.max_correction_steps;
        let mut steps = 0u32;
        while steps < cap && simulate(borrow)?.0 > target {
            borrow = add(borrow, U256::from(1u8))?;
            steps += 1;
        }
        while steps < cap && !borrow.is_zero() && simulate(borrow - U256::from(1u8))?.0 <= target {
            borrow -= U256::from(1u8);
            steps += 1;
        }

        if borrow.is_zero() {
            return Ok(DebtPlan::noop(pre_cr));
        }
        let (post_cr, swap, fee_cost) = simulate(borrow)?;
        let converged = post_cr <= target && simulate(borrow - U256::from(1u8))?.0 > target;
        if !converged {
            tracing::warn!(steps, %borrow, "Leverage correction hit its step cap, using best effort");
        }

        Ok(DebtPlan {
            mode: DebtMode::Leverage,
            borrow_stable: borrow,
            swap_stable: swap,
            expected_fee: fee_cost,
            post_collateral_ratio: post_cr,
            correction_steps: steps,
            converged,
            ..DebtPlan::noop(pre_cr)
        })
    }

    /// Withdraw value `W` pro rata, swap its volatile part (share `1/(1+r)`) back
    /// to stable and repay. With `g = f/(1+r)`:
    ///
    /// `W = (T*D0 - V0) / ((T - 1) - T*g)`.
    ///
    /// A non-positive denominator or `W >= V0` falls back to a full exit.
    fn plan_deleverage(&self, s: &DebtSnapshot, value: U256, pre_cr: U256) -> Result<DebtPlan, DebtError> {
        let target = self.params.target_ratio;
        if value.is_zero() {
            return self.plan_full_exit(s, value, pre_cr);
        }

        // g in WAD: fee * (vol / V0).
        let g = mul_div(mul(U256::from(s.fee_pips), s.volatile_value)?, WAD, mul(U256::from(PIPS_DENOMINATOR), value)?)?;
        let positive = sub(target, WAD)?;
        let target_g = mul_div(target, g, WAD)?;
        if positive <= target_g {
            tracing::debug!(%positive, %target_g, "Deleverage denominator is non-positive");
            return self.plan_full_exit(s, value, pre_cr);
        }
        let shortfall = sub(mul(target, s.debt)?, mul(value, WAD)?)?;
        let mut withdraw = div(shortfall, sub(positive, target_g)?)?;
        if withdraw >= value {
            return self.plan_full_exit(s, value, pre_cr);
        }

        let simulate = |withdraw: U256| -> Result<(U256, U256, U256, U256), DebtError> {
            let volatile_part = mul_div(withdraw, s.volatile_value, value)?;
            let fee_cost = pips_of_rounding_up(volatile_part, s.fee_pips)?;
            let repay = sub(withdraw, fee_cost)?.min(s.debt);
            let post_value = sub(value, withdraw)?;
            let post_debt = sub(s.debt, repay)?;
            let cr = if post_debt.is_zero() { INFINITE_RATIO } else { mul_div(post_value, WAD, post_debt)? };
            Ok((cr, volatile_part, fee_cost, repay))
        };

        let cap = self.params.max_correction_steps;
        let mut steps = 0u32;
        while steps < cap && withdraw < value && simulate(withdraw)?.0 < target {
            withdraw = add(withdraw, U256::from(1u8))?;
            steps += 1;
        }
        while steps < cap && !withdraw.is_zero() && simulate(withdraw - U256::from(1u8))?.0 >= target {
            withdraw -= U256::from(1u8);
            steps += 1;
        }
        if withdraw >= value {
            return self.plan_full_exit(s, value, pre_cr);
        }
        if withdraw.is_zero() {
            return Ok(DebtPlan::noop(pre_cr));
        }

        let (post_cr, volatile_part, fee_cost, repay) = simulate(withdraw)?;
        let converged = post_cr >= target && simulate(withdraw - U256::from(1u8))?.0 < target;
        if !converged {
            tracing::warn!(steps, %withdraw, "Deleverage correction hit its step cap, using best effort");
        }

        Ok(DebtPlan {
            mode: DebtMode::Deleverage,
            withdraw_value: withdraw,
            swap_volatile_value: volatile_part,
            repay_stable: repay,
            expected_fee: fee_cost,
            post_collateral_ratio: post_cr,
            correction_steps: steps,
            converged,
            ..DebtPlan::noop(pre_cr)
        })
    }

    /// Withdraw everything, swap all volatile to stable, repay what is owed.
    fn plan_full_exit(&self, s: &DebtSnapshot, value: U256, pre_cr: U256) -> Result<DebtPlan, DebtError> {
        let fee_cost = pips_of_rounding_up(s.volatile_value, s.fee_pips)?;
        let proceeds = sub(value, fee_cost)?;
        let repay = proceeds.min(s.debt);
        let post_debt = sub(s.debt, repay)?;
        let post_cr = if post_debt.is_zero() {
            INFINITE_RATIO
        } else {
            mul_div(sub(proceeds, repay)?, WAD, post_debt)?
        };
        tracing::warn!(%value, debt = %s.debt, %repay, "Deleverage falls back to a full exit");
        Ok(DebtPlan {
            mode: DebtMode::Deleverage,
            withdraw_value: value,
            swap_volatile_value: s.volatile_value,
            repay_stable: repay,
            expected_fee: fee_cost,
            post_collateral_ratio: post_cr,
            full_exit: true,
            converged: false,
            ..DebtPlan::noop(pre_cr)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    fn solver() -> DebtRebalancer {
        DebtRebalancer::new(SolverParams::default()).unwrap()
    }

    fn within_ten_percent(cr: U256, target: U256) -> bool {
        let diff = if cr > target { cr - target } else { target - cr };
        diff <= target / u(10)
    }

    #[test]
    fn leverages_from_250_percent() {
        let snapshot = DebtSnapshot {
            stable: u(1_250_000_000),
            volatile_value: u(1_250_000_000),
            debt: u(1_000_000_000),
            fee_pips: 3000,
        };
        assert_eq!(snapshot.collateral_ratio().unwrap(), u(2_500_000_000_000_000_000));
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert_eq!(plan.mode, DebtMode::Leverage);
        assert!(plan.borrow_stable > U256::ZERO);
        assert!(plan.converged);
        assert!(within_ten_percent(plan.post_collateral_ratio, WAD * u(2)));
        assert!(plan.post_collateral_ratio <= WAD * u(2));
        // Balanced vault swaps B / (1 + (1 - f)), a hair over half.
        assert!(plan.swap_stable > plan.borrow_stable / u(2));
        assert!(plan.swap_stable < plan.borrow_stable * u(51) / u(100));
    }

    #[test]
    fn first_borrow_from_zero_debt() {
        let snapshot = DebtSnapshot { stable: u(5_000_000), volatile_value: u(5_000_000), debt: U256::ZERO, fee_pips: 500 };
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert_eq!(plan.pre_collateral_ratio, INFINITE_RATIO);
        assert_eq!(plan.mode, DebtMode::Leverage);
        // V0 / (T - 1 + f/k) ~= 10_000_000 / 1.00025
        assert!(plan.borrow_stable > u(9_990_000) && plan.borrow_stable < u(10_000_000));
        assert!(within_ten_percent(plan.post_collateral_ratio, WAD * u(2)));
    }

    #[test]
    fn all_stable_vault_borrows_without_swapping() {
        let snapshot = DebtSnapshot { stable: u(3_000_000), volatile_value: U256::ZERO, debt: u(1_000_000), fee_pips: 3000 };
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert_eq!(plan.mode, DebtMode::Leverage);
        assert!(plan.swap_stable.is_zero());
        assert_eq!(plan.borrow_stable, u(1_000_000));
        assert_eq!(plan.post_collateral_ratio, WAD * u(2));
    }

    #[test]
    fn deleverages_from_180_percent() {
        let snapshot = DebtSnapshot {
            stable: u(900_000_000),
            volatile_value: u(900_000_000),
            debt: u(1_000_000_000),
            fee_pips: 3000,
        };
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert_eq!(plan.mode, DebtMode::Deleverage);
        assert!(!plan.full_exit);
        assert!(plan.converged);
        assert!(plan.post_collateral_ratio >= WAD * u(2));
        assert!(within_ten_percent(plan.post_collateral_ratio, WAD * u(2)));
        assert!(plan.repay_stable < plan.withdraw_value);
        // ~ (2e9 - 1.8e9) / (1 - 2 * 0.0015)
        assert!(plan.withdraw_value > u(200_000_000) && plan.withdraw_value < u(201_000_000));
    }

    #[test]
    fn exact_target_is_a_noop() {
        let snapshot = DebtSnapshot { stable: u(1_000), volatile_value: u(1_000), debt: u(1_000), fee_pips: 3000 };
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert_eq!(plan.mode, DebtMode::Noop);
        assert_eq!(plan.post_collateral_ratio, WAD * u(2));
    }

    #[test]
    fn underwater_vault_exits_fully_and_reduces_debt() {
        let snapshot = DebtSnapshot { stable: u(450_000_000), volatile_value: u(450_000_000), debt: u(1_000_000_000), fee_pips: 3000 };
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert_eq!(plan.mode, DebtMode::Deleverage);
        assert!(plan.full_exit);
        assert_eq!(plan.withdraw_value, u(900_000_000));
        assert!(plan.repay_stable > U256::ZERO && plan.repay_stable < snapshot.debt);
    }

    #[test]
    fn prohibitive_fee_exits_fully() {
        let snapshot = DebtSnapshot { stable: U256::ZERO, volatile_value: u(1_500_000), debt: u(1_000_000), fee_pips: 600_000 };
        let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
        assert!(plan.full_exit);
        assert_eq!(plan.expected_fee, u(900_000));
        assert_eq!(plan.repay_stable, u(600_000));
    }

    #[test]
    fn rejects_bad_parameters() {
        let params = SolverParams { target_ratio: WAD, max_correction_steps: 10 };
        assert!(DebtRebalancer::new(params).is_err());
        let params = SolverParams { target_ratio: WAD * u(2), max_correction_steps: 0 };
        assert!(DebtRebalancer::new(params).is_err());
    }

    #[test]
    fn reads_target_from_settings() {
        let settings = DebtSettings {
            enabled: true,
            target_collateral_ratio: rust_decimal_macros::dec!(1.75),
            deviation_threshold_above: rust_decimal_macros::dec!(0.1),
            deviation_threshold_below: rust_decimal_macros::dec!(0.1),
            max_correction_steps: 500,
            check_every_event: false,
        };
        let params = SolverParams::from_settings(&settings).unwrap();
        assert_eq!(params.target_ratio, u(1_750_000_000_000_000_000));
        assert_eq!(params.max_correction_steps, 500);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

        #[test]
        fn converges_to_target_band(
            stable in 1_000_000u128..1_000_000_000_000,
            volatile in 1_000_000u128..1_000_000_000_000,
            cr_bps in 12_000u128..50_000,
            fee_pips in prop::sample::select(vec![100u32, 500, 3000, 10_000]),
        ) {
            let value = stable + volatile;
            let debt = value * 10_000 / cr_bps;
            let snapshot = DebtSnapshot { stable: u(stable), volatile_value: u(volatile), debt: u(debt), fee_pips };
            let plan = solver().rebalance_borrowed_amount(&snapshot).unwrap();
            if plan.mode != DebtMode::Noop && !plan.full_exit {
                prop_assert!(within_ten_percent(plan.post_collateral_ratio, WAD * u(2)));
            }
        }
    }
}
