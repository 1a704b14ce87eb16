use crate::error::DebtError;
use crate::solver::{DebtMode, DebtRebalancer};
use fixed_point::{INFINITE_RATIO, U256, WAD, add, mul_div};

/// Post-execution collateral ratio must land within `target / 10` of the target.
pub const CR_TOLERANCE_DIVISOR: u64 = 10;

/// Virtual debt never exceeds what a u128 can hold.
pub const DEBT_CEILING: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0, 0]);

/// What the ledger observed around one executed `DebtPlan`. Values in stable raw units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub mode: DebtMode,
    pub full_exit: bool,
    pub pre_value: U256,
    pub pre_debt: U256,
    pub post_value: U256,
    pub post_debt: U256,
    /// Swap fee actually paid, valued in stable.
    pub swap_fee_value: U256,
    /// Rounding slack allowed in the value balance.
    pub value_dust: U256,
}

impl ExecutionReport {
    pub fn post_collateral_ratio(&self) -> Result<U256, DebtError> {
        if self.post_debt.is_zero() {
            return Ok(INFINITE_RATIO);
        }
        Ok(mul_div(self.post_value, WAD, self.post_debt)?)
    }
}

impl DebtRebalancer {
    /// Checks the invariants every executed debt rebalance must satisfy.
    ///
    /// - debt stays under `DEBT_CEILING`;
    /// - a leverage or partial deleverage lands within `target / 10` of the target;
    /// - a full exit strictly reduces outstanding debt;
    /// - value moves only by the debt change and the swap fee, up to `value_dust`.
    pub fn verify_execution(&self, report: &ExecutionReport) -> Result<(), DebtError> {
        if report.post_debt > DEBT_CEILING {
            return Err(DebtError::InvariantViolation(format!(
                "debt {} exceeds the u128 ceiling",
                report.post_debt
            )));
        }

        let target = self.params().target_ratio;
        match (report.mode, report.full_exit) {
            (DebtMode::Noop, _) => {}
            (_, true) => {
                if !report.pre_debt.is_zero() && report.post_debt >= report.pre_debt {
                    return Err(DebtError::InvariantViolation(format!(
                        "full exit left debt at {} (was {})",
                        report.post_debt, report.pre_debt
                    )));
                }
            }
            (mode, false) => {
                if report.post_debt.is_zero() {
                    return Err(DebtError::InvariantViolation(format!(
                        "{} cleared all debt without a full exit",
                        mode.as_str()
                    )));
                }
                let cr = report.post_collateral_ratio()?;
                let gap = if cr > target { cr - target } else { target - cr };
                if gap > target / U256::from(CR_TOLERANCE_DIVISOR) {
                    return Err(DebtError::InvariantViolation(format!(
                        "{} landed at collateral ratio {cr}, target {target}",
                        mode.as_str()
                    )));
                }
            }
        }

        // pre_value + post_debt == post_value + pre_debt + fee, up to dust.
        let lhs = add(report.pre_value, report.post_debt)?;
        let rhs = add(add(report.post_value, report.pre_debt)?, report.swap_fee_value)?;
        let gap = if lhs > rhs { lhs - rhs } else { rhs - lhs };
        if gap > report.value_dust {
            return Err(DebtError::InvariantViolation(format!(
                "value balance off by {gap} (allowed {})",
                report.value_dust
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverParams;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    fn solver() -> DebtRebalancer {
        DebtRebalancer::new(SolverParams::default()).unwrap()
    }

    fn leverage_report() -> ExecutionReport {
        // 2.5e9 value over 1e9 debt, borrow 499.25e6 paying ~0.75e6 in fees.
        ExecutionReport {
            mode: DebtMode::Leverage,
            full_exit: false,
            pre_value: u(2_500_000_000),
            pre_debt: u(1_000_000_000),
            post_value: u(2_998_500_000),
            post_debt: u(1_499_250_000),
            swap_fee_value: u(750_000),
            value_dust: u(1_000),
        }
    }

    #[test]
    fn accepts_a_clean_leverage() {
        solver().verify_execution(&leverage_report()).unwrap();
    }

    #[test]
    fn rejects_ratio_outside_tolerance() {
        let report = ExecutionReport { post_value: u(3_400_000_000), swap_fee_value: U256::ZERO, value_dust: u(1_000_000_000), ..leverage_report() };
        let err = solver().verify_execution(&report).unwrap_err();
        assert!(matches!(err, DebtError::InvariantViolation(msg) if msg.contains("collateral ratio")));
    }

    #[test]
    fn rejects_value_leak() {
        let report = ExecutionReport { post_value: u(2_990_000_000), ..leverage_report() };
        let err = solver().verify_execution(&report).unwrap_err();
        assert!(matches!(err, DebtError::InvariantViolation(msg) if msg.contains("value balance")));
    }

    #[test]
    fn rejects_debt_over_ceiling() {
        let report = ExecutionReport { post_debt: DEBT_CEILING + u(1), ..leverage_report() };
        assert!(solver().verify_execution(&report).is_err());
    }

    #[test]
    fn full_exit_must_reduce_debt() {
        let report = ExecutionReport {
            mode: DebtMode::Deleverage,
            full_exit: true,
            pre_value: u(900),
            pre_debt: u(1_000),
            post_value: U256::ZERO,
            post_debt: u(1_000),
            swap_fee_value: U256::ZERO,
            value_dust: u(10),
        };
        assert!(solver().verify_execution(&report).is_err());

        let repaid = ExecutionReport { post_debt: u(102), swap_fee_value: u(2), ..report };
        solver().verify_execution(&repaid).unwrap();
    }

    #[test]
    fn partial_deleverage_cannot_clear_debt() {
        let report = ExecutionReport {
            mode: DebtMode::Deleverage,
            full_exit: false,
            pre_value: u(1_000),
            pre_debt: u(400),
            post_value: u(600),
            post_debt: U256::ZERO,
            swap_fee_value: U256::ZERO,
            value_dust: U256::ZERO,
        };
        assert!(solver().verify_execution(&report).is_err());
    }
}
