use crate::error::VaultError;
use crate::ledger::VaultLedger;
use crate::valuation::Valuation;
use core_types::{Owner, SwapOutcome, TokenAmounts, U256};
use debt::{DebtError, DebtMode, DebtPlan, DebtSnapshot, ExecutionReport};
use fixed_point::{add, sub};
use pool_adapter::PoolAdapter;

/// Raw-unit slack of the value balance check, applied once in stable and once
/// in volatile units (converted at spot). Covers swap and mint rounding.
const VALUE_DUST_UNITS: u64 = 1000;

/// What one executed debt rebalance did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtOutcome {
    pub plan: DebtPlan,
    pub report: ExecutionReport,
    pub swap: Option<SwapOutcome>,
    pub shares_minted: U256,
    pub shares_burned: U256,
    /// Stable borrowed (leverage) or repaid (deleverage).
    pub debt_change: U256,
    /// Trade leftovers that stayed in the vault's idle balance.
    pub absorbed: TokenAmounts,
}

impl VaultLedger {
    /// Solver input at the current price.
    pub fn debt_snapshot(&self, pool: &dyn PoolAdapter) -> Result<DebtSnapshot, VaultError> {
        let value = self.value(pool)?;
        Ok(DebtSnapshot {
            stable: value.stable_value,
            volatile_value: value.volatile_value,
            debt: self.virtual_debt,
            fee_pips: pool.fee_pips(),
        })
    }

    /// The trade `rebalance_debt` would execute right now.
    pub fn plan_debt(&self, pool: &dyn PoolAdapter) -> Result<DebtPlan, VaultError> {
        Ok(self.solver.rebalance_borrowed_amount(&self.debt_snapshot(pool)?)?)
    }

    /// Brings the collateral ratio back to target on behalf of `owner`.
    ///
    /// Leverage borrows stable, swaps the planned share into volatile and deposits
    /// both for `owner`. Deleverage withdraws `owner`'s shares worth the planned
    /// value, swaps the volatile part back to stable and repays. Leftovers stay in
    /// idle. The outcome is checked by `DebtRebalancer::verify_execution`.
    pub fn rebalance_debt(&mut self, pool: &mut dyn PoolAdapter, owner: &Owner) -> Result<DebtOutcome, VaultError> {
        let snapshot = self.debt_snapshot(pool)?;
        let plan = self.solver.rebalance_borrowed_amount(&snapshot)?;
        let valuation = self.valuation(pool);
        let pre_value = snapshot.value()?;

        let mut outcome = DebtOutcome {
            report: ExecutionReport {
                mode: plan.mode,
                full_exit: plan.full_exit,
                pre_value,
                pre_debt: snapshot.debt,
                post_value: pre_value,
                post_debt: snapshot.debt,
                swap_fee_value: U256::ZERO,
                value_dust: add(U256::from(VALUE_DUST_UNITS), valuation.volatile_to_stable(U256::from(VALUE_DUST_UNITS))?)?,
            },
            plan,
            swap: None,
            shares_minted: U256::ZERO,
            shares_burned: U256::ZERO,
            debt_change: U256::ZERO,
            absorbed: TokenAmounts::ZERO,
        };

        match outcome.plan.mode {
            DebtMode::Noop => return Ok(outcome),
            DebtMode::Leverage => self.execute_leverage(pool, owner, valuation, &mut outcome)?,
            DebtMode::Deleverage => self.execute_deleverage(pool, owner, valuation, &mut outcome)?,
        }

        outcome.report.post_value = self.total_value(pool)?;
        outcome.report.post_debt = self.virtual_debt;
        self.solver.verify_execution(&outcome.report).map_err(|e| match e {
            DebtError::InvariantViolation(msg) => VaultError::InvariantViolation(msg),
            other => VaultError::Debt(other),
        })?;
        self.check_share_conservation()?;

        tracing::info!(
            mode = outcome.plan.mode.as_str(),
            full_exit = outcome.plan.full_exit,
            debt_change = %outcome.debt_change,
            debt = %self.virtual_debt,
            pre_value = %outcome.report.pre_value,
            post_value = %outcome.report.post_value,
            swap_fee = %outcome.report.swap_fee_value,
            post_cr = %outcome.plan.post_collateral_ratio,
            "Debt rebalance"
        );
        Ok(outcome)
    }

    fn execute_leverage(
        &mut self,
        pool: &mut dyn PoolAdapter,
        owner: &Owner,
        valuation: Valuation,
        outcome: &mut DebtOutcome,
    ) -> Result<(), VaultError> {
        let borrow = outcome.plan.borrow_stable;
        let swap_stable = outcome.plan.swap_stable;
        self.virtual_debt = add(self.virtual_debt, borrow)?;
        outcome.debt_change = borrow;

        let mut volatile_in = U256::ZERO;
        if !swap_stable.is_zero() {
            let swap = pool.swap(valuation.stable_is_token0(), swap_stable, None)?;
            volatile_in = swap.amount_out;
            outcome.report.swap_fee_value = swap.fee;
            outcome.swap = Some(swap);
        }

        let offered = valuation.amounts(sub(borrow, swap_stable)?, volatile_in);
        let taken = match self.deposit(pool, owner, offered.amount0, offered.amount1, U256::ZERO, U256::ZERO) {
            Ok(receipt) => {
                outcome.shares_minted = receipt.shares;
                receipt.amounts
            }
            Err(VaultError::ZeroShares) => {
                tracing::debug!(%borrow, "Leverage too small to mint shares, absorbing into idle");
                TokenAmounts::ZERO
            }
            Err(e) => return Err(e),
        };

        let leftover = TokenAmounts::new(sub(offered.amount0, taken.amount0)?, sub(offered.amount1, taken.amount1)?);
        self.credit_idle(leftover)?;
        outcome.absorbed = leftover;
        Ok(())
    }

    fn execute_deleverage(
        &mut self,
        pool: &mut dyn PoolAdapter,
        owner: &Owner,
        valuation: Valuation,
        outcome: &mut DebtOutcome,
    ) -> Result<(), VaultError> {
        let balance = self.balance_of(owner);
        let shares = if outcome.plan.full_exit {
            balance
        } else {
            self.shares_for_value(outcome.plan.withdraw_value, outcome.report.pre_value)?.min(balance)
        };
        if shares.is_zero() {
            tracing::warn!(%owner, withdraw = %outcome.plan.withdraw_value, "No shares to deleverage with");
            return Ok(());
        }

        let withdrawn = self.withdraw(pool, owner, shares, U256::ZERO, U256::ZERO)?;
        outcome.shares_burned = shares;

        let mut proceeds = valuation.stable_amount(withdrawn);
        let volatile = valuation.volatile_amount(withdrawn);
        if !volatile.is_zero() {
            let swap = pool.swap(!valuation.stable_is_token0(), volatile, None)?;
            proceeds = add(proceeds, swap.amount_out)?;
            outcome.report.swap_fee_value = valuation.volatile_to_stable(swap.fee)?;
            outcome.swap = Some(swap);
        }

        let repay = proceeds.min(self.virtual_debt);
        self.virtual_debt = sub(self.virtual_debt, repay)?;
        outcome.debt_change = repay;

        let excess = valuation.amounts(sub(proceeds, repay)?, U256::ZERO);
        self.credit_idle(excess)?;
        outcome.absorbed = excess;
        Ok(())
    }
}
