//! Withdraw from many pools in one call.

use serde::Serialize;

use super::ensure_within_cap;
use crate::domain::{Address, AssetBook, PoolId, WithdrawOutcome};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::math::{self, Amount};

/// Per-pool results of a multi-withdraw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultiWithdrawReport {
    /// Pools withdrawn from, with their outcome.
    pub withdrawn: Vec<(PoolId, WithdrawOutcome)>,
    /// Pools skipped because nothing was due.
    pub skipped: Vec<PoolId>,
    /// Sum released across all pools.
    pub total_released: Amount,
}

impl<B: AssetBook> Ledger<B> {
    /// Withdraws from every live pool owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TooManyPools`] if `caller` owns more pools
    /// than one batch may touch, and the withdrawal errors otherwise.
    pub fn multi_withdraw(&mut self, caller: Address) -> Result<MultiWithdrawReport, LedgerError> {
        let pool_ids = self.pools_of(caller);
        self.withdraw_many(caller, &pool_ids)
    }

    /// Withdraws from each of `pool_ids`. Pools with nothing due, and fee
    /// pools still awaiting their collector step, are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TooManyPools`] over the cap and the
    /// authorization errors of [`Ledger::withdraw`].
    pub fn withdraw_many(
        &mut self,
        caller: Address,
        pool_ids: &[PoolId],
    ) -> Result<MultiWithdrawReport, LedgerError> {
        ensure_within_cap(pool_ids.len(), self.config().max_pools_per_tx)?;
        let report = self.transact(|tx| {
            let mut report = MultiWithdrawReport::default();
            for &pool_id in pool_ids {
                if tx.state.withdrawable(pool_id, tx.now)? == 0 {
                    report.skipped.push(pool_id);
                    continue;
                }
                let outcome = tx.withdraw(caller, pool_id)?;
                report.total_released = math::add(report.total_released, outcome.released)?;
                report.withdrawn.push((pool_id, outcome));
            }
            Ok(report)
        })?;
        tracing::info!(
            %caller,
            withdrawn = report.withdrawn.len(),
            skipped = report.skipped.len(),
            total = report.total_released,
            "multi-withdraw"
        );
        Ok(report)
    }
}
